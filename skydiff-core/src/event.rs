//! Transient event type.

use crate::region::{CandidateRegion, PixelPosition};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A detected transient, projected onto the sky.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Event {
    /// Region centroid in pixel coordinates.
    pub centroid: PixelPosition,
    /// Right ascension (degrees).
    pub ra: f64,
    /// Declination (degrees).
    pub dec: f64,
    /// Summed difference flux.
    pub flux: f64,
    /// Signal-to-noise ratio.
    pub snr: f64,
    /// Number of valid pixels in the region.
    pub area: usize,
    /// Filter of the originating frame, attached by the caller.
    pub filter: Option<String>,
    /// Name of the originating frame, attached by the caller.
    pub source: Option<String>,
}

impl Event {
    /// Promotes a region that passed every filter.
    #[must_use]
    pub fn from_region(region: &CandidateRegion, ra: f64, dec: f64) -> Self {
        Self {
            centroid: region.centroid,
            ra,
            dec,
            flux: region.flux,
            snr: region.snr,
            area: region.valid_area,
            filter: None,
            source: None,
        }
    }

    /// Attaches filter and source tags.
    #[must_use]
    pub fn with_tags(mut self, filter: Option<String>, source: Option<String>) -> Self {
        self.filter = filter;
        self.source = source;
        self
    }
}

/// Sorts events by descending SNR, keeping the existing order of ties.
pub fn sort_by_snr(events: &mut [Event]) {
    events.sort_by(|a, b| b.snr.total_cmp(&a.snr));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(snr: f64, flux: f64) -> Event {
        let region = CandidateRegion::from_sums(1, 1, 1, 0.0, 0.0, flux, 1.0);
        Event {
            snr,
            ..Event::from_region(&region, 0.0, 0.0)
        }
    }

    #[test]
    fn test_from_region_uses_valid_area() {
        let region = CandidateRegion::from_sums(7, 12, 10, 120.0, 240.0, 55.0, 1.0);
        let ev = Event::from_region(&region, 150.0, -20.0);
        assert_eq!(ev.area, 10);
        assert!((ev.ra - 150.0).abs() < f64::EPSILON);
        assert!(ev.filter.is_none());

        let tagged = ev.with_tags(Some("ZTF_g".into()), Some("frame.fits".into()));
        assert_eq!(tagged.filter.as_deref(), Some("ZTF_g"));
        assert_eq!(tagged.source.as_deref(), Some("frame.fits"));
    }

    #[test]
    fn test_sort_by_snr_is_stable() {
        let mut events = vec![
            event(5.0, 1.0),
            event(20.0, 2.0),
            event(5.0, 3.0),
            event(11.0, 4.0),
        ];
        sort_by_snr(&mut events);

        let fluxes: Vec<f64> = events.iter().map(|e| e.flux).collect();
        assert_eq!(fluxes, vec![2.0, 4.0, 1.0, 3.0]);
    }
}
