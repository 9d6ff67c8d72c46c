//! Robust statistics: median and sigma-clipped mean/median/deviation.
#![allow(clippy::cast_precision_loss)]

use skydiff_core::{ClipCenter, NoiseEstimate, SigmaClipConfig};

/// Median of a buffer, reordering it in place.
///
/// Even-length buffers return the mean of the two middle values.
/// Returns NaN for an empty buffer.
pub fn median_mut(data: &mut [f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }

    let len = data.len();
    let (left, upper, _) = data.select_nth_unstable_by(len / 2, f64::total_cmp);
    let upper = *upper;
    if len % 2 == 1 {
        upper
    } else {
        let lower = left.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (lower + upper) * 0.5
    }
}

/// Arithmetic mean. Returns NaN for an empty slice.
#[must_use]
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population standard deviation around `mean`.
#[must_use]
pub fn population_std(data: &[f64], mean: f64) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    let variance = data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / data.len() as f64;
    variance.sqrt()
}

/// Sigma-clipped mean, median and standard deviation.
///
/// Each pass computes the center and standard deviation of the surviving
/// values and rejects those outside `center ± sigma × std`. Clipping stops
/// when a pass rejects nothing or after `max_iterations` passes; the final
/// statistics are taken over the survivors.
///
/// `values` must be finite. Returns `None` when `values` is empty.
#[must_use]
pub fn sigma_clipped_stats(values: &[f64], config: &SigmaClipConfig) -> Option<NoiseEstimate> {
    if values.is_empty() {
        return None;
    }

    let mut kept = values.to_vec();
    let mut scratch = Vec::with_capacity(kept.len());

    for _ in 0..config.max_iterations {
        let avg = mean(&kept);
        let std = population_std(&kept, avg);
        let center = match config.center {
            ClipCenter::Mean => avg,
            ClipCenter::Median => {
                scratch.clear();
                scratch.extend_from_slice(&kept);
                median_mut(&mut scratch)
            }
        };

        let lower = center - config.sigma * std;
        let upper = center + config.sigma * std;
        let before = kept.len();
        kept.retain(|&v| v >= lower && v <= upper);

        if kept.len() == before || kept.is_empty() {
            break;
        }
    }

    if kept.is_empty() {
        return None;
    }

    let avg = mean(&kept);
    let deviation = population_std(&kept, avg);
    let median = median_mut(&mut kept);
    Some(NoiseEstimate::new(avg, median, deviation))
}
