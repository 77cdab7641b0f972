//! Peak search over 1-D spectra.
//!
//! Uses a smoothed second difference: the spectrum is correlated with a zero-sum
//! "Mexican hat" kernel matched to the expected peak width, so that a flat or linear
//! background produces no response. Each channel's response is divided by its
//! statistical uncertainty, and local maxima of that significance above the requested
//! sensitivity are reported as peaks. Positions are refined with a count-weighted
//! centroid over the peak's half-width.
use super::constants::{FWHM_TO_SIGMA, PEAK_WINDOW_SIGMAS};

/// Find peaks in `counts`.
///
/// `sensitivity` is the minimum significance (in standard deviations) of the smoothed
/// second difference; `width` is the expected full width at half maximum in channels.
/// Returns centroid positions in channels, ascending. A width that is not a positive
/// finite number, or whose window does not fit the spectrum, finds nothing.
pub fn find_peaks(counts: &[f64], sensitivity: f64, width: f64) -> Vec<f64> {
    if !(width.is_finite() && width > 0.0) || sensitivity.is_nan() {
        return vec![];
    }
    let sigma = (width / FWHM_TO_SIGMA).max(0.5);
    let half_window = (PEAK_WINDOW_SIGMAS * sigma).ceil() as usize;
    match half_window.checked_mul(2).and_then(|w| w.checked_add(1)) {
        Some(window) if window <= counts.len() => (),
        _ => return vec![],
    }

    let kernel = second_difference_kernel(sigma, half_window);
    let mut significance = vec![0.0; counts.len()];
    for center in half_window..(counts.len() - half_window) {
        let mut response = 0.0;
        let mut variance = 0.0;
        for (offset, weight) in kernel.iter().enumerate() {
            let count = counts[center + offset - half_window];
            response += weight * count;
            variance += weight * weight * count.abs().max(1.0);
        }
        significance[center] = response / variance.sqrt();
    }

    let min_separation = width.max(1.0);
    let mut peaks: Vec<(usize, f64)> = Vec::new();
    for ch in 1..(counts.len() - 1) {
        let s = significance[ch];
        if s < sensitivity || s < significance[ch - 1] || s <= significance[ch + 1] {
            continue;
        }
        match peaks.last_mut() {
            Some(last) if ((ch - last.0) as f64) < min_separation => {
                if s > last.1 {
                    *last = (ch, s);
                }
            }
            _ => peaks.push((ch, s)),
        }
    }

    let half_width = ((width / 2.0).round() as usize).max(1);
    peaks
        .into_iter()
        .map(|(ch, _)| centroid(counts, ch, half_width))
        .collect()
}

/// Negative second derivative of a Gaussian, shifted to sum to zero
fn second_difference_kernel(sigma: f64, half_window: usize) -> Vec<f64> {
    let mut kernel: Vec<f64> = (0..=2 * half_window)
        .map(|i| {
            let x = i as f64 - half_window as f64;
            let u = x * x / (sigma * sigma);
            (1.0 - u) * (-0.5 * u).exp()
        })
        .collect();
    let mean = kernel.iter().sum::<f64>() / kernel.len() as f64;
    kernel.iter_mut().for_each(|w| *w -= mean);
    kernel
}

fn centroid(counts: &[f64], peak: usize, half_width: usize) -> f64 {
    let low = peak.saturating_sub(half_width);
    let high = (peak + half_width).min(counts.len() - 1);
    let mut sum = 0.0;
    let mut weighted = 0.0;
    for (ch, count) in counts.iter().enumerate().take(high + 1).skip(low) {
        sum += count;
        weighted += count * ch as f64;
    }
    if sum > 0.0 {
        weighted / sum
    } else {
        peak as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gaussian_spectrum(n: usize, background: f64, peaks: &[(f64, f64, f64)]) -> Vec<f64> {
        (0..n)
            .map(|ch| {
                let x = ch as f64;
                background
                    + peaks
                        .iter()
                        .map(|(mean, fwhm, amp)| {
                            let sigma = fwhm / FWHM_TO_SIGMA;
                            amp * (-0.5 * ((x - mean) / sigma).powi(2)).exp()
                        })
                        .sum::<f64>()
            })
            .collect()
    }

    #[test]
    fn test_single_peak() {
        let spectrum = gaussian_spectrum(512, 10.0, &[(200.0, 6.0, 1000.0)]);
        let peaks = find_peaks(&spectrum, 3.0, 6.0);
        assert_eq!(peaks.len(), 1);
        assert!((peaks[0] - 200.0).abs() < 0.5);
    }

    #[test]
    fn test_two_separated_peaks() {
        let spectrum =
            gaussian_spectrum(1024, 20.0, &[(300.0, 8.0, 500.0), (700.0, 8.0, 800.0)]);
        let peaks = find_peaks(&spectrum, 3.0, 8.0);
        assert_eq!(peaks.len(), 2);
        assert!((peaks[0] - 300.0).abs() < 0.5);
        assert!((peaks[1] - 700.0).abs() < 0.5);
    }

    #[test]
    fn test_flat_spectrum_has_no_peaks() {
        let spectrum = vec![50.0; 256];
        assert!(find_peaks(&spectrum, 2.0, 5.0).is_empty());
    }

    #[test]
    fn test_short_spectrum() {
        assert!(find_peaks(&[1.0, 100.0, 1.0], 1.0, 10.0).is_empty());
    }

    #[test]
    fn test_unusable_width() {
        let spectrum = gaussian_spectrum(64, 10.0, &[(32.0, 4.0, 500.0)]);
        assert!(find_peaks(&spectrum, 3.0, f64::INFINITY).is_empty());
        assert!(find_peaks(&spectrum, 3.0, 1e300).is_empty());
        assert!(find_peaks(&spectrum, 3.0, f64::NAN).is_empty());
        assert!(find_peaks(&spectrum, 3.0, -4.0).is_empty());
        assert!(find_peaks(&spectrum, f64::NAN, 4.0).is_empty());
        assert_eq!(find_peaks(&spectrum, 3.0, 4.0).len(), 1);
    }
}
