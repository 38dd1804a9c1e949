//! # Image Thresholding Module
//!
//! Global binarization of receipt photos using Otsu's method. Lighting varies
//! widely between receipt photos, so the threshold is picked per image from
//! its luminance histogram.

use image::{GrayImage, Luma};

use super::types::{PreprocessingError, ThresholdedImageResult};

/// Applies Otsu's thresholding algorithm to a luminance image.
///
/// Pixels at or below the chosen threshold become ink (0), the rest become
/// background (255). An image of a single intensity, whatever it is, comes
/// out as all background. The output has the same dimensions as the input.
///
/// # Examples
///
/// ```
/// use smart_receipt::preprocessing::apply_otsu_threshold;
///
/// let gray = image::GrayImage::from_fn(8, 8, |x, _| image::Luma([if x < 4 { 20 } else { 230 }]));
/// let binary = apply_otsu_threshold(&gray).unwrap();
/// assert_eq!(binary.image.dimensions(), (8, 8));
/// assert_eq!(binary.image.get_pixel(0, 0)[0], 0);
/// assert_eq!(binary.image.get_pixel(7, 0)[0], 255);
/// ```
pub fn apply_otsu_threshold(gray: &GrayImage) -> Result<ThresholdedImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return Err(PreprocessingError::ProcessingFailed {
            message: "cannot threshold an empty image".to_string(),
        });
    }

    let histogram = luminance_histogram(gray);
    let (optimal_threshold, binary_img) = match otsu_threshold(&histogram) {
        Some(threshold) => {
            let binary = GrayImage::from_fn(width, height, |x, y| {
                if gray.get_pixel(x, y)[0] > threshold {
                    Luma([255u8])
                } else {
                    Luma([0u8])
                }
            });
            (threshold, binary)
        }
        None => {
            let only = gray.get_pixel(0, 0)[0];
            (only.saturating_sub(1), GrayImage::from_pixel(width, height, Luma([255u8])))
        }
    };

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "receipt_preprocessing",
        threshold = optimal_threshold,
        width,
        height,
        elapsed_ms = processing_time.as_millis() as u64,
        "Otsu thresholding completed"
    );

    Ok(ThresholdedImageResult {
        image: binary_img,
        threshold: optimal_threshold,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

/// 256-bin histogram of pixel intensities.
pub fn luminance_histogram(gray: &GrayImage) -> [u64; 256] {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel[0] as usize] += 1;
    }
    histogram
}

/// Finds the threshold maximizing between-class variance.
///
/// The dark class is every intensity `<= t`, the light class every intensity
/// `> t`. Returns `None` when fewer than two bins are populated, since no
/// split leaves both classes non-empty.
pub fn otsu_threshold(histogram: &[u64; 256]) -> Option<u8> {
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return None;
    }
    let total = total as f64;

    let total_weighted: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &count)| i as f64 * count as f64)
        .sum();

    let mut background_count = 0f64;
    let mut background_weighted = 0f64;
    let mut max_variance = -1f64;
    let mut optimal = None;

    for t in 0..255usize {
        background_count += histogram[t] as f64;
        background_weighted += t as f64 * histogram[t] as f64;

        let foreground_count = total - background_count;
        if background_count == 0.0 || foreground_count == 0.0 {
            continue;
        }

        let mu0 = background_weighted / background_count;
        let mu1 = (total_weighted - background_weighted) / foreground_count;
        let w0 = background_count / total;
        let w1 = foreground_count / total;
        let variance = w0 * w1 * (mu0 - mu1).powi(2);

        if variance > max_variance {
            max_variance = variance;
            optimal = Some(t as u8);
        }
    }

    optimal
}
