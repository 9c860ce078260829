use image::{imageops::FilterType, DynamicImage, GrayImage};

/// Side length of the grayscale grid a capture is reduced to.
pub const FINGERPRINT_SIDE: u32 = 64;

/// Gray level above which a pixel counts as "ink" for OCR.
const BINARIZE_CUTOFF: u8 = 200;

/// Downsampled grayscale sample of a capture, intensities in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelFingerprint(Vec<f32>);

impl PixelFingerprint {
    pub fn from_image(img: &DynamicImage) -> Self {
        let gray = img
            .resize_exact(FINGERPRINT_SIDE, FINGERPRINT_SIDE, FilterType::Triangle)
            .to_luma8();
        Self(
            gray.pixels()
                .map(|pixel| f32::from(pixel.0[0]) / 255.0)
                .collect(),
        )
    }

    /// Mean absolute difference against `other`.
    ///
    /// Fingerprints of different lengths cannot be compared and count as a
    /// full change.
    pub fn mean_abs_diff(&self, other: &Self) -> f32 {
        if self.0.len() != other.0.len() || self.0.is_empty() {
            return 1.0;
        }
        let total: f32 = self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();
        total / self.0.len() as f32
    }
}

/// First sample always counts as a change.
pub fn has_changed(
    previous: Option<&PixelFingerprint>,
    current: &PixelFingerprint,
    threshold: f32,
) -> bool {
    match previous {
        None => true,
        Some(prev) => prev.mean_abs_diff(current) > threshold,
    }
}

/// Thresholds the capture to pure black/white, which OCR reads far more
/// reliably on dark-mode chat UIs.
pub fn binarize(img: &DynamicImage) -> GrayImage {
    let mut gray = img.to_luma8();
    for pixel in gray.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > BINARIZE_CUTOFF { 255 } else { 0 };
    }
    gray
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, RgbImage, Rgb};

    fn solid(width: u32, height: u32, level: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([level, level, level])))
    }

    #[test]
    fn fingerprint_has_fixed_size() {
        let fp = PixelFingerprint::from_image(&solid(300, 120, 10));
        assert_eq!(fp.0.len(), (FINGERPRINT_SIDE * FINGERPRINT_SIDE) as usize);
        assert!(fp.0.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn identical_images_have_zero_difference() {
        let a = PixelFingerprint::from_image(&solid(80, 80, 128));
        let b = PixelFingerprint::from_image(&solid(80, 80, 128));
        assert_eq!(a.mean_abs_diff(&b), 0.0);
        assert!(!has_changed(Some(&a), &b, 0.005));
    }

    #[test]
    fn black_and_white_differ_completely() {
        let black = PixelFingerprint::from_image(&solid(64, 64, 0));
        let white = PixelFingerprint::from_image(&solid(64, 64, 255));
        assert!(black.mean_abs_diff(&white) > 0.99);
        assert!(has_changed(Some(&black), &white, 0.5));
    }

    #[test]
    fn first_fingerprint_counts_as_change() {
        let fp = PixelFingerprint::from_image(&solid(64, 64, 50));
        assert!(has_changed(None, &fp, 1.0));
    }

    #[test]
    fn binarize_splits_at_cutoff() {
        let mut img = image::GrayImage::new(3, 1);
        img.put_pixel(0, 0, Luma([200]));
        img.put_pixel(1, 0, Luma([201]));
        img.put_pixel(2, 0, Luma([20]));
        let out = binarize(&DynamicImage::ImageLuma8(img));
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(1, 0).0[0], 255);
        assert_eq!(out.get_pixel(2, 0).0[0], 0);
    }
}
