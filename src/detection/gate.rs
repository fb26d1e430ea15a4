//! Usability gate: rejects scans outside the expected size envelope.

use image::GenericImageView;

use crate::config::GateConfig;

/// Smallest usable scan height in pixels.
pub const MIN_HEIGHT_FILE: u32 = 11_000;
/// Largest usable scan height in pixels.
pub const MAX_HEIGHT_FILE: u32 = 22_500;

impl GateConfig {
    /// Returns true if a scan of this height can go through detection.
    pub fn accepts_height(&self, height: u32) -> bool {
        (self.min_height..=self.max_height).contains(&height)
    }

    /// Returns true if the image's height lies within the envelope.
    pub fn is_usable<I: GenericImageView>(&self, image: &I) -> bool {
        self.accepts_height(image.height())
    }
}

/// Checks an image against the default envelope
/// `[MIN_HEIGHT_FILE, MAX_HEIGHT_FILE]`, bounds included.
pub fn is_usable<I: GenericImageView>(image: &I) -> bool {
    GateConfig::default().is_usable(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    #[test]
    fn test_bounds_are_inclusive() {
        let gate = GateConfig::default();
        assert!(!gate.accepts_height(10_999));
        assert!(gate.accepts_height(11_000));
        assert!(gate.accepts_height(16_000));
        assert!(gate.accepts_height(22_500));
        assert!(!gate.accepts_height(22_501));
        assert!(!gate.accepts_height(0));
    }

    #[test]
    fn test_is_usable_reads_height_only() {
        // Width is irrelevant; a one-pixel-wide column is enough to test.
        assert!(is_usable(&GrayImage::new(1, 11_000)));
        assert!(!is_usable(&GrayImage::new(1, 10_999)));
        assert!(!is_usable(&GrayImage::new(1, 22_501)));
    }

    #[test]
    fn test_custom_envelope() {
        let gate = GateConfig {
            min_height: 10,
            max_height: 20,
        };
        assert!(gate.is_usable(&GrayImage::new(5, 10)));
        assert!(!gate.is_usable(&GrayImage::new(5, 21)));
    }
}
