//! Color space conversion of leaf crops before segmentation.
//!
//! The pixel classifier was trained on images stored the way OpenCV writes a
//! converted 8-bit matrix: first plane in the blue channel, third in red.
//! Conversions here produce the same bytes.

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use palette::{FromColor, Hsl, Hsv, Lab, Srgb};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Color space the segmentation project was trained on.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    /// Leaf crops are segmented as extracted
    None,
    Yuv,
    Hsv,
    #[default]
    Lab,
    Hls,
}

impl ColorSpace {
    pub fn name(&self) -> &'static str {
        match self {
            ColorSpace::None => "none",
            ColorSpace::Yuv => "yuv",
            ColorSpace::Hsv => "hsv",
            ColorSpace::Lab => "lab",
            ColorSpace::Hls => "hls",
        }
    }

    /// Converts one pixel into the three 8-bit planes of this color space.
    pub fn convert_pixel(&self, [r, g, b]: [u8; 3]) -> [u8; 3] {
        let srgb = Srgb::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
        match self {
            ColorSpace::None => [r, g, b],
            ColorSpace::Lab => {
                let lab = Lab::from_color(srgb);
                [
                    to_u8(lab.l * 255.0 / 100.0),
                    to_u8(lab.a + 128.0),
                    to_u8(lab.b + 128.0),
                ]
            }
            ColorSpace::Hsv => {
                let hsv = Hsv::from_color(srgb);
                [
                    hue_to_u8(hsv.hue.into_positive_degrees(), hsv.saturation),
                    to_u8(hsv.saturation * 255.0),
                    to_u8(hsv.value * 255.0),
                ]
            }
            ColorSpace::Hls => {
                let hsl = Hsl::from_color(srgb);
                [
                    hue_to_u8(hsl.hue.into_positive_degrees(), hsl.saturation),
                    to_u8(hsl.lightness * 255.0),
                    to_u8(hsl.saturation * 255.0),
                ]
            }
            ColorSpace::Yuv => {
                let (r, g, b) = (r as f32, g as f32, b as f32);
                let y = 0.299 * r + 0.587 * g + 0.114 * b;
                [
                    to_u8(y),
                    to_u8((b - y) * 0.492 + 128.0),
                    to_u8((r - y) * 0.877 + 128.0),
                ]
            }
        }
    }
}

#[inline]
fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// 8-bit hue is degrees halved so it fits in 0..180. Achromatic pixels get 0.
#[inline]
fn hue_to_u8(degrees: f32, saturation: f32) -> u8 {
    if saturation <= 0.0 {
        return 0;
    }
    (to_u8(degrees / 2.0) as u32 % 180) as u8
}

/// Converts an RGB image, storing the planes in reverse channel order.
pub fn convert_image(image: &RgbImage, space: ColorSpace) -> RgbImage {
    if space == ColorSpace::None {
        return image.clone();
    }
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [c1, c2, c3] = space.convert_pixel(image.get_pixel(x, y).0);
        Rgb([c3, c2, c1])
    })
}

/// Converts every file in `inputs` into `output_dir`, keeping file names.
///
/// Returns the paths of the converted files in input order.
pub fn convert_files(inputs: &[PathBuf], output_dir: &Path, space: ColorSpace) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    info!(
        "Converting {} leaves to {} color space",
        inputs.len(),
        space.name()
    );

    let mut outputs = Vec::with_capacity(inputs.len());
    for input in inputs {
        let file_name = input
            .file_name()
            .with_context(|| format!("Not a file: {}", input.display()))?;
        let output = output_dir.join(file_name);

        let image = image::open(input)
            .with_context(|| format!("Failed to open {}", input.display()))?
            .to_rgb8();
        convert_image(&image, space)
            .save(&output)
            .with_context(|| format!("Failed to write {}", output.display()))?;

        debug!("Converted {} -> {}", input.display(), output.display());
        outputs.push(output);
    }

    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn close(actual: [u8; 3], expected: [u8; 3]) -> bool {
        actual
            .iter()
            .zip(expected.iter())
            .all(|(&a, &e)| (a as i16 - e as i16).abs() <= 1)
    }

    #[test]
    fn test_lab_known_colors() {
        assert!(close(ColorSpace::Lab.convert_pixel([255, 255, 255]), [255, 128, 128]));
        assert!(close(ColorSpace::Lab.convert_pixel([0, 0, 0]), [0, 128, 128]));
        // sRGB red: L 53.2, a 80.1, b 67.2
        assert!(close(ColorSpace::Lab.convert_pixel([255, 0, 0]), [136, 208, 195]));
    }

    #[test]
    fn test_hsv_known_colors() {
        assert_eq!(ColorSpace::Hsv.convert_pixel([255, 0, 0]), [0, 255, 255]);
        assert_eq!(ColorSpace::Hsv.convert_pixel([0, 255, 0]), [60, 255, 255]);
        assert_eq!(ColorSpace::Hsv.convert_pixel([0, 0, 255]), [120, 255, 255]);
        assert_eq!(ColorSpace::Hsv.convert_pixel([128, 128, 128]), [0, 0, 128]);
    }

    #[test]
    fn test_hls_known_colors() {
        assert_eq!(ColorSpace::Hls.convert_pixel([0, 255, 0]), [60, 128, 255]);
        assert_eq!(ColorSpace::Hls.convert_pixel([255, 255, 255]), [0, 255, 0]);
    }

    #[test]
    fn test_yuv_known_colors() {
        assert_eq!(ColorSpace::Yuv.convert_pixel([255, 255, 255]), [255, 128, 128]);
        assert_eq!(ColorSpace::Yuv.convert_pixel([0, 0, 0]), [0, 128, 128]);
        // Y = 76.245, U = -76.245*0.492+128, V = 178.755*0.877+128 (clamped)
        assert_eq!(ColorSpace::Yuv.convert_pixel([255, 0, 0]), [76, 90, 255]);
    }

    #[test]
    fn test_convert_image_reverses_planes() {
        let img = RgbImage::from_pixel(2, 2, Rgb([0, 255, 0]));
        let converted = convert_image(&img, ColorSpace::Hsv);
        assert_eq!(converted.get_pixel(1, 1).0, [255, 255, 60]);
    }

    #[test]
    fn test_convert_image_none_is_copy() {
        let img = RgbImage::from_fn(3, 3, |x, y| Rgb([x as u8, y as u8, 9]));
        assert_eq!(convert_image(&img, ColorSpace::None), img);
    }

    #[test]
    fn test_convert_files_keeps_names() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("1_leaf1.png");
        RgbImage::from_pixel(4, 4, Rgb([0, 0, 255])).save(&input).unwrap();

        let out_dir = dir.path().join("color_space");
        let outputs = convert_files(&[input], &out_dir, ColorSpace::Hsv).unwrap();

        assert_eq!(outputs, vec![out_dir.join("1_leaf1.png")]);
        let written = image::open(&outputs[0]).unwrap().to_rgb8();
        assert_eq!(written.get_pixel(0, 0).0, [255, 255, 120]);
    }

    #[test]
    fn test_color_space_serde_names() {
        assert_eq!(serde_json::to_string(&ColorSpace::Lab).unwrap(), "\"lab\"");
        let parsed: ColorSpace = serde_json::from_str("\"none\"").unwrap();
        assert_eq!(parsed, ColorSpace::None);
        assert_eq!(ColorSpace::default(), ColorSpace::Lab);
    }
}
