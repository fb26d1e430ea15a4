//! Pixel filters used ahead of contour tracing.
//!
//! These reproduce the OpenCV primitives the detection thresholds were tuned
//! against: a normalized box blur with reflect-101 borders, fixed-level
//! thresholds, and the fixed-point BT.601 grayscale conversion.

use image::{GrayImage, Luma, RgbImage};

/// Converts an RGB pixel to luma using the ITU-R BT.601 weights
/// (Y = 0.299*R + 0.587*G + 0.114*B) in 14-bit fixed point.
#[inline]
pub fn bt601_luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 4899 + g as u32 * 9617 + b as u32 * 1868 + (1 << 13)) >> 14) as u8
}

/// Converts a color image to single-channel grayscale.
pub fn to_grayscale(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        Luma([bt601_luma(r, g, b)])
    })
}

/// Per-channel binary threshold, in place: values above `threshold` become
/// `max_value`, everything else 0.
pub fn threshold_binary(mut image: RgbImage, threshold: u8, max_value: u8) -> RgbImage {
    for channel in image.iter_mut() {
        *channel = if *channel > threshold { max_value } else { 0 };
    }
    image
}

/// Inverted binary threshold, in place: values above `threshold` become 0,
/// everything else `max_value`.
pub fn threshold_binary_inv(mut image: GrayImage, threshold: u8, max_value: u8) -> GrayImage {
    for value in image.iter_mut() {
        *value = if *value > threshold { 0 } else { max_value };
    }
    image
}

/// Maps an out-of-range index back into `0..len` by mirroring around the
/// edge pixels without repeating them (`dcb|abcd|cba`).
fn reflect_101(index: i64, len: i64) -> usize {
    if len == 1 {
        return 0;
    }
    let mut p = index;
    while p < 0 || p >= len {
        p = if p < 0 { -p } else { 2 * len - 2 - p };
    }
    p as usize
}

#[inline]
fn image_row(src: &[u8], row_len: usize, y: usize) -> &[u8] {
    &src[y * row_len..(y + 1) * row_len]
}

/// Averaging blur over a `kernel_width` x `kernel_height` window anchored at
/// the kernel centre.
///
/// Runs as a vertical running sum per column followed by a horizontal running
/// sum per row, so memory stays at one row of accumulators regardless of the
/// kernel size. Scans are tens of thousands of pixels tall; a full-size
/// intermediate buffer is not an option.
pub fn box_blur(image: &RgbImage, kernel_width: u32, kernel_height: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let kw = kernel_width.max(1) as i64;
    let kh = kernel_height.max(1) as i64;
    let (anchor_x, anchor_y) = (kw / 2, kh / 2);
    let (w, h) = (width as i64, height as i64);
    let area = (kw * kh) as u64;

    let src: &[u8] = image.as_raw();
    let row_len = width as usize * 3;

    let mut column_sums = vec![0u64; row_len];
    for j in 0..kh {
        let source_row = image_row(src, row_len, reflect_101(j - anchor_y, h));
        for (sum, &v) in column_sums.iter_mut().zip(source_row) {
            *sum += v as u64;
        }
    }

    let mut output = RgbImage::new(width, height);
    let out: &mut [u8] = &mut output;

    for y in 0..h {
        let out_row = &mut out[y as usize * row_len..(y as usize + 1) * row_len];

        for c in 0..3 {
            let mut sum: u64 = (0..kw)
                .map(|i| column_sums[reflect_101(i - anchor_x, w) * 3 + c])
                .sum();
            for x in 0..w {
                out_row[x as usize * 3 + c] = ((sum * 2 + area) / (2 * area)) as u8;
                let incoming = reflect_101(x + kw - anchor_x, w);
                let outgoing = reflect_101(x - anchor_x, w);
                sum = sum + column_sums[incoming * 3 + c] - column_sums[outgoing * 3 + c];
            }
        }

        if y + 1 < h {
            let incoming = image_row(src, row_len, reflect_101(y + kh - anchor_y, h));
            let outgoing = image_row(src, row_len, reflect_101(y - anchor_y, h));
            for ((sum, &add), &sub) in column_sums.iter_mut().zip(incoming).zip(outgoing) {
                *sum = *sum + add as u64 - sub as u64;
            }
        }
    }

    output
}
