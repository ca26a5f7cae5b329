//! Conversions between RGB24 camera data and single-channel intensities.
//!
//! Forward conversion uses fixed luma weights and truncates toward zero.
//! The inverse replicates one intensity into all three channels so the
//! kernel output can be viewed as a grey image.

/// Red weight of the luma sum.
pub const LUMA_R: f64 = 0.2989;
/// Green weight of the luma sum.
pub const LUMA_G: f64 = 0.5870;
/// Blue weight of the luma sum.
pub const LUMA_B: f64 = 0.1140;

/// Intensity of one RGB pixel, truncated toward zero.
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> i32 {
    (f64::from(r) * LUMA_R + f64::from(g) * LUMA_G + f64::from(b) * LUMA_B) as i32
}

/// Converts interleaved RGB24 bytes into intensities.
///
/// Converts as many whole pixels as both buffers hold and returns that count.
pub fn rgb24_to_intensity(rgb: &[u8], dst: &mut [i32]) -> usize {
    let mut converted = 0;
    for (px, out) in rgb.chunks_exact(3).zip(dst.iter_mut()) {
        *out = luma(px[0], px[1], px[2]);
        converted += 1;
    }
    converted
}

/// Writes each intensity into R, G and B of `dst`, clamped to `0..=255`.
///
/// Converts as many whole pixels as both buffers hold and returns that count.
pub fn intensity_to_rgb24(src: &[i32], dst: &mut [u8]) -> usize {
    let mut converted = 0;
    for (&value, px) in src.iter().zip(dst.chunks_exact_mut(3)) {
        let level = value.clamp(0, 255) as u8;
        px.fill(level);
        converted += 1;
    }
    converted
}

/// Mean of a buffer of intensities, 0.0 when empty.
pub fn mean_intensity(values: &[i32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|&v| f64::from(v)).sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luma_weights() {
        assert_eq!(luma(0, 0, 0), 0);
        assert_eq!(luma(255, 0, 0), 76); // 76.2195
        assert_eq!(luma(0, 255, 0), 149); // 149.685
        assert_eq!(luma(0, 0, 255), 29); // 29.07
    }

    #[test]
    fn test_luma_truncates_grey() {
        // Weights sum to 0.9999, so equal channels land just below the input
        assert_eq!(luma(10, 10, 10), 9);
        assert_eq!(luma(1, 1, 1), 0);
        assert_eq!(luma(255, 255, 255), 254);
    }

    #[test]
    fn test_rgb24_to_intensity() {
        let rgb = [255, 0, 0, 0, 255, 0, 0, 0, 255, 100, 200, 50];
        let mut out = [0i32; 4];

        assert_eq!(rgb24_to_intensity(&rgb, &mut out), 4);
        assert_eq!(out, [76, 149, 29, 152]); // last: 152.99
    }

    #[test]
    fn test_short_input_converts_prefix() {
        let rgb = [255, 255, 255, 7];
        let mut out = [-1i32; 2];

        assert_eq!(rgb24_to_intensity(&rgb, &mut out), 1);
        assert_eq!(out, [254, -1]);
    }

    #[test]
    fn test_grey_expansion_clamps() {
        let mut rgb = [1u8; 12];
        assert_eq!(intensity_to_rgb24(&[0, 128, 300, -5], &mut rgb), 4);
        assert_eq!(rgb, [0, 0, 0, 128, 128, 128, 255, 255, 255, 0, 0, 0]);
    }

    #[test]
    fn test_mean_intensity() {
        assert_eq!(mean_intensity(&[]), 0.0);
        assert_eq!(mean_intensity(&[6, 5, 6, 5]), 5.5);
    }
}
