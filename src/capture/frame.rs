//! Raw RGB24 frames as handed over by a [`Camera`](super::Camera).

/// One dequeued RGB24 image, copied out of the device buffer.
///
/// `width` and `height` are the geometry the camera was opened with; the
/// byte count is whatever the device delivered, so a short or oversized
/// buffer shows up as [`Frame::matches`] returning false.
#[derive(Clone)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    sequence: u64,
}

impl Frame {
    /// Wraps the bytes of dequeued buffer number `sequence`.
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            data,
            width,
            height,
            sequence,
        }
    }

    /// Interleaved R, G, B bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Monotonic position in the capture session.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Pixels the frame should hold.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Returns true if the frame holds exactly three bytes for each of
    /// `pixels` pixels.
    pub fn matches(&self, pixels: usize) -> bool {
        self.pixel_count() == pixels && self.data.len() == pixels * 3
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_frame_matches() {
        let frame = Frame::new(vec![0u8; 4 * 2 * 3], 4, 2, 7);

        assert_eq!(frame.sequence(), 7);
        assert_eq!(frame.pixel_count(), 8);
        assert!(frame.matches(8));
    }

    #[test]
    fn test_short_buffer_does_not_match() {
        // One byte per pixel is not RGB24
        let frame = Frame::new(vec![0u8; 8], 4, 2, 0);
        assert!(!frame.matches(8));
    }

    #[test]
    fn test_other_geometry_does_not_match() {
        let frame = Frame::new(vec![0u8; 8 * 3], 8, 1, 0);
        assert!(frame.matches(8));
        assert!(!frame.matches(16));
    }
}
