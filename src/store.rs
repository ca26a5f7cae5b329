//! Session-lifetime pixel buffers shared between the driver and the kernel.

use thiserror::Error;

/// Errors raised when loading data into the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("buffer length {actual} does not match frame size {expected}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// The three intensity buffers that carry state from frame to frame.
///
/// `previous` and `filter_state` start zeroed and are only ever written by
/// kernel invocations. `current` is loaded by the driver before each
/// invocation and holds the processed image afterwards.
pub struct FrameStore {
    width: u32,
    height: u32,
    current: Vec<i32>,
    previous: Vec<i32>,
    filter_state: Vec<i32>,
    invocations: u64,
}

impl FrameStore {
    /// Creates a zero-initialised store for the given geometry.
    pub fn new(width: u32, height: u32) -> Self {
        let n = (width as usize) * (height as usize);
        Self {
            width,
            height,
            current: vec![0; n],
            previous: vec![0; n],
            filter_state: vec![0; n],
            invocations: 0,
        }
    }

    /// Creates a store with explicit contents, as if `invocations` kernels had already run.
    pub fn from_parts(
        width: u32,
        height: u32,
        current: Vec<i32>,
        previous: Vec<i32>,
        filter_state: Vec<i32>,
        invocations: u64,
    ) -> Result<Self, StoreError> {
        let expected = (width as usize) * (height as usize);
        for buffer in [&current, &previous, &filter_state] {
            if buffer.len() != expected {
                return Err(StoreError::LengthMismatch {
                    expected,
                    actual: buffer.len(),
                });
            }
        }
        Ok(Self {
            width,
            height,
            current,
            previous,
            filter_state,
            invocations,
        })
    }

    /// Frame width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixels per buffer.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.current.len()
    }

    /// The current frame, or the processed output after an invocation.
    #[inline]
    pub fn current(&self) -> &[i32] {
        &self.current
    }

    /// Intensities consumed by the last invocation.
    #[inline]
    pub fn previous(&self) -> &[i32] {
        &self.previous
    }

    /// Most recent smoothed difference per pixel.
    #[inline]
    pub fn filter_state(&self) -> &[i32] {
        &self.filter_state
    }

    /// Writable view of `current` for the driver to fill in place.
    #[inline]
    pub fn current_mut(&mut self) -> &mut [i32] {
        &mut self.current
    }

    /// Copies a full frame of intensities into `current`.
    pub fn load_current(&mut self, intensities: &[i32]) -> Result<(), StoreError> {
        if intensities.len() != self.current.len() {
            return Err(StoreError::LengthMismatch {
                expected: self.current.len(),
                actual: intensities.len(),
            });
        }
        self.current.copy_from_slice(intensities);
        Ok(())
    }

    /// Kernel invocations applied since the session started.
    #[inline]
    pub fn invocations(&self) -> u64 {
        self.invocations
    }

    /// Lends all three buffers for one kernel invocation.
    pub(crate) fn lend(&mut self) -> (&mut [i32], &mut [i32], &mut [i32]) {
        (
            &mut self.current,
            &mut self.previous,
            &mut self.filter_state,
        )
    }

    pub(crate) fn record_invocation(&mut self) {
        self.invocations += 1;
    }
}

impl std::fmt::Debug for FrameStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameStore")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pixels", &self.current.len())
            .field("invocations", &self.invocations)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_store_is_zeroed() {
        let store = FrameStore::new(8, 4);

        assert_eq!(store.pixel_count(), 32);
        assert!(store.previous().iter().all(|&v| v == 0));
        assert!(store.filter_state().iter().all(|&v| v == 0));
        assert_eq!(store.invocations(), 0);
    }

    #[test]
    fn test_load_current_checks_length() {
        let mut store = FrameStore::new(4, 1);

        assert!(store.load_current(&[1, 2, 3, 4]).is_ok());
        assert_eq!(store.current(), &[1, 2, 3, 4]);

        assert!(matches!(
            store.load_current(&[1, 2, 3]),
            Err(StoreError::LengthMismatch {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_from_parts_rejects_short_buffer() {
        let result = FrameStore::from_parts(4, 1, vec![0; 4], vec![0; 3], vec![0; 4], 1);
        assert!(result.is_err());
    }
}
