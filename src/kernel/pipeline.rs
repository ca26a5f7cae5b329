//! Per-lane fetch pipeline.
//!
//! Each address stream of a lane owns a [`FetchQueue`]. `gather` issues a
//! fetch and `receive` consumes the oldest one, so results always come back
//! in issue order. The kernels keep exactly one fetch in flight between
//! iterations, and drain the last one after the loop.

use std::collections::VecDeque;

use super::lanes::LaneDescriptor;
use super::vector::Vector;

/// FIFO of in-flight fetches for one address stream.
#[derive(Debug, Default)]
pub struct FetchQueue {
    in_flight: VecDeque<Vector>,
    issued: u64,
    received: u64,
    max_depth: usize,
}

impl FetchQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a fetch of `source`.
    ///
    /// `None` means the address lies past the end of the lane's range; the
    /// fetch still occupies a slot and yields an empty vector.
    pub fn gather(&mut self, source: Option<&[i32]>) {
        let fetched = source.map(Vector::from_slice).unwrap_or_default();
        self.in_flight.push_back(fetched);
        self.issued += 1;
        self.max_depth = self.max_depth.max(self.in_flight.len());
    }

    /// Consumes the oldest in-flight fetch.
    pub fn receive(&mut self) -> Vector {
        debug_assert!(!self.in_flight.is_empty(), "receive without gather");
        self.received += 1;
        self.in_flight.pop_front().unwrap_or_default()
    }

    /// Fetches issued and not yet received.
    #[inline]
    pub fn depth(&self) -> usize {
        self.in_flight.len()
    }

    /// Total fetches issued.
    #[inline]
    pub fn issued(&self) -> u64 {
        self.issued
    }

    /// Total fetches received.
    #[inline]
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Largest number of fetches that were ever in flight at once.
    #[inline]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

/// Position of a lane within the frame.
#[derive(Debug, Clone, Copy)]
pub struct Cursor {
    offset: usize,
    stride: usize,
    steps: usize,
}

impl Cursor {
    /// Places the cursor at the lane's first group.
    pub fn new(lane: &LaneDescriptor) -> Self {
        Self {
            offset: lane.start(),
            stride: lane.stride(),
            steps: 0,
        }
    }

    /// Pixel offset of the group being computed.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Pixel offset of the group being prefetched.
    #[inline]
    pub fn prefetch_offset(&self) -> usize {
        self.offset + self.stride
    }

    /// Groups completed so far.
    #[inline]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Moves all three address streams one stride forward.
    #[inline]
    pub fn advance(&mut self) {
        self.offset += self.stride;
        self.steps += 1;
    }
}
