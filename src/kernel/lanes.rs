//! Strided partitioning of a frame across parallel lanes.
//!
//! The frame is cut into groups of `vector_width` pixels. Group `g` belongs
//! to lane `g % num_lanes`, so lane `l` starts at pixel `l * vector_width`
//! and advances by `num_lanes * vector_width` pixels per step.

/// Addressing for one lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneDescriptor {
    /// Lane index in `[0, num_lanes)`.
    pub lane_id: usize,
    /// Pixels per group.
    pub vector_width: usize,
    /// Total lanes in the launch.
    pub num_lanes: usize,
}

impl LaneDescriptor {
    /// First pixel index this lane touches.
    #[inline]
    pub fn start(&self) -> usize {
        self.lane_id * self.vector_width
    }

    /// Distance in pixels between successive groups of this lane.
    #[inline]
    pub fn stride(&self) -> usize {
        self.num_lanes * self.vector_width
    }

    /// Start offsets of the groups this lane visits in a frame of `n` pixels.
    pub fn group_offsets(&self, n: usize) -> impl Iterator<Item = usize> {
        (self.start()..n).step_by(self.stride())
    }

    /// Every pixel index this lane owns in a frame of `n` pixels.
    pub fn pixel_indices(&self, n: usize) -> impl Iterator<Item = usize> {
        let width = self.vector_width;
        self.group_offsets(n)
            .flat_map(move |offset| offset..(offset + width).min(n))
    }
}

/// Mutable view of one group across the three frame buffers.
#[derive(Debug)]
pub struct Group<'a> {
    /// Pixel index of the group's first element.
    pub offset: usize,
    /// Slice of the current frame.
    pub current: &'a mut [i32],
    /// Slice of the previous frame.
    pub previous: &'a mut [i32],
    /// Slice of the filter state.
    pub filter: &'a mut [i32],
}

/// Splits frames into per-lane group sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partitioner {
    num_lanes: usize,
    vector_width: usize,
}

impl Partitioner {
    /// Creates a partitioner. Both values must be non-zero.
    pub fn new(num_lanes: usize, vector_width: usize) -> Self {
        assert!(num_lanes > 0, "lane count must be non-zero");
        assert!(vector_width > 0, "vector width must be non-zero");
        Self {
            num_lanes,
            vector_width,
        }
    }

    /// Number of lanes.
    #[inline]
    pub fn num_lanes(&self) -> usize {
        self.num_lanes
    }

    /// Pixels per group.
    #[inline]
    pub fn vector_width(&self) -> usize {
        self.vector_width
    }

    /// Pixels covered by one step of every lane.
    #[inline]
    pub fn stride(&self) -> usize {
        self.num_lanes * self.vector_width
    }

    /// Returns true if a frame of `n` pixels gives every lane the same number of whole groups.
    #[inline]
    pub fn divides(&self, n: usize) -> bool {
        n % self.stride() == 0
    }

    /// Descriptor for `lane_id`.
    pub fn lane(&self, lane_id: usize) -> LaneDescriptor {
        debug_assert!(lane_id < self.num_lanes);
        LaneDescriptor {
            lane_id,
            vector_width: self.vector_width,
            num_lanes: self.num_lanes,
        }
    }

    /// Descriptors for every lane, in lane order.
    pub fn lanes(&self) -> impl Iterator<Item = LaneDescriptor> + '_ {
        (0..self.num_lanes).map(move |id| self.lane(id))
    }

    /// Deals the three buffers out to lanes as disjoint mutable groups.
    ///
    /// Entry `l` of the result holds lane `l`'s groups in visiting order,
    /// matching [`LaneDescriptor::group_offsets`].
    pub fn deal<'a>(
        &self,
        current: &'a mut [i32],
        previous: &'a mut [i32],
        filter: &'a mut [i32],
    ) -> Vec<Vec<Group<'a>>> {
        assert_eq!(current.len(), previous.len(), "buffer length mismatch");
        assert_eq!(current.len(), filter.len(), "buffer length mismatch");

        let per_lane = current.len() / self.stride() + 1;
        let mut lanes: Vec<Vec<Group<'a>>> = (0..self.num_lanes)
            .map(|_| Vec::with_capacity(per_lane))
            .collect();

        let groups = current
            .chunks_mut(self.vector_width)
            .zip(previous.chunks_mut(self.vector_width))
            .zip(filter.chunks_mut(self.vector_width));

        for (g, ((current, previous), filter)) in groups.enumerate() {
            lanes[g % self.num_lanes].push(Group {
                offset: g * self.vector_width,
                current,
                previous,
                filter,
            });
        }

        lanes
    }
}
