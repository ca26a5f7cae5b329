//! Lane-parallel frame-difference and IIR smoothing kernel.
//!
//! A launch deals the frame out to a fixed number of lanes (see
//! [`lanes`]). Every lane runs the same program over its own groups with a
//! depth-1 software pipeline: the next group is fetched before the current
//! one is computed, and the fetch left in flight after the last group is
//! drained and discarded. Lanes share no indices, so the only
//! synchronisation is the join at the end of the launch.
//!
//! Two variants exist. [`Variant::ColdStart`] runs on the first frame of a
//! session and seeds the filter state with the raw difference.
//! [`Variant::SteadyState`] runs on every later frame:
//!
//! ```text
//! diff            = |current - previous|
//! filtered        = (filter * (2^K - 1) + diff) >> K
//! filter, current = filtered
//! previous        = current (input)
//! ```

pub mod lanes;
pub mod pipeline;
pub mod vector;

pub use lanes::{Group, LaneDescriptor, Partitioner};
pub use pipeline::{Cursor, FetchQueue};
pub use vector::{Mask, Vector, MAX_VECTOR_WIDTH};

use crate::config::{ConfigError, KernelConfig};
use crate::store::FrameStore;
use thiserror::Error;

/// Errors that can occur while setting up the kernel.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("invalid kernel parameters: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to start lane pool: {0}")]
    LanePool(#[from] rayon::ThreadPoolBuildError),
}

/// Which kernel body a launch runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// First frame: filter state is seeded with the raw difference.
    ColdStart,
    /// Every later frame: exponential smoothing of the difference.
    SteadyState,
}

impl Variant {
    /// Variant for a store that has already seen `invocations` launches.
    pub fn for_invocation(invocations: u64) -> Self {
        if invocations == 0 {
            Variant::ColdStart
        } else {
            Variant::SteadyState
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variant::ColdStart => write!(f, "cold-start"),
            Variant::SteadyState => write!(f, "steady-state"),
        }
    }
}

/// How the equal case of the three-way difference is filled in.
#[derive(Debug, Clone, Copy)]
enum EqualCase {
    /// Assign zero explicitly.
    Zero,
    /// Assign `current - previous`, which is zero under the mask.
    Difference,
}

/// Pipeline counters for one lane of one launch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaneStats {
    /// Lane index.
    pub lane_id: usize,
    /// Groups computed and stored.
    pub groups: usize,
    /// Fetches issued across all address streams.
    pub gathers: u64,
    /// Fetches consumed across all address streams, drain included.
    pub receives: u64,
    /// Elements held by the drained fetches (non-zero only if a drain read real data).
    pub drained_elements: usize,
    /// Deepest any stream's FIFO got.
    pub max_in_flight: usize,
}

/// Summary of one kernel launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchStats {
    /// Variant that ran.
    pub variant: Variant,
    /// Per-lane counters in lane order.
    pub lanes: Vec<LaneStats>,
}

impl LaunchStats {
    /// Groups computed by all lanes.
    pub fn total_groups(&self) -> usize {
        self.lanes.iter().map(|l| l.groups).sum()
    }
}

/// A configured kernel with its lane pool.
pub struct FrameKernel {
    partitioner: Partitioner,
    smoothing_shift: u32,
    pool: rayon::ThreadPool,
}

impl FrameKernel {
    /// Builds the kernel and spawns one worker per lane.
    ///
    /// Rejects parameters outside the ranges [`KernelConfig::validate_params`]
    /// accepts before any thread is started.
    pub fn new(config: &KernelConfig) -> Result<Self, KernelError> {
        config.validate_params()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.lanes)
            .thread_name(|i| format!("lane-{i}"))
            .build()?;

        tracing::debug!(
            lanes = config.lanes,
            vector_width = config.vector_width,
            shift = config.smoothing_shift,
            "Kernel lane pool started"
        );

        Ok(Self {
            partitioner: Partitioner::new(config.lanes, config.vector_width),
            smoothing_shift: config.smoothing_shift,
            pool,
        })
    }

    /// The kernel's partitioner.
    pub fn partitioner(&self) -> &Partitioner {
        &self.partitioner
    }

    /// Smoothing shift `K`.
    pub fn smoothing_shift(&self) -> u32 {
        self.smoothing_shift
    }

    /// Runs the variant that matches the store's history.
    pub fn process(&self, store: &mut FrameStore) -> LaunchStats {
        let variant = Variant::for_invocation(store.invocations());
        self.launch(variant, store)
    }

    /// Runs `variant` over the whole store and waits for every lane.
    ///
    /// # Panics
    ///
    /// Panics if the frame size is not a multiple of the lane stride.
    pub fn launch(&self, variant: Variant, store: &mut FrameStore) -> LaunchStats {
        let n = store.pixel_count();
        assert!(
            self.partitioner.divides(n),
            "frame of {} pixels is not a multiple of lane stride {}",
            n,
            self.partitioner.stride()
        );

        let shift = self.smoothing_shift;
        let partitioner = self.partitioner;
        let (current, previous, filter) = store.lend();
        let dealt = partitioner.deal(current, previous, filter);
        let mut stats = vec![LaneStats::default(); partitioner.num_lanes()];

        self.pool.scope(|s| {
            let lanes = partitioner.lanes().zip(dealt).zip(stats.iter_mut());
            for ((lane, mut groups), slot) in lanes {
                s.spawn(move |_| {
                    *slot = match variant {
                        Variant::ColdStart => cold_start(&lane, &mut groups),
                        Variant::SteadyState => steady_state(&lane, &mut groups, shift),
                    };
                });
            }
        });

        store.record_invocation();

        LaunchStats {
            variant,
            lanes: stats,
        }
    }
}

impl std::fmt::Debug for FrameKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameKernel")
            .field("lanes", &self.partitioner.num_lanes())
            .field("vector_width", &self.partitioner.vector_width())
            .field("smoothing_shift", &self.smoothing_shift)
            .finish()
    }
}

/// Absolute difference as three predicated assignments.
fn masked_abs_diff(icurr: &Vector, iprev: &Vector, equal: EqualCase) -> Vector {
    let width = icurr.width();
    let mut diff = Vector::zeros(width);

    let eq = icurr.eq_mask(iprev);
    match equal {
        EqualCase::Zero => diff.assign_where(eq, &Vector::zeros(width)),
        EqualCase::Difference => diff.assign_where(eq, &(icurr - iprev)),
    }
    diff.assign_where(icurr.gt_mask(iprev), &(icurr - iprev));
    diff.assign_where(icurr.lt_mask(iprev), &(iprev - icurr));

    diff
}

fn steady_state(lane: &LaneDescriptor, groups: &mut [Group<'_>], shift: u32) -> LaneStats {
    let coef = (1i32 << shift) - 1;
    let mut cursor = Cursor::new(lane);
    let mut x = FetchQueue::new();
    let mut y = FetchQueue::new();
    let mut z = FetchQueue::new();

    let head = groups.first();
    x.gather(head.map(|g| &*g.current));
    y.gather(head.map(|g| &*g.previous));
    z.gather(head.map(|g| &*g.filter));

    for k in 0..groups.len() {
        let icurr = x.receive();
        let iprev = y.receive();
        let ifilter = z.receive();

        let next = groups.get(k + 1);
        debug_assert!(next.iter().all(|g| g.offset == cursor.prefetch_offset()));
        x.gather(next.map(|g| &*g.current));
        y.gather(next.map(|g| &*g.previous));
        z.gather(next.map(|g| &*g.filter));

        let diff = masked_abs_diff(&icurr, &iprev, EqualCase::Difference);
        let filtered = &(&(&ifilter * coef) + &diff) >> shift;

        let group = &mut groups[k];
        debug_assert_eq!(group.offset, cursor.offset());
        icurr.store(group.previous);
        filtered.store(group.filter);
        filtered.store(group.current);

        cursor.advance();
    }

    // Discard the prefetch issued on the final iteration
    let drained = x.receive().width() + y.receive().width() + z.receive().width();
    debug_assert_eq!(x.depth() + y.depth() + z.depth(), 0);

    LaneStats {
        lane_id: lane.lane_id,
        groups: cursor.steps(),
        gathers: x.issued() + y.issued() + z.issued(),
        receives: x.received() + y.received() + z.received(),
        drained_elements: drained,
        max_in_flight: x.max_depth().max(y.max_depth()).max(z.max_depth()),
    }
}

fn cold_start(lane: &LaneDescriptor, groups: &mut [Group<'_>]) -> LaneStats {
    let mut cursor = Cursor::new(lane);
    let mut x = FetchQueue::new();
    let mut y = FetchQueue::new();

    let head = groups.first();
    x.gather(head.map(|g| &*g.current));
    y.gather(head.map(|g| &*g.previous));

    for k in 0..groups.len() {
        let icurr = x.receive();
        let iprev = y.receive();

        let next = groups.get(k + 1);
        debug_assert!(next.iter().all(|g| g.offset == cursor.prefetch_offset()));
        x.gather(next.map(|g| &*g.current));
        y.gather(next.map(|g| &*g.previous));

        let diff = masked_abs_diff(&icurr, &iprev, EqualCase::Zero);

        let group = &mut groups[k];
        debug_assert_eq!(group.offset, cursor.offset());
        icurr.store(group.previous);
        diff.store(group.current);
        diff.store(group.filter);

        cursor.advance();
    }

    let drained = x.receive().width() + y.receive().width();
    debug_assert_eq!(x.depth() + y.depth(), 0);

    LaneStats {
        lane_id: lane.lane_id,
        groups: cursor.steps(),
        gathers: x.issued() + y.issued(),
        receives: x.received() + y.received(),
        drained_elements: drained,
        max_in_flight: x.max_depth().max(y.max_depth()),
    }
}
