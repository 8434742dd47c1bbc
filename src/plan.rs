//! A priority queue of simulation callbacks ordered by time
//!
//! Defines a `Queue<T>` that stores items of type `T` (called 'plans') keyed by
//! `f64` simulated time and an `ExecutionPhase`. The simulation loop in
//! `Context` pops plans in order and runs them. Adding and retrieving a plan
//! are both *O*(log(*n*)).
//!
//! The model uses the phase to split one simulation step into the agent
//! update (`Normal`) and the tally that closes the step (`Last`), both
//! scheduled at the same time.
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Orders plans that are scheduled for the same time. Plans in an earlier
/// phase run first; plans in the same phase run in the order they were added.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExecutionPhase {
    First,
    #[default]
    Normal,
    Last,
}

/// A plan that holds data of type `T` intended to be used at the specified time
pub struct Plan<T> {
    pub time: f64,
    pub data: T,
}

/// A heap entry. Ordering only looks at the time, the phase and the
/// insertion counter.
struct Entry<T> {
    time: f64,
    phase: ExecutionPhase,
    id: u64,
    data: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// `BinaryHeap` is a max-heap, so every comparison is reversed.
impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.phase.cmp(&self.phase))
            .then_with(|| other.id.cmp(&self.id))
    }
}

pub struct Queue<T> {
    queue: BinaryHeap<Entry<T>>,
    plan_counter: u64,
}

impl<T> Queue<T> {
    #[must_use]
    pub fn new() -> Queue<T> {
        Queue {
            queue: BinaryHeap::new(),
            plan_counter: 0,
        }
    }

    /// Add a plan to the queue at the specified time and phase
    pub fn add_plan(&mut self, time: f64, data: T, phase: ExecutionPhase) {
        let id = self.plan_counter;
        self.queue.push(Entry {
            time,
            phase,
            id,
            data,
        });
        self.plan_counter += 1;
    }

    /// Remove and return the earliest plan.
    pub fn get_next_plan(&mut self) -> Option<Plan<T>> {
        self.queue.pop().map(|entry| Plan {
            time: entry.time,
            data: entry.data,
        })
    }

    /// Drop every pending plan.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}
