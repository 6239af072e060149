//! Ready-made [`System`](crate::System) implementations.

mod interval;
mod iterating;
mod sorted;

pub use interval::{IntervalIteratingSystem, IntervalSystem, IntervalTask};
pub use iterating::{EntityProcessor, IteratingSystem};
pub use sorted::{SortedIteratingSystem, SortedProcessor};
