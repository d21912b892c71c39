//! Segment graph and navigator.
//!
//! Each segment declares the fields it owns and a table of skip rules
//! (predicate → branch target) evaluated by a single navigator.

pub mod graph;
pub mod segment;

pub use graph::SegmentGraph;
pub use segment::{BranchTarget, Segment, SegmentId, SkipRule};
