//! Execution-path split/merge engine.
//!
//! When the float and real executions of a program disagree at a decision
//! point, the computation forks: each fork follows one consistent choice,
//! and the forks are joined back at the end of the split.

pub mod explorer;
pub mod flow;
pub mod memory;

pub use explorer::{BranchOption, BranchSelection, ForkRole, PathExplorer};
pub use flow::{continuous_flow, split_merge, LoopOutcome, MergeOutcome};
pub use memory::{Memory, MergeBranches, MergeMemory};
