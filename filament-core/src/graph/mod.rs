//! Dependency Graph
//!
//! Sources and computations live in one arena owned by the [`Scheduler`],
//! addressed by [`NodeId`]. An edge `B -> A` means `A` read `B` during its
//! last run; edges are dropped and re-recorded on every run, so the graph
//! always reflects what each body actually read.
//!
//! A write walks the dependents once, raising each reached computation to
//! [`DirtyState::Dirty`] or [`DirtyState::Check`] and queueing effects.
//! Deciding what re-runs is left to the runtime.
//!
//! # Design Decisions
//!
//! 1. Edges are kept in both directions so disposal can unlink a node
//!    without scanning the arena.
//!
//! 2. Both edge sets are `IndexSet`s. Iteration follows read order, which
//!    keeps marking and upstream pulls deterministic.
//!
//! 3. Depth is cached per node and refreshed after each run. Sources sit
//!    at depth 0.

mod node;
mod scheduler;

pub use node::{DirtyState, NodeId, NodeKind};

pub(crate) use node::{Compute, Node, NodeValue};
pub(crate) use scheduler::Scheduler;
