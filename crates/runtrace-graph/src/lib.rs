//! Control-flow graph reconstruction for recorded automation runs.
//!
//! Rebuilds a traversable node graph from a script/automation definition
//! and (optionally) the [`TraceRecord`](runtrace_core::TraceRecord) of one
//! run, then provides navigation over it:
//!
//! - [`builder`]: config + trace -> [`GraphNode`] forest mirroring the
//!   control-flow constructs (sequences, condition branches, choose blocks
//!   with an implicit default branch, repeat loops with a return edge).
//! - [`navigator`]: breadth-first traversal, select-by-path, and
//!   step-to-next/previous-tracked-node operations with a selection cursor.
//! - [`cache`]: single-entry memoization of the built forest, keyed on a
//!   stable `(run_id, version)` pair so repeated renders and traversals
//!   reuse one graph instance per run.
//!
//! Everything here is a pure, synchronous transformation over immutable
//! snapshots; the forest is never mutated after construction.

pub mod builder;
pub mod cache;
pub mod navigator;
pub mod node;

pub use builder::{build_automation, GraphBuilder};
pub use cache::GraphCache;
pub use node::{Branch, GraphNode, NodeKind, Selection, SelectorIndex};
