//! Loom Config
//!
//! This crate contains the serializable workflow definition types for loom.
//! A [`Workflow`] is the document a run operates on: an ordered list of typed
//! nodes plus the edges that connect their outputs to downstream inputs.
//!
//! Definitions use the camelCase wire format produced by the workflow editor:
//!
//! ```json
//! {
//!   "id": "wf-1",
//!   "name": "Example",
//!   "nodes": [
//!     { "id": "a", "type": "input", "data": { "name": "Start" } },
//!     { "id": "b", "type": "condition", "data": { "config": { "condition": "input.input.ok" } } }
//!   ],
//!   "edges": [ { "source": "a", "target": "b" } ]
//! }
//! ```
//!
//! Run-level knobs ([`ExecutionOptions`]) and the debugger configuration
//! ([`DebugOptions`]) live here as well so that front ends can deserialize
//! them without depending on the engine.

mod edge;
mod error;
mod node;
mod options;
mod retry;
mod workflow;

pub use edge::Edge;
pub use error::ConfigError;
pub use node::{Node, NodeData, NodeType};
pub use options::{DebugOptions, DebugOptionsUpdate, ExecutionOptions, LogLevel};
pub use retry::{ErrorBehavior, RetryPolicy};
pub use workflow::Workflow;
