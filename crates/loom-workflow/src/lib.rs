//! Loom Workflow
//!
//! Graph analysis for workflow definitions:
//! - [`Graph`] indexes a workflow's edges into upstream/downstream lists
//! - [`plan`] turns a workflow into a dependencies-first execution order,
//!   rejecting cyclic workflows and nodes that no root can reach
//!
//! Both are deterministic: iteration follows the order of the workflow's
//! node and edge lists, so planning the same workflow twice yields the same
//! order.

mod error;
mod graph;
mod planner;

pub use error::WorkflowError;
pub use graph::Graph;
pub use planner::plan;
