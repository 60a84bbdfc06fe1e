//! Loom Engine
//!
//! This crate runs workflows: it plans a workflow into a dependencies-first
//! order, dispatches each node to a handler, and tracks every run from
//! `pending` to `completed`, `failed` or `aborted`.
//!
//! # Architecture
//!
//! ```text
//! WorkflowEngine
//! ├── execute_workflow(workflow, options) -> WorkflowExecution
//! ├── abort_execution(run_id)
//! ├── set_debug_options / continue_execution
//! └── execution_updates / history_updates   (subscriber lists)
//!
//! WorkflowExecution
//! └── wait() - plan, run sequentially (debug pauses, retries) or in
//!              parallel (dependency-driven), then record the outcome
//!
//! NodeExecutor
//! └── execute() - input resolution + handler dispatch + result recording
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use loom_engine::WorkflowEngine;
//! use loom_config::{ExecutionOptions, Workflow};
//!
//! let engine = WorkflowEngine::new();
//! engine.execution_updates().subscribe(|update: &ExecutionUpdate| {
//!     println!("{:?} {}", update.state, update.message);
//! });
//!
//! let workflow = Workflow::load("workflow.json")?;
//! let run_id = engine.run(workflow, ExecutionOptions::parallel()).await?;
//! ```

mod debug;
mod engine;
mod error;
mod events;
mod executor;
mod history;
mod input;
mod result;
mod retry;
mod strategy;

pub mod handlers;
pub mod transport;

pub use debug::DebugController;
pub use engine::{WorkflowEngine, WorkflowExecution};
pub use error::{EngineError, HandlerError};
pub use events::{
  ChannelNotifier, EventBus, ExecutionNotifier, ExecutionState, ExecutionUpdate, SubscriptionId,
};
pub use handlers::{AgentMessage, AgentMessenger, HandlerContext, HandlerRegistry, NodeHandler};
pub use history::{ExecutionRun, RunHistory};
pub use input::resolve_inputs;
pub use result::{Metrics, NodeResult, RunResults};
pub use transport::{Transport, TransportError};

// Definition types used throughout the engine API.
pub use loom_config::{
  DebugOptions, DebugOptionsUpdate, ExecutionOptions, LogLevel, Node, NodeType, Workflow,
};
pub use loom_store::ExecutionStatus;
