//! Parameter binding, subprocess spawning, tool execution, and hook
//! execution: everything that turns a proposed action into a captured,
//! persisted observation.

pub mod bind;
pub mod error;
pub mod hooks;
pub mod spawn;
pub mod tool_executor;

pub use bind::{bind, BoundCommand};
pub use error::{HookError, ToolError};
pub use hooks::{run_hook, HookContext, HookControl, HookOutcome};
pub use spawn::{run_bounded, SpawnOutcome};
pub use tool_executor::{execute, ExecuteToolOutcome};
