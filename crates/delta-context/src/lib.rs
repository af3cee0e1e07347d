//! Context Builder: resolves a context manifest into an ordered message
//! list from static files, computed-file generators, and journal replay.

pub mod builder;
pub mod error;
pub mod vars;

pub use builder::build;
pub use error::ContextError;
pub use vars::{substitute, TemplateVars};
