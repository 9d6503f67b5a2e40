//! warren-exec: Host command execution
//!
//! Provides the executor trait used by every host-facing collaborator, a
//! reusable command description, and a local `tokio::process` implementation.

pub mod command;
pub mod error;
pub mod local;
pub mod result;
pub mod traits;

pub use command::CommandSpec;
pub use error::ExecError;
pub use local::LocalExecutor;
pub use result::CommandResult;
pub use traits::CommandExecutor;
