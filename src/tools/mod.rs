pub mod echo;
pub mod executor;
pub mod registry;

pub use echo::EchoTool;
pub use executor::{RetryOutcome, ToolExecutor};
pub use registry::{Tool, ToolInput, ToolOutput, ToolRegistry, ToolStats, ToolSummary};
