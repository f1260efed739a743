//! 工具箱：注册表、执行器与五个邮件工具

pub mod draft;
pub mod executor;
pub mod filter;
pub mod registry;
pub mod schedule;
pub mod snooze;
pub mod summarize;

pub use draft::DraftTool;
pub use executor::ToolExecutor;
pub use filter::FilterTool;
pub use registry::{Tool, ToolKind, ToolRegistry};
pub use schedule::ScheduleTool;
pub use snooze::SnoozeTool;
pub use summarize::SummarizeTool;
