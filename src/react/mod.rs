//! 认知层：决策解析与 prompt、ReAct 主循环、补充信息标记、推理记录

pub mod loop_;
pub mod marker;
pub mod planner;
pub mod trace;

pub use loop_::{react_loop, LoopOutcome, LoopState, ReactSession};
pub use marker::{find_request_info, strip_request_info, DEFAULT_QUESTION};
pub use planner::{build_system_prompt, build_task_prompt, parse_decision, Decision, Planner};
pub use trace::{ActionEntry, LlmBoundary, ReasoningTrace, Step, StructuredThoughts, TraceEntry};
