//! Agent 错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：可恢复错误转为 Observation 继续循环，不可恢复错误终止本次运行。

use thiserror::Error;

/// Agent 运行过程中可能出现的错误（推理引擎、决策解析、工具、取消等）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    /// 推理引擎（completion capability）调用失败
    #[error("LLM error: {0}")]
    LlmError(String),

    /// 单次决策调用超过墙钟上限
    #[error("Reasoning engine timed out after {0}s")]
    DecisionTimeout(u64),

    /// 决策输出看起来是 JSON 但无法解析
    #[error("Malformed decision: {0}")]
    MalformedDecision(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool {tool} failed: {reason}")]
    ToolExecutionFailed { tool: String, reason: String },

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Config error: {0}")]
    ConfigError(String),
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// 作为 Observation 写回，让推理引擎有机会自行修正
    Observe(String),
    /// 终止当前运行
    Abort,
}
