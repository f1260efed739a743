//! 错误恢复引擎
//!
//! 根据 AgentError 类型返回 RecoveryAction，供 ReAct 循环决定是写回 Observation 继续还是终止。

use crate::core::{AgentError, RecoveryAction};
use crate::tools::ToolKind;

/// Observation 中标记失败的前缀
pub const ERROR_MARKER: &str = "Error:";

/// 语义化错误恢复：工具层与决策层错误一律降级为 Observation，推理引擎与取消错误终止
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &AgentError) -> RecoveryAction {
        match err {
            AgentError::ToolExecutionFailed { tool, reason } => {
                RecoveryAction::Observe(format!("{ERROR_MARKER} {tool} failed: {reason}"))
            }
            AgentError::ToolTimeout(tool) => RecoveryAction::Observe(format!(
                "{ERROR_MARKER} {tool} timed out. Try again with a simpler input or finish without it."
            )),
            AgentError::DecisionTimeout(secs) => RecoveryAction::Observe(format!(
                "{ERROR_MARKER} reasoning step timed out after {secs}s. Continue with the next step."
            )),
            AgentError::UnknownTool(name) => {
                let valid: Vec<&str> = ToolKind::ALL.iter().map(|k| k.name()).collect();
                RecoveryAction::Observe(format!(
                    "{ERROR_MARKER} '{name}' is not a valid tool, try one of [{}].",
                    valid.join(", ")
                ))
            }
            AgentError::MalformedDecision(raw) => RecoveryAction::Observe(format!(
                "{ERROR_MARKER} could not parse your last output ({raw}). \
                Reply with exactly one JSON object: \
                {{\"thought\": \"...\", \"action\": \"<tool>\", \"action_input\": \"...\"}} \
                or {{\"thought\": \"...\", \"final_answer\": \"...\"}}."
            )),
            AgentError::LlmError(_) | AgentError::Cancelled | AgentError::ConfigError(_) => {
                RecoveryAction::Abort
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_tool_failure_is_observed() {
        let engine = RecoveryEngine::new();
        let err = AgentError::ToolExecutionFailed {
            tool: "snooze_email".to_string(),
            reason: "Days cannot be negative".to_string(),
        };
        match engine.handle(&err) {
            RecoveryAction::Observe(msg) => {
                assert!(msg.starts_with(ERROR_MARKER));
                assert!(msg.contains("Days cannot be negative"));
            }
            _ => panic!("Expected Observe"),
        }
    }

    #[test]
    fn test_recovery_unknown_tool_lists_valid_names() {
        let engine = RecoveryEngine::new();
        let err = AgentError::UnknownTool("send_fax".to_string());
        match engine.handle(&err) {
            RecoveryAction::Observe(msg) => {
                assert!(msg.contains("send_fax"));
                assert!(msg.contains("summarize_email"));
                assert!(msg.contains("snooze_email"));
            }
            _ => panic!("Expected Observe"),
        }
    }

    #[test]
    fn test_recovery_decision_timeout_is_observed() {
        let engine = RecoveryEngine::new();
        let action = engine.handle(&AgentError::DecisionTimeout(60));
        assert!(matches!(action, RecoveryAction::Observe(ref m) if m.contains("60s")));
    }

    #[test]
    fn test_recovery_llm_error_aborts() {
        let engine = RecoveryEngine::new();
        let action = engine.handle(&AgentError::LlmError("quota".to_string()));
        assert_eq!(action, RecoveryAction::Abort);
    }

    #[test]
    fn test_recovery_cancelled_aborts() {
        let engine = RecoveryEngine::new();
        assert_eq!(engine.handle(&AgentError::Cancelled), RecoveryAction::Abort);
    }
}
