//! Planner：组装 prompt、向推理引擎请求决策、解析决策
//!
//! 决策格式为一个 JSON 对象：`{"thought", "action", "action_input"}` 或 `{"thought", "final_answer"}`；
//! 兼容 ```json 围栏、裸 JSON 与经典文本格式（Thought / Action / Action Input / Final Answer）。
//! 其他纯文本视为最终回答。

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::time::timeout;

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::mail::Task;
use crate::memory::Message;
use crate::tools::ToolRegistry;

/// 推理引擎的一次决策
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// 调用工具（tool 为模型给出的原始名字，由调用方解析为 ToolKind）
    Action {
        thought: Option<String>,
        tool: String,
        input: String,
    },
    /// 结束并给出回答
    Final {
        thought: Option<String>,
        answer: String,
    },
}

#[derive(Debug, Deserialize)]
struct RawDecision {
    #[serde(default)]
    thought: Option<String>,
    #[serde(default, alias = "tool")]
    action: Option<String>,
    #[serde(default, alias = "input", alias = "args")]
    action_input: Option<Value>,
    #[serde(default, alias = "answer", alias = "response")]
    final_answer: Option<Value>,
}

fn value_text(v: Value) -> String {
    match v {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn decision_from_json(json: &str) -> Result<Decision, AgentError> {
    let raw: RawDecision = serde_json::from_str(json)
        .map_err(|e| AgentError::MalformedDecision(format!("{e}")))?;
    let thought = non_empty(raw.thought);
    if let Some(tool) = non_empty(raw.action) {
        return Ok(Decision::Action {
            thought,
            tool,
            input: raw.action_input.map(value_text).unwrap_or_default().trim().to_string(),
        });
    }
    match raw.final_answer {
        Some(answer) => Ok(Decision::Final {
            thought,
            answer: value_text(answer).trim().to_string(),
        }),
        None => Err(AgentError::MalformedDecision(
            "expected either \"action\" or \"final_answer\"".to_string(),
        )),
    }
}

/// ```json ... ``` 或 ``` ... ``` 中的内容
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let rest = &text[start + 3..];
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let end = rest.find("```").unwrap_or(rest.len());
    Some(rest[..end].trim())
}

/// 在 text 中找第一个以 key 开头的行，返回该关键字之后的字节位置
fn keyword_pos(text: &str, key: &str) -> Option<usize> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed
            .get(..key.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(key))
        {
            let lead = line.len() - trimmed.len();
            return Some(offset + lead + key.len());
        }
        offset += line.len();
    }
    None
}

/// 从 pos 开始取到下一个关键字行之前
fn section(text: &str, pos: usize, stops: &[&str]) -> String {
    let rest = &text[pos..];
    let end = stops
        .iter()
        .filter_map(|k| keyword_pos(rest, k).map(|p| p - k.len()))
        .min()
        .unwrap_or(rest.len());
    rest[..end].trim().to_string()
}

const THOUGHT: &str = "Thought:";
const ACTION: &str = "Action:";
const ACTION_INPUT: &str = "Action Input:";
const FINAL_ANSWER: &str = "Final Answer:";
const OBSERVATION: &str = "Observation:";

/// 经典文本格式；既无 Action 也无 Final Answer 时返回 None
fn classic_decision(text: &str) -> Option<Decision> {
    let action_pos = keyword_pos(text, ACTION);
    let final_pos = keyword_pos(text, FINAL_ANSWER);
    let thought = keyword_pos(text, THOUGHT)
        .map(|p| section(text, p, &[ACTION, FINAL_ANSWER, OBSERVATION]))
        .filter(|t| !t.is_empty());

    match (action_pos, final_pos) {
        (Some(a), f) if f.map_or(true, |f| a < f) => {
            let tool = section(text, a, &[ACTION_INPUT, OBSERVATION, FINAL_ANSWER]);
            let input = keyword_pos(text, ACTION_INPUT)
                .map(|p| section(text, p, &[OBSERVATION, FINAL_ANSWER, THOUGHT]))
                .unwrap_or_default();
            let input = input.trim_matches('"').trim().to_string();
            Some(Decision::Action { thought, tool, input })
        }
        (_, Some(f)) => Some(Decision::Final {
            thought,
            answer: section(text, f, &[OBSERVATION]),
        }),
        _ => None,
    }
}

/// 解析推理引擎输出
///
/// 围栏 JSON 或以 `{` 开头的输出必须是合法决策，否则为 MalformedDecision；
/// 散文里夹带的大括号解析失败时按纯文本回答处理。
pub fn parse_decision(output: &str) -> Result<Decision, AgentError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Err(AgentError::MalformedDecision("empty output".to_string()));
    }

    if let Some(block) = fenced_block(trimmed) {
        return decision_from_json(block);
    }
    if trimmed.starts_with('{') {
        let end = trimmed.rfind('}').map_or(trimmed.len(), |e| e + 1);
        return decision_from_json(&trimmed[..end]);
    }
    if let Some(decision) = classic_decision(trimmed) {
        return Ok(decision);
    }
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(decision) = decision_from_json(&trimmed[start..=end]) {
                return Ok(decision);
            }
        }
    }
    Ok(Decision::Final {
        thought: None,
        answer: trimmed.to_string(),
    })
}

const POLICY: &str = "\
Rules:
- Use one tool per turn and wait for its observation before deciding the next step.
- If scheduling information is incomplete, assume reasonable defaults (next business day, 10:00, one hour). Never ask the user a scheduling question.
- For filter_email and summarize_email pass only the email body text.";

const REQUEST_INFO_RULE: &str = "\
- Only when essential non-scheduling information is missing and no reasonable default exists, \
reply with a final answer containing <<REQUEST_INFO: your question>>.";

/// system prompt：工具清单、决策格式与规则
pub fn build_system_prompt(registry: &ToolRegistry) -> String {
    let tools = registry
        .tool_descriptions()
        .into_iter()
        .map(|(name, desc)| format!("- {name}: {desc}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You are an email triage assistant acting on behalf of the user.\n\n\
        Available tools:\n{tools}\n\n\
        Reply with exactly one JSON object per turn and nothing else.\n\
        To call a tool: {{\"thought\": \"...\", \"action\": \"<tool name>\", \"action_input\": \"<input string>\"}}\n\
        To finish: {{\"thought\": \"...\", \"final_answer\": \"<answer for the user>\"}}"
    )
}

/// 任务 prompt；带 user_input 时引用用户回答，且不再允许请求补充信息
pub fn build_task_prompt(task: &Task) -> String {
    let mut prompt = format!(
        "Process this email step by step:\n\n\
        Subject: {}\nFrom: {}\nBody: {}\n\n\
        Steps to follow:\n\
        1. First classify this email using the filter_email tool.\n\
        2. Then summarize it using the summarize_email tool.\n\
        3. Based on the classification, decide whether any other action is needed \
        (draft_email, schedule_meeting, snooze_email).\n\n{POLICY}\n",
        task.subject, task.sender, task.body
    );
    match &task.user_input {
        Some(answer) => prompt.push_str(&format!(
            "\nThe user answered your earlier question: {answer:?}\n\
            Use this answer to continue. Do not ask the user for more information.\n"
        )),
        None => {
            prompt.push_str(REQUEST_INFO_RULE);
            prompt.push('\n');
        }
    }
    prompt
}

/// Planner：持有 LLM 与单次决策超时
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    decision_timeout: Duration,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, decision_timeout_secs: u64) -> Self {
        Self {
            llm,
            decision_timeout: Duration::from_secs(decision_timeout_secs),
        }
    }

    /// 获取 LLM 累计 token 使用统计
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    /// 请求一次决策，返回原始输出；超时为 DecisionTimeout，调用失败为 LlmError
    pub async fn decide(&self, messages: &[Message]) -> Result<String, AgentError> {
        match timeout(self.decision_timeout, self.llm.complete(messages)).await {
            Ok(Ok(raw)) => Ok(raw),
            Ok(Err(e)) => Err(AgentError::LlmError(e)),
            Err(_) => Err(AgentError::DecisionTimeout(self.decision_timeout.as_secs())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(tool: &str, input: &str) -> Decision {
        Decision::Action {
            thought: Some("t".into()),
            tool: tool.into(),
            input: input.into(),
        }
    }

    #[test]
    fn test_parse_bare_json_action() {
        let d = parse_decision(r#"{"thought": "t", "action": "filter_email", "action_input": "hello"}"#)
            .unwrap();
        assert_eq!(d, action("filter_email", "hello"));
    }

    #[test]
    fn test_parse_fenced_json_final() {
        let out = "Sure:\n```json\n{\"thought\": \"t\", \"final_answer\": \"All done\"}\n```";
        assert_eq!(
            parse_decision(out).unwrap(),
            Decision::Final {
                thought: Some("t".into()),
                answer: "All done".into()
            }
        );
    }

    #[test]
    fn test_parse_tool_args_aliases() {
        let d = parse_decision(r#"{"tool": "snooze_email", "args": 3}"#).unwrap();
        assert_eq!(
            d,
            Decision::Action {
                thought: None,
                tool: "snooze_email".into(),
                input: "3".into()
            }
        );
    }

    #[test]
    fn test_parse_classic_text() {
        let out = "Thought: I should classify.\nAction: filter_email\nAction Input: urgent: reset\nObservation: made up";
        assert_eq!(
            parse_decision(out).unwrap(),
            Decision::Action {
                thought: Some("I should classify.".into()),
                tool: "filter_email".into(),
                input: "urgent: reset".into()
            }
        );
        let out = "Thought: done\nFinal Answer: Classified as WORK.";
        assert_eq!(
            parse_decision(out).unwrap(),
            Decision::Final {
                thought: Some("done".into()),
                answer: "Classified as WORK.".into()
            }
        );
    }

    #[test]
    fn test_malformed_json_is_error() {
        assert!(matches!(
            parse_decision(r#"{"thought": "t", "action": "#),
            Err(AgentError::MalformedDecision(_))
        ));
        assert!(matches!(
            parse_decision(r#"{"thought": "only thinking"}"#),
            Err(AgentError::MalformedDecision(_))
        ));
        assert!(matches!(parse_decision("   "), Err(AgentError::MalformedDecision(_))));
    }

    #[test]
    fn test_plain_text_is_final_answer() {
        assert_eq!(
            parse_decision("The email is a newsletter {weekly}.").unwrap(),
            Decision::Final {
                thought: None,
                answer: "The email is a newsletter {weekly}.".into()
            }
        );
    }

    #[test]
    fn test_task_prompt_policy_and_resume() {
        let task = Task {
            email_id: "e1".into(),
            user_id: "u1".into(),
            subject: "Sync".into(),
            sender: "bob@example.com".into(),
            body: "Can we meet?".into(),
            user_input: None,
        };
        let first = build_task_prompt(&task);
        assert!(first.contains("Never ask the user a scheduling question"));
        assert!(first.contains("<<REQUEST_INFO"));

        let resumed = build_task_prompt(&task.with_user_input("3pm"));
        assert!(resumed.contains("\"3pm\""));
        assert!(!resumed.contains("<<REQUEST_INFO"));
    }
}
