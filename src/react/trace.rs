//! 推理记录：按步记录 thought / action / observation，提供原始日志与结构化视图
//!
//! 由 ReAct 循环显式调用（不是事件订阅），只追加，不会失败也不会阻塞。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// LLM 调用边界
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBoundary {
    Start,
    End,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub step: usize,
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEntry {
    pub step: usize,
    pub timestamp: DateTime<Utc>,
    pub tool: String,
    pub input: String,
}

/// 结构化视图：三个序列各自按步号对齐，允许某一步缺项
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredThoughts {
    pub thoughts: Vec<TraceEntry>,
    pub actions: Vec<ActionEntry>,
    pub observations: Vec<TraceEntry>,
}

/// 按步号重组后的一步
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub index: usize,
    pub thought: Option<String>,
    pub action: Option<(String, String)>,
    pub observation: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct ReasoningTrace {
    step: usize,
    logs: Vec<String>,
    structured: StructuredThoughts,
}

impl ReasoningTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次向推理引擎请求决策前调用一次，返回新的步号（从 1 开始）
    pub fn next_step(&mut self) -> usize {
        self.step += 1;
        self.step
    }

    pub fn current_step(&self) -> usize {
        self.step
    }

    fn log(&mut self, line: String) {
        self.logs.push(format!("[step {}] {}", self.step, line));
    }

    pub fn record_thought(&mut self, thought: &str) {
        let thought = thought.trim();
        if thought.is_empty() {
            return;
        }
        self.log(format!("Thought: {thought}"));
        self.structured.thoughts.push(TraceEntry {
            step: self.step,
            timestamp: Utc::now(),
            text: thought.to_string(),
        });
    }

    pub fn record_action(&mut self, thought: Option<&str>, tool: &str, input: &str) {
        if let Some(thought) = thought {
            self.record_thought(thought);
        }
        self.log(format!("Action: {tool} | Input: {input}"));
        self.structured.actions.push(ActionEntry {
            step: self.step,
            timestamp: Utc::now(),
            tool: tool.to_string(),
            input: input.to_string(),
        });
    }

    pub fn record_observation(&mut self, output: &str) {
        self.log(format!("Observation: {output}"));
        self.structured.observations.push(TraceEntry {
            step: self.step,
            timestamp: Utc::now(),
            text: output.to_string(),
        });
    }

    pub fn record_llm_boundary(&mut self, kind: LlmBoundary) {
        let line = match kind {
            LlmBoundary::Start => "LLM start",
            LlmBoundary::End => "LLM end",
            LlmBoundary::Error => "LLM error",
        };
        self.log(line.to_string());
    }

    pub fn record_final(&mut self, answer: &str) {
        self.log(format!("Final Answer: {answer}"));
    }

    pub fn record_error(&mut self, message: &str) {
        self.log(format!("Error: {message}"));
    }

    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    pub fn get_logs(&self) -> Vec<String> {
        self.logs.clone()
    }

    pub fn structured(&self) -> &StructuredThoughts {
        &self.structured
    }

    pub fn get_structured(&self) -> StructuredThoughts {
        self.structured.clone()
    }

    /// 按步号重组；缺失的字段保持 None
    pub fn steps(&self) -> Vec<Step> {
        let mut steps: BTreeMap<usize, Step> = BTreeMap::new();
        for t in &self.structured.thoughts {
            step_entry(&mut steps, t.step, t.timestamp).thought = Some(t.text.clone());
        }
        for a in &self.structured.actions {
            step_entry(&mut steps, a.step, a.timestamp).action =
                Some((a.tool.clone(), a.input.clone()));
        }
        for o in &self.structured.observations {
            step_entry(&mut steps, o.step, o.timestamp).observation = Some(o.text.clone());
        }
        steps.into_values().collect()
    }
}

fn step_entry(
    steps: &mut BTreeMap<usize, Step>,
    index: usize,
    timestamp: DateTime<Utc>,
) -> &mut Step {
    steps.entry(index).or_insert_with(|| Step {
        index,
        thought: None,
        action: None,
        observation: None,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_stamped_with_step() {
        let mut trace = ReasoningTrace::new();
        trace.next_step();
        trace.record_action(Some("classify first"), "filter_email", "body");
        trace.record_observation("Category: WORK");
        trace.next_step();
        trace.record_thought("done");
        trace.record_final("All set");

        let s = trace.structured();
        assert_eq!(s.thoughts.len(), 2);
        assert_eq!(s.actions[0].step, 1);
        assert_eq!(s.observations[0].step, 1);
        assert_eq!(s.thoughts[1].step, 2);
        assert!(trace.logs().iter().any(|l| l == "[step 1] Action: filter_email | Input: body"));
        assert_eq!(trace.logs().last().unwrap(), "[step 2] Final Answer: All set");
    }

    #[test]
    fn test_steps_tolerate_missing_fields() {
        let mut trace = ReasoningTrace::new();
        trace.next_step();
        trace.record_action(None, "snooze_email", "2");
        trace.next_step();
        trace.record_thought("finishing");

        let steps = trace.steps();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].thought, None);
        assert_eq!(steps[0].observation, None);
        assert_eq!(steps[0].action, Some(("snooze_email".into(), "2".into())));
        assert_eq!(steps[1].thought.as_deref(), Some("finishing"));
        assert_eq!(steps[1].action, None);
    }
}
