//! ReAct 主循环
//!
//! 构建 prompt -> 请求决策 -> 调用工具 / 结束 / 挂起，循环直到结束。
//! 工具调度次数有硬上限，达到上限时确定性地合成回答（early stopping）。
//! 每次请求决策前检查取消令牌；已记录的步骤不会回滚。

use tokio_util::sync::CancellationToken;

use crate::core::{AgentError, RecoveryAction, RecoveryEngine};
use crate::mail::Task;
use crate::memory::Message;
use crate::react::marker::{find_request_info, strip_request_info};
use crate::react::planner::{build_system_prompt, build_task_prompt, parse_decision, Decision, Planner};
use crate::react::trace::{LlmBoundary, ReasoningTrace};
use crate::tools::{ToolExecutor, ToolKind};

/// Observation 写入日志时的最大字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;

/// 循环状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    BuildingPrompt,
    AwaitingDecision,
    DispatchingTool,
    Halted,
    Suspended,
}

/// 一次运行的终态
#[derive(Debug, Clone, PartialEq)]
pub enum LoopOutcome {
    /// 正常结束（含 early stopping）
    Finished(String),
    /// 需要用户补充信息
    NeedsInput(String),
    /// 不可恢复错误（推理引擎失败、取消）
    Failed(AgentError),
}

/// ReAct 会话：一次运行所需的全部协作方
pub struct ReactSession<'a> {
    pub planner: &'a Planner,
    pub executor: &'a ToolExecutor,
    pub recovery: &'a RecoveryEngine,
    /// 工具调度（含无效决策）次数上限
    pub max_iterations: usize,
    pub cancel_token: CancellationToken,
}

fn preview(s: &str) -> String {
    if s.chars().count() > OBSERVATION_PREVIEW_CHARS {
        format!("{}...", s.chars().take(OBSERVATION_PREVIEW_CHARS).collect::<String>())
    } else {
        s.to_string()
    }
}

/// 达到上限时的回答：只依赖已发生的观察，与推理引擎行为无关。
/// iterations 含解析失败与决策超时，dispatches 只计工具调用
fn early_stop_answer(
    iterations: usize,
    dispatches: usize,
    last: Option<&(String, String)>,
) -> String {
    match last {
        Some((tool, observation)) => format!(
            "Stopped after {iterations} steps ({dispatches} tool calls). Last observation from {tool}: {}",
            preview(observation)
        ),
        None => format!("Stopped after {iterations} steps without a final answer."),
    }
}

fn observation_message(observation: &str) -> Message {
    Message::user(format!("Observation: {observation}"))
}

impl ReactSession<'_> {
    /// 恢复引擎给出 Observe 时返回观察文本，Abort 时返回原错误
    fn recover(&self, err: AgentError) -> Result<String, AgentError> {
        match self.recovery.handle(&err) {
            RecoveryAction::Observe(text) => Ok(text),
            RecoveryAction::Abort => Err(err),
        }
    }

    pub async fn run(&self, task: &Task, trace: &mut ReasoningTrace) -> LoopOutcome {
        let resumed = task.user_input.is_some();
        let mut state = LoopState::BuildingPrompt;
        tracing::debug!(?state, email_id = %task.email_id, resumed, "react run started");

        let mut messages = vec![
            Message::system(build_system_prompt(self.executor.registry())),
            Message::user(build_task_prompt(task)),
        ];
        let mut iterations = 0usize;
        let mut dispatches = 0usize;
        let mut last_observation: Option<(String, String)> = None;

        loop {
            if self.cancel_token.is_cancelled() {
                tracing::info!(email_id = %task.email_id, "react run cancelled");
                trace.record_error(&AgentError::Cancelled.to_string());
                return LoopOutcome::Failed(AgentError::Cancelled);
            }
            if iterations >= self.max_iterations {
                state = LoopState::Halted;
                let answer = early_stop_answer(iterations, dispatches, last_observation.as_ref());
                tracing::info!(?state, iterations, "iteration ceiling reached, early stopping");
                trace.record_final(&answer);
                return LoopOutcome::Finished(answer);
            }

            state = LoopState::AwaitingDecision;
            let step = trace.next_step();
            tracing::debug!(?state, step, iterations, "requesting decision");
            trace.record_llm_boundary(LlmBoundary::Start);
            let raw = match self.planner.decide(&messages).await {
                Ok(raw) => {
                    trace.record_llm_boundary(LlmBoundary::End);
                    raw
                }
                Err(e) => {
                    trace.record_llm_boundary(LlmBoundary::Error);
                    match self.recover(e) {
                        Ok(observation) => {
                            tracing::warn!(step, "decision failed, continuing: {}", observation);
                            iterations += 1;
                            trace.record_observation(&observation);
                            messages.push(observation_message(&observation));
                            continue;
                        }
                        Err(e) => {
                            tracing::warn!(step, error = %e, "reasoning engine failed");
                            trace.record_error(&e.to_string());
                            return LoopOutcome::Failed(e);
                        }
                    }
                }
            };

            let raw = match find_request_info(&raw) {
                Some(question) if !resumed => {
                    state = LoopState::Suspended;
                    tracing::info!(?state, step, question = %question, "agent requested more information");
                    trace.record_final(&raw);
                    return LoopOutcome::NeedsInput(question);
                }
                Some(_) => {
                    tracing::debug!(step, "request for information ignored on resumed run");
                    strip_request_info(&raw)
                }
                None => raw,
            };

            let decision = if raw.trim().is_empty() && resumed {
                Ok(Decision::Final {
                    thought: None,
                    answer: String::new(),
                })
            } else {
                parse_decision(&raw)
            };

            match decision {
                Ok(Decision::Final { thought, answer }) => {
                    state = LoopState::Halted;
                    if let Some(thought) = thought {
                        trace.record_thought(&thought);
                    }
                    let answer = if answer.is_empty() {
                        match &task.user_input {
                            Some(input) => format!("Proceeding with the provided information: {input}"),
                            None => "Done.".to_string(),
                        }
                    } else {
                        answer
                    };
                    tracing::info!(?state, step, iterations, "react run finished");
                    trace.record_final(&answer);
                    return LoopOutcome::Finished(answer);
                }
                Ok(Decision::Action { thought, tool, input }) => {
                    state = LoopState::DispatchingTool;
                    trace.record_action(thought.as_deref(), &tool, &input);
                    iterations += 1;
                    dispatches += 1;
                    tracing::debug!(?state, step, tool = %tool, "dispatching tool");

                    let result = match ToolKind::parse(&tool) {
                        Some(kind) => self.executor.execute(kind, &input).await,
                        None => Err(AgentError::UnknownTool(tool.clone())),
                    };
                    let observation = match result {
                        Ok(out) => out,
                        Err(e) => match self.recover(e) {
                            Ok(text) => text,
                            Err(e) => {
                                trace.record_error(&e.to_string());
                                return LoopOutcome::Failed(e);
                            }
                        },
                    };
                    tracing::debug!(step, observation = %preview(&observation), "observation");
                    trace.record_observation(&observation);
                    messages.push(Message::assistant(raw));
                    messages.push(observation_message(&observation));
                    last_observation = Some((tool, observation));
                }
                Err(e) => {
                    iterations += 1;
                    let observation = match self.recover(e) {
                        Ok(text) => text,
                        Err(e) => {
                            trace.record_error(&e.to_string());
                            return LoopOutcome::Failed(e);
                        }
                    };
                    tracing::warn!(step, "malformed decision: {}", preview(&raw));
                    trace.record_observation(&observation);
                    messages.push(Message::assistant(raw));
                    messages.push(observation_message(&observation));
                }
            }
        }
    }
}

/// 便捷入口：以给定协作方运行一次 ReAct 循环
pub async fn react_loop(
    planner: &Planner,
    executor: &ToolExecutor,
    recovery: &RecoveryEngine,
    task: &Task,
    trace: &mut ReasoningTrace,
    max_iterations: usize,
    cancel_token: CancellationToken,
) -> LoopOutcome {
    ReactSession {
        planner,
        executor,
        recovery,
        max_iterations,
        cancel_token,
    }
    .run(task, trace)
    .await
}
