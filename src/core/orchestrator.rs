//! Agent 编排器：单次任务的入口
//!
//! 每次 run 都会重新构建绑定任务上下文的工具集、Planner 与推理记录，驱动 ReAct 循环，
//! 并把循环终态投影为 AgentResult。任何错误都只会出现在 AgentResult.error 字段里，不会向调用方传播。

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::agent::{default_registry, AgentServices};
use crate::config::AgentSection;
use crate::core::{AgentError, RecoveryEngine};
use crate::mail::{Task, TaskContext};
use crate::react::{LoopOutcome, Planner, ReactSession, ReasoningTrace, StructuredThoughts};
use crate::tools::{ToolExecutor, ToolRegistry};

/// 额外的工具注册钩子：在默认工具集之后调用，可替换或追加工具
pub type Registrar = Arc<dyn Fn(&mut ToolRegistry, &TaskContext) + Send + Sync>;

/// 一次运行的终态
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgentResult {
    pub responses: Vec<String>,
    /// 原始推理日志（每行带步号）
    pub thoughts: Vec<String>,
    pub structured_thoughts: StructuredThoughts,
    pub needs_input: bool,
    pub prompt: Option<String>,
    pub error: Option<String>,
}

impl AgentResult {
    fn from_outcome(outcome: LoopOutcome, trace: ReasoningTrace) -> Self {
        let thoughts = trace.get_logs();
        let structured_thoughts = trace.get_structured();
        match outcome {
            LoopOutcome::Finished(answer) => Self {
                responses: vec![answer],
                thoughts,
                structured_thoughts,
                ..Self::default()
            },
            LoopOutcome::NeedsInput(question) => Self {
                responses: vec![question.clone()],
                thoughts,
                structured_thoughts,
                needs_input: true,
                prompt: Some(question),
                error: None,
            },
            LoopOutcome::Failed(err) => Self::failed(&err, thoughts, structured_thoughts),
        }
    }

    fn failed(err: &AgentError, thoughts: Vec<String>, structured_thoughts: StructuredThoughts) -> Self {
        let message = err.to_string();
        Self {
            responses: vec![format!("Agent processing failed: {message}")],
            thoughts,
            structured_thoughts,
            needs_input: false,
            prompt: None,
            error: Some(message),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

pub struct Orchestrator {
    services: AgentServices,
    agent: AgentSection,
    recovery: RecoveryEngine,
    registrar: Option<Registrar>,
}

impl Orchestrator {
    pub fn new(services: AgentServices, agent: AgentSection) -> Self {
        Self {
            services,
            agent,
            recovery: RecoveryEngine::new(),
            registrar: None,
        }
    }

    pub fn with_registrar(mut self, registrar: Registrar) -> Self {
        self.registrar = Some(registrar);
        self
    }

    pub fn services(&self) -> &AgentServices {
        &self.services
    }

    pub async fn run(&self, task: &Task) -> AgentResult {
        self.run_with_cancel(task, CancellationToken::new()).await
    }

    /// 取消只在步骤之间检查；已记录的步骤保留在结果中
    pub async fn run_with_cancel(&self, task: &Task, cancel_token: CancellationToken) -> AgentResult {
        let ctx = task.context();
        let mut registry = default_registry(&self.services, &ctx);
        if let Some(registrar) = &self.registrar {
            registrar(&mut registry, &ctx);
        }

        let planner = Planner::new(self.services.llm.clone(), self.agent.decision_timeout_secs);
        let executor = ToolExecutor::new(registry, self.agent.tool_timeout_secs);
        let session = ReactSession {
            planner: &planner,
            executor: &executor,
            recovery: &self.recovery,
            max_iterations: self.agent.max_iterations,
            cancel_token,
        };

        let mut trace = ReasoningTrace::new();
        tracing::info!(email_id = %task.email_id, user_id = %task.user_id, "agent run started");
        let outcome = session.run(task, &mut trace).await;
        let (prompt_tokens, completion_tokens, total_tokens) = planner.token_usage();
        tracing::info!(
            email_id = %task.email_id,
            steps = trace.current_step(),
            prompt_tokens,
            completion_tokens,
            total_tokens,
            "agent run finished"
        );
        AgentResult::from_outcome(outcome, trace)
    }
}
