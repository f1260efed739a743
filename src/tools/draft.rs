//! draft_email：`recipient|subject|context|original_body`，按用户写作风格起草回复
//!
//! original_body 可以包含 `|`。配置了检索索引时，会以 subject + context 为查询，
//! 优先当前邮件所在文档，组装相关上下文。

use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::mail::{generate_reply, ReplyRequest, StyleProfiler, TaskContext};
use crate::memory::ContextAssembler;
use crate::tools::{Tool, ToolKind};

pub struct DraftTool {
    llm: Arc<dyn LlmClient>,
    style: Arc<StyleProfiler>,
    assembler: Option<Arc<ContextAssembler>>,
    token_budget: usize,
    ctx: TaskContext,
}

impl DraftTool {
    pub fn new(llm: Arc<dyn LlmClient>, style: Arc<StyleProfiler>, ctx: TaskContext) -> Self {
        Self {
            llm,
            style,
            assembler: None,
            token_budget: 0,
            ctx,
        }
    }

    pub fn with_context_assembler(mut self, assembler: Arc<ContextAssembler>, token_budget: usize) -> Self {
        self.assembler = Some(assembler);
        self.token_budget = token_budget;
        self
    }
}

struct DraftInput<'a> {
    recipient: &'a str,
    subject: &'a str,
    context: &'a str,
    reply_to: &'a str,
}

fn parse_input(input: &str) -> Result<DraftInput<'_>, String> {
    let mut parts = input.splitn(4, '|').map(str::trim);
    let recipient = parts.next().unwrap_or_default();
    let subject = parts.next().unwrap_or_default();
    let context = parts.next().unwrap_or_default();
    let reply_to = parts.next().unwrap_or_default();
    if recipient.is_empty() || subject.is_empty() || context.is_empty() {
        return Err(
            "Invalid input format. Expected: recipient|subject|context|original_email_body \
            (recipient, subject and context are required)"
                .to_string(),
        );
    }
    Ok(DraftInput {
        recipient,
        subject,
        context,
        reply_to,
    })
}

#[async_trait]
impl Tool for DraftTool {
    fn kind(&self) -> ToolKind {
        ToolKind::DraftEmail
    }

    fn description(&self) -> &str {
        "Generate a reply draft in the user's writing style. Input: recipient|subject|context|original_email_body"
    }

    async fn execute(&self, input: &str) -> Result<String, String> {
        let draft = parse_input(input)?;
        let profile = self.style.build_profile(&self.ctx.user_id).await?;

        let related = match &self.assembler {
            Some(assembler) => {
                let query = format!("{} {}", draft.subject, draft.context);
                assembler.assemble(&query, self.token_budget, Some(&self.ctx.email_id))
            }
            None => Vec::new(),
        };
        tracing::debug!(related = related.len(), "drafting reply");

        let req = ReplyRequest {
            style_profile: &profile,
            recipient: draft.recipient,
            subject: draft.subject,
            context: draft.context,
            reply_to: draft.reply_to,
            related: &related,
        };
        generate_reply(self.llm.as_ref(), &req).await
    }
}
