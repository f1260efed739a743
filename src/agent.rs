//! Agent 运行时装配
//!
//! AgentServices 持有所有跨运行共享的协作方（推理引擎、持久化、时钟、风格画像、调度、检索），
//! default_registry 为单次运行构建绑定了任务上下文的工具集，
//! create_services_from_config 从配置完成整套装配（CLI 等外部入口使用）。

use std::sync::Arc;

use anyhow::Context;

use crate::config::{AppConfig, RetrievalSection};
use crate::core::{Clock, SystemClock};
use crate::llm::{create_embedder_from_config, create_llm_from_config, LlmClient};
use crate::mail::{InMemoryMailStore, MailStore, SqliteMailStore, StyleProfiler, TaskContext};
use crate::memory::{index_user_emails, ChunkingConfig, ContextAssembler, SearchIndex, VectorIndex};
use crate::scheduling::{create_calendar_from_config, MeetingExtractor, SchedulingService};
use crate::tools::{DraftTool, FilterTool, ScheduleTool, SnoozeTool, SummarizeTool, ToolRegistry};

/// 跨运行共享的协作方，可多任务共享
#[derive(Clone)]
pub struct AgentServices {
    pub llm: Arc<dyn LlmClient>,
    pub store: Arc<dyn MailStore>,
    pub clock: Arc<dyn Clock>,
    pub style: Arc<StyleProfiler>,
    pub scheduler: Arc<SchedulingService>,
    /// 未配置检索索引时为 None，起草回复不带检索上下文
    pub assembler: Option<Arc<ContextAssembler>>,
    pub draft_token_budget: usize,
    retrieval: RetrievalSection,
}

impl AgentServices {
    pub fn new(
        cfg: &AppConfig,
        llm: Arc<dyn LlmClient>,
        store: Arc<dyn MailStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let style = Arc::new(StyleProfiler::new(llm.clone(), store.clone(), &cfg.style));
        let scheduler = Arc::new(SchedulingService::new(
            MeetingExtractor::new(llm.clone()),
            create_calendar_from_config(&cfg.scheduling),
            store.clone(),
            clock.clone(),
        ));
        Self {
            llm,
            store,
            clock,
            style,
            scheduler,
            assembler: None,
            draft_token_budget: cfg.retrieval.draft_token_budget,
            retrieval: cfg.retrieval.clone(),
        }
    }

    /// 接入检索索引
    pub fn with_search_index(mut self, index: Arc<dyn SearchIndex>) -> Self {
        self.assembler = Some(Arc::new(ContextAssembler::new(index, &self.retrieval)));
        self
    }
}

/// 单次运行的默认工具集：五个工具都绑定同一个任务上下文
pub fn default_registry(services: &AgentServices, ctx: &TaskContext) -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(SummarizeTool::new(services.llm.clone()));
    tools.register(FilterTool::new(services.llm.clone()));

    let draft = DraftTool::new(services.llm.clone(), services.style.clone(), ctx.clone());
    match &services.assembler {
        Some(assembler) => {
            tools.register(draft.with_context_assembler(assembler.clone(), services.draft_token_budget))
        }
        None => tools.register(draft),
    }

    tools.register(ScheduleTool::new(services.scheduler.clone(), ctx.clone()));
    tools.register(SnoozeTool::new(
        services.store.clone(),
        services.clock.clone(),
        ctx.clone(),
    ));
    tools
}

/// 从配置装配全部服务：SQLite（或内存）存储、推理引擎、日历平台；
/// 有可用的嵌入 Key 时为 user_id 建立邮箱索引
pub async fn create_services_from_config(
    cfg: &AppConfig,
    user_id: Option<&str>,
) -> anyhow::Result<AgentServices> {
    let store: Arc<dyn MailStore> = match &cfg.app.database_path {
        Some(path) => Arc::new(
            SqliteMailStore::open(path)
                .with_context(|| format!("Failed to open database {}", path.display()))?,
        ),
        None => {
            tracing::info!("No database_path configured, using in-memory store");
            Arc::new(InMemoryMailStore::new())
        }
    };
    let llm = create_llm_from_config(cfg);
    let services = AgentServices::new(cfg, llm, store.clone(), Arc::new(SystemClock));

    let embedder = create_embedder_from_config(
        &cfg.llm.provider,
        cfg.llm.base_url.as_deref(),
        &cfg.retrieval.embedding_model,
    );
    let (Some(embedder), Some(user_id)) = (embedder, user_id) else {
        tracing::info!("Retrieval disabled (no embedding provider or user)");
        return Ok(services);
    };

    let index = Arc::new(VectorIndex::new(embedder).with_chunking_config(ChunkingConfig {
        chunk_size: cfg.retrieval.chunk_size,
        chunk_overlap: cfg.retrieval.chunk_overlap,
        ..ChunkingConfig::default()
    }));
    match index_user_emails(store.as_ref(), &index, user_id).await {
        Ok(_) => Ok(services.with_search_index(index)),
        Err(e) => {
            tracing::warn!(error = %e, "Mailbox indexing failed, continuing without retrieval");
            Ok(services)
        }
    }
}
