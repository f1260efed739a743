//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `MAILBEE__*` 覆盖（双下划线表示嵌套，如 `MAILBEE__AGENT__MAX_ITERATIONS=3`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub agent: AgentSection,
    pub retrieval: RetrievalSection,
    pub scheduling: SchedulingSection,
    pub style: StyleSection,
}

/// [app] 段：应用名、SQLite 路径（未设置时使用内存存储）
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    pub database_path: Option<PathBuf>,
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：gemini / openai / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// [agent] 段：ReAct 循环上限与超时
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSection {
    /// 单次运行内工具调度的硬上限
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// 单次决策（LLM 调用）的墙钟上限（秒）
    #[serde(default = "default_decision_timeout_secs")]
    pub decision_timeout_secs: u64,
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            decision_timeout_secs: default_decision_timeout_secs(),
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

fn default_max_iterations() -> usize {
    5
}

fn default_decision_timeout_secs() -> u64 {
    60
}

fn default_tool_timeout_secs() -> u64 {
    30
}

/// [retrieval] 段：上下文窗口预算与分块参数
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalSection {
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,
    /// 起草回复时检索上下文的预算
    #[serde(default = "default_draft_token_budget")]
    pub draft_token_budget: usize,
    /// 每阶段向索引请求的候选数
    #[serde(default = "default_n_results")]
    pub n_results: usize,
    /// 剩余预算低于此值时跳过跨文档阶段
    #[serde(default = "default_min_remaining_tokens")]
    pub min_remaining_tokens: usize,
    /// 首选文档阶段用掉此比例后直接返回
    #[serde(default = "default_early_stop_ratio")]
    pub early_stop_ratio: f64,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            token_budget: default_token_budget(),
            draft_token_budget: default_draft_token_budget(),
            n_results: default_n_results(),
            min_remaining_tokens: default_min_remaining_tokens(),
            early_stop_ratio: default_early_stop_ratio(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            embedding_model: default_embedding_model(),
        }
    }
}

fn default_token_budget() -> usize {
    120_000
}

fn default_draft_token_budget() -> usize {
    20_000
}

fn default_n_results() -> usize {
    20
}

fn default_min_remaining_tokens() -> usize {
    10_000
}

fn default_early_stop_ratio() -> f64 {
    0.8
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_embedding_model() -> String {
    "text-embedding-004".to_string()
}

/// 日历平台：显式配置，不做猜测
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    GoogleCalendar,
    CalCom,
    #[default]
    Internal,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::GoogleCalendar => "google_calendar",
            Platform::CalCom => "cal_com",
            Platform::Internal => "internal",
        }
    }
}

/// [scheduling] 段
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulingSection {
    #[serde(default)]
    pub platform: Platform,
    #[serde(default = "default_calendar_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub google: GoogleSection,
    #[serde(default)]
    pub cal_com: CalComSection,
}

impl Default for SchedulingSection {
    fn default() -> Self {
        Self {
            platform: Platform::default(),
            request_timeout_secs: default_calendar_timeout_secs(),
            google: GoogleSection::default(),
            cal_com: CalComSection::default(),
        }
    }
}

fn default_calendar_timeout_secs() -> u64 {
    15
}

/// [scheduling.google] 段：OAuth 由外部管理，这里只接收现成的 access token
#[derive(Debug, Clone, Deserialize, Default)]
pub struct GoogleSection {
    pub access_token: Option<String>,
    pub calendar_id: Option<String>,
}

/// [scheduling.cal_com] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CalComSection {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub event_type_id: Option<u64>,
}

/// [style] 段：写作风格画像取样
#[derive(Debug, Clone, Deserialize)]
pub struct StyleSection {
    #[serde(default = "default_sample_limit")]
    pub sample_limit: usize,
    #[serde(default = "default_combine_limit")]
    pub combine_limit: usize,
}

impl Default for StyleSection {
    fn default() -> Self {
        Self {
            sample_limit: default_sample_limit(),
            combine_limit: default_combine_limit(),
        }
    }
}

fn default_sample_limit() -> usize {
    20
}

fn default_combine_limit() -> usize {
    10
}

/// 从 config 目录加载配置，环境变量 MAILBEE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 MAILBEE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("MAILBEE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
