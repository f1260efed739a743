//! 工具注册表
//!
//! 工具集合是封闭枚举 `ToolKind`，按种类注册 `Arc<dyn Tool>`；
//! ToolExecutor 在调用时加超时并统一转 AgentError。

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 本领域可调度的工具种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    SummarizeEmail,
    FilterEmail,
    DraftEmail,
    ScheduleMeeting,
    SnoozeEmail,
}

impl ToolKind {
    pub const ALL: [ToolKind; 5] = [
        ToolKind::SummarizeEmail,
        ToolKind::FilterEmail,
        ToolKind::DraftEmail,
        ToolKind::ScheduleMeeting,
        ToolKind::SnoozeEmail,
    ];

    /// 决策输出中使用的工具名
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::SummarizeEmail => "summarize_email",
            ToolKind::FilterEmail => "filter_email",
            ToolKind::DraftEmail => "draft_email",
            ToolKind::ScheduleMeeting => "schedule_meeting",
            ToolKind::SnoozeEmail => "snooze_email",
        }
    }

    /// 宽松解析：忽略大小写、首尾空白、引号与反引号，`-`/空格视同 `_`
    pub fn parse(raw: &str) -> Option<Self> {
        let cleaned: String = raw
            .trim()
            .trim_matches(|c: char| c == '`' || c == '"' || c == '\'' || c.is_whitespace())
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c.to_ascii_lowercase() })
            .collect();
        Self::ALL.iter().copied().find(|k| k.name() == cleaned)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| s.trim().to_string())
    }
}

/// 工具 trait：种类、输入约定描述（供 LLM 理解）、异步执行（输入为原始字符串）
#[async_trait]
pub trait Tool: Send + Sync {
    fn kind(&self) -> ToolKind;

    /// 输入约定，如 "recipient|subject|context|original_body"
    fn description(&self) -> &str;

    async fn execute(&self, input: &str) -> Result<String, String>;
}

/// 工具注册表：每个 ToolKind 至多一个实现，按种类顺序遍历
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<ToolKind, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工具；同一种类重复注册时后者覆盖前者
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.kind(), tool);
    }

    pub fn get(&self, kind: ToolKind) -> Option<Arc<dyn Tool>> {
        self.tools.get(&kind).cloned()
    }

    pub fn contains(&self, kind: ToolKind) -> bool {
        self.tools.contains_key(&kind)
    }

    pub async fn execute(&self, kind: ToolKind, input: &str) -> Result<String, String> {
        let tool = self
            .tools
            .get(&kind)
            .ok_or_else(|| format!("Tool not registered: {kind}"))?;
        tool.execute(input).await
    }

    pub fn kinds(&self) -> Vec<ToolKind> {
        self.tools.keys().copied().collect()
    }

    /// 返回 (name, description) 列表，用于生成 prompt 中的工具段落
    pub fn tool_descriptions(&self) -> Vec<(&'static str, String)> {
        self.tools
            .iter()
            .map(|(kind, tool)| (kind.name(), tool.description().to_string()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
