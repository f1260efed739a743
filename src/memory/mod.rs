//! 检索层：消息类型、token 估算、邮件向量索引与上下文窗口组装

pub mod context;
pub mod conversation;
pub mod rag;
pub mod token_budget;

pub use context::ContextAssembler;
pub use conversation::{Message, Role};
pub use rag::{
    index_user_emails, ChunkMetadata, Chunker, ChunkingConfig, RetrievedChunk, SearchIndex,
    VectorIndex,
};
pub use token_budget::{TokenBudget, TokenEstimator};
