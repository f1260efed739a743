//! 邮件检索：文档分块、向量索引与按文档过滤的相似度检索
//!
//! `SearchIndex` 是检索能力的抽象；`VectorIndex` 是进程内的余弦相似度实现，
//! 供本地运行与测试使用，不是向量数据库。

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::llm::EmbeddingProvider;
use crate::mail::{Email, MailStore};

/// 检索结果附带的文档元数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub doc_id: String,
    pub thread_id: String,
    pub subject: String,
    pub sender: String,
    pub date: String,
}

impl ChunkMetadata {
    pub fn from_email(email: &Email) -> Self {
        Self {
            doc_id: email.id.clone(),
            thread_id: email.thread_id.clone(),
            subject: email.subject.clone(),
            sender: email.sender.clone(),
            date: email.date.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }
}

/// 单次查询产生的检索块，分数越高越相关
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub content: String,
    pub score: f32,
    pub metadata: ChunkMetadata,
}

/// 检索能力：`filter` 为 Some(doc_id) 时只在该文档内检索
pub trait SearchIndex: Send + Sync {
    fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&str>,
    ) -> Result<Vec<RetrievedChunk>, String>;
}

/// 文档块
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    /// 在原文档中的字节偏移
    pub offset: usize,
}

/// 分块策略
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// 目标块大小（字符数）
    pub chunk_size: usize,
    /// 块之间的重叠（字符数）
    pub chunk_overlap: usize,
    /// 分隔符优先级（从高到低）
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            separators: ["\n\n", "\n", ". ", "! ", "? ", " "]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// 文档分块器（UTF-8 安全，优先在分隔符处断开）
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn chunk(&self, doc_id: &str, text: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let size = self.config.chunk_size.max(1);
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < total {
            let target_end = (start + size).min(total);
            let mut end = target_end;

            if target_end < total {
                let window: String = chars[start..target_end].iter().collect();
                if let Some(cut) = self
                    .config
                    .separators
                    .iter()
                    .find_map(|sep| window.rfind(sep.as_str()).map(|pos| (pos, sep)))
                    .map(|(pos, sep)| window[..pos].chars().count() + sep.chars().count())
                    .filter(|n| *n > 0)
                {
                    end = start + cut;
                }
            }

            let piece: String = chars[start..end].iter().collect();
            let trimmed = piece.trim();
            if !trimmed.is_empty() {
                let offset = chars[..start].iter().map(|c| c.len_utf8()).sum();
                chunks.push(Chunk {
                    id: format!("{}_{}", doc_id, chunks.len()),
                    text: trimmed.to_string(),
                    offset,
                });
            }

            if end >= total {
                break;
            }
            let overlap = self.config.chunk_overlap.min(end - start);
            let next = end - overlap;
            start = if next > start { next } else { end };
        }

        chunks
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(ChunkingConfig::default())
    }
}

struct IndexEntry {
    chunk: Chunk,
    metadata: ChunkMetadata,
    embedding: Vec<f32>,
}

/// 进程内向量索引
pub struct VectorIndex {
    entries: RwLock<Vec<IndexEntry>>,
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: Chunker,
}

impl VectorIndex {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            embedder,
            chunker: Chunker::default(),
        }
    }

    pub fn with_chunking_config(mut self, config: ChunkingConfig) -> Self {
        self.chunker = Chunker::new(config);
        self
    }

    /// 索引文档：先删除该文档旧的块，返回成功写入的块数
    pub fn index_document(
        &self,
        doc_id: &str,
        text: &str,
        metadata: ChunkMetadata,
    ) -> Result<usize, String> {
        let mut fresh = Vec::new();
        for chunk in self.chunker.chunk(doc_id, text) {
            match self.embedder.embed_sync(&chunk.text) {
                Ok(embedding) if !embedding.is_empty() => fresh.push(IndexEntry {
                    chunk,
                    metadata: metadata.clone(),
                    embedding,
                }),
                Ok(_) => tracing::debug!(chunk = %chunk.id, "empty embedding, chunk skipped"),
                Err(e) => tracing::warn!(chunk = %chunk.id, error = %e, "embedding failed"),
            }
        }
        let added = fresh.len();

        let mut entries = self.entries.write().map_err(|e| e.to_string())?;
        entries.retain(|entry| entry.metadata.doc_id != doc_id);
        entries.extend(fresh);
        Ok(added)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SearchIndex for VectorIndex {
    fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&str>,
    ) -> Result<Vec<RetrievedChunk>, String> {
        let query_embedding = self.embedder.embed_sync(query)?;
        if query_embedding.is_empty() {
            return Ok(Vec::new());
        }

        let entries = self.entries.read().map_err(|e| e.to_string())?;
        let mut scored: Vec<(f32, &IndexEntry)> = entries
            .iter()
            .filter(|entry| filter.map_or(true, |doc| entry.metadata.doc_id == doc))
            .map(|entry| (cosine_similarity(&query_embedding, &entry.embedding), entry))
            .filter(|(score, _)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, entry)| RetrievedChunk {
                content: entry.chunk.text.clone(),
                score,
                metadata: entry.metadata.clone(),
            })
            .collect())
    }
}

/// 余弦相似度
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn email_document(email: &Email) -> String {
    format!(
        "Subject: {}\nFrom: {}\n\n{}",
        email.subject,
        email.sender,
        email.text()
    )
}

/// 索引用户的全部邮件，返回写入的块数
pub async fn index_user_emails(
    store: &dyn MailStore,
    index: &VectorIndex,
    user_id: &str,
) -> Result<usize, String> {
    let emails = store
        .recent_emails(user_id, usize::MAX)
        .await
        .map_err(|e| e.to_string())?;
    let mut total = 0;
    for email in &emails {
        total += index.index_document(
            &email.id,
            &email_document(email),
            ChunkMetadata::from_email(email),
        )?;
    }
    tracing::info!(user_id = %user_id, emails = emails.len(), chunks = total, "mailbox indexed");
    Ok(total)
}
