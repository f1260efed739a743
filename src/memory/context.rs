//! 检索上下文组装：在 token 预算内收集相关块
//!
//! 两阶段收集：
//! 1. 指定了首选文档时，先在该文档内检索，累计到预算的 `early_stop_ratio` 即停止；
//! 2. 剩余预算大于 `min_remaining_tokens` 时，再跨文档补齐，遇到第一个放不下的块立即停止。
//!
//! 最终按分数倒序输出；检索失败时返回空序列。

use std::sync::Arc;

use crate::config::RetrievalSection;
use crate::memory::rag::{RetrievedChunk, SearchIndex};
use crate::memory::token_budget::{TokenBudget, TokenEstimator};

pub struct ContextAssembler {
    index: Arc<dyn SearchIndex>,
    n_results: usize,
    min_remaining_tokens: usize,
    early_stop_ratio: f64,
}

impl ContextAssembler {
    pub fn new(index: Arc<dyn SearchIndex>, cfg: &RetrievalSection) -> Self {
        Self {
            index,
            n_results: cfg.n_results,
            min_remaining_tokens: cfg.min_remaining_tokens,
            early_stop_ratio: cfg.early_stop_ratio,
        }
    }

    pub fn assemble(
        &self,
        query: &str,
        token_budget: usize,
        preferred_doc_id: Option<&str>,
    ) -> Vec<RetrievedChunk> {
        match self.gather(query, token_budget, preferred_doc_id) {
            Ok(mut window) => {
                window.sort_by(|a, b| b.score.total_cmp(&a.score));
                window
            }
            Err(e) => {
                tracing::warn!(error = %e, "context retrieval failed, returning empty window");
                Vec::new()
            }
        }
    }

    fn gather(
        &self,
        query: &str,
        token_budget: usize,
        preferred_doc_id: Option<&str>,
    ) -> Result<Vec<RetrievedChunk>, String> {
        let mut budget = TokenBudget::new(token_budget);
        let mut window = Vec::new();

        if let Some(doc_id) = preferred_doc_id {
            for chunk in self.index.search(query, self.n_results, Some(doc_id))? {
                if budget.try_consume(TokenEstimator::estimate(&chunk.content)) {
                    window.push(chunk);
                }
            }
            if budget.reached(self.early_stop_ratio) {
                tracing::debug!(doc_id = %doc_id, used = budget.used(), "preferred document filled the window");
                return Ok(window);
            }
        }

        if budget.remaining() > self.min_remaining_tokens as f64 {
            for chunk in self.index.search(query, self.n_results, None)? {
                if preferred_doc_id == Some(chunk.metadata.doc_id.as_str()) {
                    continue;
                }
                if !budget.try_consume(TokenEstimator::estimate(&chunk.content)) {
                    break;
                }
                window.push(chunk);
            }
        }

        tracing::debug!(chunks = window.len(), used = budget.used(), "context assembled");
        Ok(window)
    }
}
