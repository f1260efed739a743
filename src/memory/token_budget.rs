//! Token 预算：按词数估算（word_count * 1.33），不做真实分词

/// 每个词折算的 token 数
pub const TOKENS_PER_WORD: f64 = 1.33;

/// Token 估算器
pub struct TokenEstimator;

impl TokenEstimator {
    /// 估算文本的 token 数量
    pub fn estimate(text: &str) -> f64 {
        text.split_whitespace().count() as f64 * TOKENS_PER_WORD
    }
}

/// 累加式预算：只接受不超出上限的整块内容
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBudget {
    limit: f64,
    used: f64,
}

impl TokenBudget {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit as f64,
            used: 0.0,
        }
    }

    /// cost 放得下则计入并返回 true
    pub fn try_consume(&mut self, cost: f64) -> bool {
        if self.used + cost <= self.limit {
            self.used += cost;
            true
        } else {
            false
        }
    }

    pub fn used(&self) -> f64 {
        self.used
    }

    pub fn remaining(&self) -> f64 {
        (self.limit - self.used).max(0.0)
    }

    /// 已用比例是否达到 ratio
    pub fn reached(&self, ratio: f64) -> bool {
        self.used >= self.limit * ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_estimator_counts_words() {
        assert_eq!(TokenEstimator::estimate(""), 0.0);
        let est = TokenEstimator::estimate("one two  three\nfour");
        assert!((est - 4.0 * 1.33).abs() < 1e-9);
    }

    #[test]
    fn test_budget_rejects_overflowing_chunk() {
        let mut budget = TokenBudget::new(10);
        assert!(budget.try_consume(6.65));
        assert!(!budget.try_consume(5.32));
        assert!(budget.try_consume(2.66));
        assert!(budget.used() <= 10.0);
        assert!(budget.reached(0.8));
    }
}
