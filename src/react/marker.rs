//! 请求补充信息标记：`<<REQUEST_INFO: 问题>>`
//!
//! 宽松扫描：忽略大小写与内部空白；缺少 `>>` 时取到行尾。

use std::sync::OnceLock;

use regex::Regex;

/// 问题为空时给出的默认提问
pub const DEFAULT_QUESTION: &str = "Could you provide more details?";

static CLOSED_RE: OnceLock<Option<Regex>> = OnceLock::new();
static OPEN_RE: OnceLock<Option<Regex>> = OnceLock::new();

fn closed_re() -> Option<&'static Regex> {
    CLOSED_RE
        .get_or_init(|| Regex::new(r"(?is)<<\s*REQUEST[_ ]INFO\s*:?\s*(.*?)\s*>>").ok())
        .as_ref()
}

fn open_re() -> Option<&'static Regex> {
    OPEN_RE
        .get_or_init(|| Regex::new(r"(?i)<<\s*REQUEST[_ ]INFO\s*:?\s*([^\n]*)").ok())
        .as_ref()
}

/// JSON 字符串里的问题可能带着收尾引号或转义
fn clean_question(raw: &str) -> String {
    let q = raw
        .trim()
        .trim_end_matches(['"', '}', ','])
        .trim()
        .replace("\\\"", "\"")
        .replace("\\n", " ");
    if q.is_empty() {
        DEFAULT_QUESTION.to_string()
    } else {
        q
    }
}

/// 提取第一个标记中的问题；没有标记返回 None
pub fn find_request_info(text: &str) -> Option<String> {
    if let Some(caps) = closed_re().and_then(|re| re.captures(text)) {
        return Some(clean_question(caps.get(1).map_or("", |m| m.as_str())));
    }
    open_re()
        .and_then(|re| re.captures(text))
        .map(|caps| clean_question(caps.get(1).map_or("", |m| m.as_str())))
}

/// 删除全部标记，返回剩余文本（已 trim）
pub fn strip_request_info(text: &str) -> String {
    let Some(closed) = closed_re() else {
        return text.trim().to_string();
    };
    let stripped = closed.replace_all(text, "");
    match open_re() {
        Some(open) => open.replace_all(&stripped, "").trim().to_string(),
        None => stripped.trim().to_string(),
    }
}
