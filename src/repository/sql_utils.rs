// ==========================================
// 养殖场区域容量台账 - SQL 工具模块
// ==========================================
// 职责: 时间格式、行映射转换错误、动态 WHERE 构建
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::{Type, Value};

/// 时间戳存储格式
pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// 日期存储格式
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 当前本地时间（秒精度，与存储格式一致）
pub fn now_ts() -> NaiveDateTime {
    let now = chrono::Local::now().naive_local();
    // 去掉亚秒部分，保证写入与读回一致
    NaiveDateTime::parse_from_str(&now.format(TS_FORMAT).to_string(), TS_FORMAT).unwrap_or(now)
}

pub fn fmt_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

pub fn fmt_date(d: &NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

/// 构造行映射阶段的类型转换错误
pub fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

pub fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TS_FORMAT)
        .map_err(|e| conversion_error(idx, format!("无效时间戳 '{}': {}", raw, e)))
}

pub fn parse_date(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| conversion_error(idx, format!("无效日期 '{}': {}", raw, e)))
}

// ==========================================
// WhereBuilder - 动态过滤条件
// ==========================================

/// 按可选条件拼接 WHERE 子句，参数统一走占位符绑定
#[derive(Debug, Default)]
pub struct WhereBuilder {
    clauses: Vec<String>,
    values: Vec<Value>,
}

impl WhereBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加条件（clause 中每个 ? 对应一个 value）
    pub fn push(&mut self, clause: &str, values: Vec<Value>) -> &mut Self {
        self.clauses.push(clause.to_string());
        self.values.extend(values);
        self
    }

    /// 生成 " WHERE a AND b"，无条件时返回空串
    pub fn sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// 追加 LIMIT/OFFSET 参数后的完整参数列表
    pub fn values_with_page(&self, limit: i64, offset: i64) -> Vec<Value> {
        let mut values = self.values.clone();
        values.push(Value::Integer(limit));
        values.push(Value::Integer(offset));
        values
    }
}

/// LIKE 模式转义（% _ \）
pub fn like_pattern(raw: &str) -> String {
    let escaped = raw
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_builder_empty() {
        let wb = WhereBuilder::new();
        assert_eq!(wb.sql(), "");
        assert!(wb.values().is_empty());
    }

    #[test]
    fn test_where_builder_joins_with_and() {
        let mut wb = WhereBuilder::new();
        wb.push("status = ?", vec![Value::Text("ACTIVE".into())])
            .push("name LIKE ? ESCAPE '\\'", vec![Value::Text("%A%".into())]);
        assert_eq!(wb.sql(), " WHERE status = ? AND name LIKE ? ESCAPE '\\'");
        assert_eq!(wb.values_with_page(20, 40).len(), 4);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" 50%_a "), "%50\\%\\_a%");
    }

    #[test]
    fn test_ts_roundtrip() {
        let ts = now_ts();
        assert_eq!(parse_ts(0, &fmt_ts(&ts)).unwrap(), ts);
        assert!(parse_date(0, "2026-13-01").is_err());
    }
}
