// ==========================================
// 养殖场区域容量台账 - 领域类型定义
// ==========================================
// 职责: 区域状态、入栏记录状态等枚举
// 序列化格式与数据库存储一致
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 区域状态 (Area Status)
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AreaStatus {
    Active,      // 使用中
    Empty,       // 空栏
    Maintenance, // 维护中
    Incident,    // 异常事件
}

impl AreaStatus {
    /// 全部状态（用于看板补零统计）
    pub const ALL: [AreaStatus; 4] = [
        AreaStatus::Active,
        AreaStatus::Empty,
        AreaStatus::Maintenance,
        AreaStatus::Incident,
    ];

    /// 从数据库字符串解析
    ///
    /// 未知值返回 None，由调用方决定如何处理
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ACTIVE" => Some(AreaStatus::Active),
            "EMPTY" => Some(AreaStatus::Empty),
            "MAINTENANCE" => Some(AreaStatus::Maintenance),
            "INCIDENT" => Some(AreaStatus::Incident),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            AreaStatus::Active => "ACTIVE",
            AreaStatus::Empty => "EMPTY",
            AreaStatus::Maintenance => "MAINTENANCE",
            AreaStatus::Incident => "INCIDENT",
        }
    }
}

impl fmt::Display for AreaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl Default for AreaStatus {
    fn default() -> Self {
        AreaStatus::Empty
    }
}

// ==========================================
// 入栏记录状态 (Import Status)
// ==========================================
// 只有 in-progress 的记录计入区域占用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportStatus {
    InProgress, // 在栏
    Completed,  // 已出栏/已结束
}

impl ImportStatus {
    /// 从数据库字符串解析
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "in-progress" => Some(ImportStatus::InProgress),
            "completed" => Some(ImportStatus::Completed),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ImportStatus::InProgress => "in-progress",
            ImportStatus::Completed => "completed",
        }
    }

    /// 是否占用区域容量
    pub fn occupies_area(&self) -> bool {
        matches!(self, ImportStatus::InProgress)
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl Default for ImportStatus {
    fn default() -> Self {
        ImportStatus::InProgress
    }
}

// ==========================================
// 排序方向
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_status_roundtrip_db_str() {
        for status in AreaStatus::ALL {
            assert_eq!(AreaStatus::parse(status.to_db_str()), Some(status));
        }
        assert_eq!(AreaStatus::parse(" maintenance "), Some(AreaStatus::Maintenance));
        assert_eq!(AreaStatus::parse("CLOSED"), None);
    }

    #[test]
    fn test_import_status_serde_is_kebab_case() {
        let json = serde_json::to_string(&ImportStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");

        let parsed: ImportStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(parsed, ImportStatus::Completed);
    }

    #[test]
    fn test_only_in_progress_occupies_area() {
        assert!(ImportStatus::InProgress.occupies_area());
        assert!(!ImportStatus::Completed.occupies_area());
    }

    #[test]
    fn test_area_status_serde_screaming_case() {
        let json = serde_json::to_string(&AreaStatus::Incident).unwrap();
        assert_eq!(json, "\"INCIDENT\"");
    }
}
