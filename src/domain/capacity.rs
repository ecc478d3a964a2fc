// ==========================================
// 养殖场区域容量台账 - 容量领域模型
// ==========================================
// 红线: 容量约束优先于入栏请求
// 用途: 容量查询结果、准入判断、容量变更日志
// ==========================================

use crate::domain::area::Area;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// CapacityInfo - 区域容量概况
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityInfo {
    pub max_capacity: i64,
    pub current_capacity: i64, // 剩余
    pub current_count: i64,    // 存栏
}

impl From<&Area> for CapacityInfo {
    fn from(area: &Area) -> Self {
        Self {
            max_capacity: area.max_capacity,
            current_capacity: area.current_capacity,
            current_count: area.occupancy(),
        }
    }
}

// ==========================================
// CapacityCheck - 入栏前容量检查结果
// ==========================================
// 说明: 超容是正常业务结果，通过 is_valid 表达，不作为错误抛出
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityCheck {
    pub is_valid: bool,
    pub current_capacity: i64,   // 区域当前存储的剩余容量
    pub max_capacity: i64,
    pub remaining_capacity: i64, // 参与比较的剩余容量（编辑时已加回原记录数量）
}

// ==========================================
// AdmissionDecision - 计算器准入判断
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionDecision {
    pub ok: bool,
    pub remaining: i64,
    pub max_capacity: i64,
}

// ==========================================
// Trait: CapacityConstraint
// ==========================================
// 用途: 区域级约束检查接口（基于已维护的剩余容量计数）
pub trait CapacityConstraint {
    /// 检查是否可容纳指定数量
    fn can_admit(&self, quantity: i64) -> bool;

    /// 剩余容量
    fn remaining_capacity(&self) -> i64;
}

impl CapacityConstraint for Area {
    fn can_admit(&self, quantity: i64) -> bool {
        quantity <= self.current_capacity
    }

    fn remaining_capacity(&self) -> i64 {
        self.current_capacity.max(0)
    }
}

// ==========================================
// 容量变更来源
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CapacityChangeSource {
    ImportCreated,
    ImportQuantityChanged,
    ImportDeleted,
    ImportCompleted,
    ImportReopened,
    ImportMoved,
    ManualDelta,
    Recompute,
    Resize,
}

impl CapacityChangeSource {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            CapacityChangeSource::ImportCreated => "IMPORT_CREATED",
            CapacityChangeSource::ImportQuantityChanged => "IMPORT_QUANTITY_CHANGED",
            CapacityChangeSource::ImportDeleted => "IMPORT_DELETED",
            CapacityChangeSource::ImportCompleted => "IMPORT_COMPLETED",
            CapacityChangeSource::ImportReopened => "IMPORT_REOPENED",
            CapacityChangeSource::ImportMoved => "IMPORT_MOVED",
            CapacityChangeSource::ManualDelta => "MANUAL_DELTA",
            CapacityChangeSource::Recompute => "RECOMPUTE",
            CapacityChangeSource::Resize => "RESIZE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let all = [
            CapacityChangeSource::ImportCreated,
            CapacityChangeSource::ImportQuantityChanged,
            CapacityChangeSource::ImportDeleted,
            CapacityChangeSource::ImportCompleted,
            CapacityChangeSource::ImportReopened,
            CapacityChangeSource::ImportMoved,
            CapacityChangeSource::ManualDelta,
            CapacityChangeSource::Recompute,
            CapacityChangeSource::Resize,
        ];
        all.into_iter().find(|src| src.to_db_str() == s)
    }
}

impl fmt::Display for CapacityChangeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// CapacityLogEntry - 容量变更日志
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityLogEntry {
    pub log_id: String,
    pub area_id: String,
    pub area_name: String,
    pub source: CapacityChangeSource,
    pub quantity_change: Option<i64>, // 增量路径的数量变化（正数=入栏）
    pub capacity_before: i64,
    pub capacity_after: i64,
    pub occupancy: Option<i64>, // 重算路径的台账占用
    pub created_at: NaiveDateTime,
}

impl CapacityLogEntry {
    /// 是否发生了计数修正
    pub fn is_correction(&self) -> bool {
        self.capacity_before != self.capacity_after
    }
}

// ==========================================
// RecomputeOutcome - 单区域重算结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputeOutcome {
    pub area_id: String,
    pub area_name: String,
    pub previous: i64,
    pub recomputed: i64,
    pub occupancy: i64,
    /// 台账存栏数超过最大容量
    pub integrity_violation: bool,
}

impl RecomputeOutcome {
    /// 重算是否修正了计数漂移
    pub fn corrected(&self) -> bool {
        self.previous != self.recomputed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::AreaStatus;
    use chrono::NaiveDate;

    fn area(max: i64, current: i64) -> Area {
        let ts = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Area {
            area_id: "A".to_string(),
            name: "Khu A".to_string(),
            max_capacity: max,
            current_capacity: current,
            status: AreaStatus::Active,
            staff: vec![],
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn test_capacity_info_from_area() {
        let info = CapacityInfo::from(&area(1000, 200));
        assert_eq!(info.max_capacity, 1000);
        assert_eq!(info.current_capacity, 200);
        assert_eq!(info.current_count, 800);
    }

    #[test]
    fn test_constraint_uses_stored_counter() {
        let a = area(1000, 200);
        assert!(a.can_admit(200));
        assert!(!a.can_admit(201));
        assert_eq!(a.remaining_capacity(), 200);
    }

    #[test]
    fn test_change_source_parse() {
        assert_eq!(
            CapacityChangeSource::parse("RECOMPUTE"),
            Some(CapacityChangeSource::Recompute)
        );
        assert_eq!(CapacityChangeSource::parse("nope"), None);
    }

    #[test]
    fn test_capacity_check_serializes_camel_case() {
        let check = CapacityCheck {
            is_valid: true,
            current_capacity: 200,
            max_capacity: 1000,
            remaining_capacity: 200,
        };
        let json = serde_json::to_value(check).unwrap();
        assert_eq!(json["isValid"], true);
        assert_eq!(json["remainingCapacity"], 200);
    }
}
