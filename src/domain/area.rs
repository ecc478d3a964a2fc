// ==========================================
// 养殖场区域容量台账 - 区域领域模型
// ==========================================
// 红线: current_capacity 表示"剩余可用容量"，不是存栏数
// 红线: 0 <= current_capacity <= max_capacity
// ==========================================

use crate::domain::types::{AreaStatus, SortOrder};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 区域名称最大长度（字符数）
pub const AREA_NAME_MAX_LEN: usize = 50;

// ==========================================
// Area - 饲养区域
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    // ===== 主键 =====
    pub area_id: String,
    pub name: String,

    // ===== 容量 =====
    pub max_capacity: i64,     // 最大容量 (只)
    pub current_capacity: i64, // 剩余可用容量 (只)

    // ===== 运营 =====
    pub status: AreaStatus,
    pub staff: Vec<String>, // 负责人员ID集合（仅用于看板统计）

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Area {
    /// 当前存栏数 = 最大容量 - 剩余容量
    pub fn occupancy(&self) -> i64 {
        self.max_capacity - self.current_capacity
    }

    /// 容量计数是否在合法区间内
    pub fn is_within_bounds(&self) -> bool {
        self.current_capacity >= 0 && self.current_capacity <= self.max_capacity
    }

    /// 名称是否与给定名称相同（忽略大小写与首尾空白）
    pub fn name_matches(&self, name: &str) -> bool {
        normalize_area_name(&self.name) == normalize_area_name(name)
    }
}

/// 名称规范化：去首尾空白并转小写，仅用于比较
pub fn normalize_area_name(name: &str) -> String {
    name.trim().to_lowercase()
}

// ==========================================
// NewArea - 新建区域请求
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewArea {
    pub name: String,
    pub max_capacity: i64,
    #[serde(default)]
    pub status: Option<AreaStatus>,
    #[serde(default)]
    pub staff: Vec<String>,
}

impl NewArea {
    pub fn new(name: impl Into<String>, max_capacity: i64) -> Self {
        Self {
            name: name.into(),
            max_capacity,
            status: None,
            staff: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: AreaStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_staff(mut self, staff: Vec<String>) -> Self {
        self.staff = staff;
        self
    }
}

// ==========================================
// AreaPatch - 区域编辑请求
// ==========================================
// 说明: 不包含 current_capacity，剩余容量只能由 CapacityApi 写入
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AreaPatch {
    pub name: Option<String>,
    pub max_capacity: Option<i64>,
    pub status: Option<AreaStatus>,
    pub staff: Option<Vec<String>>,
}

impl AreaPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.max_capacity.is_none()
            && self.status.is_none()
            && self.staff.is_none()
    }
}

// ==========================================
// 查询条件
// ==========================================

/// 区域列表过滤条件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AreaFilter {
    /// 名称模糊搜索（忽略大小写）
    pub search: Option<String>,
    pub status: Option<AreaStatus>,
}

/// 区域排序字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AreaSortField {
    #[default]
    Name,
    MaxCapacity,
    CurrentCapacity,
    CreatedAt,
}

impl AreaSortField {
    pub fn column(&self) -> &'static str {
        match self {
            AreaSortField::Name => "name",
            AreaSortField::MaxCapacity => "max_capacity",
            AreaSortField::CurrentCapacity => "current_capacity",
            AreaSortField::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AreaSort {
    pub field: AreaSortField,
    pub order: SortOrder,
}

/// 分页参数（page 从 1 开始）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Pagination {
    pub const MAX_PAGE_SIZE: u32 = 500;

    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    pub fn limit(&self) -> i64 {
        self.page_size.clamp(1, Self::MAX_PAGE_SIZE) as i64
    }

    pub fn offset(&self) -> i64 {
        (self.page.max(1) as i64 - 1) * self.limit()
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
        }
    }
}

/// 分页结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_area(max: i64, current: i64) -> Area {
        let ts = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        Area {
            area_id: "A1".to_string(),
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
    fn test_occupancy_is_max_minus_remaining() {
        let area = sample_area(1000, 200);
        assert_eq!(area.occupancy(), 800);
        assert!(area.is_within_bounds());
        assert!(!sample_area(100, 101).is_within_bounds());
    }

    #[test]
    fn test_name_matches_ignores_case_and_whitespace() {
        let area = sample_area(10, 10);
        assert!(area.name_matches("  khu a "));
        assert!(!area.name_matches("Khu B"));
    }

    #[test]
    fn test_pagination_bounds() {
        let p = Pagination::new(0, 0);
        assert_eq!(p.limit(), 1);
        assert_eq!(p.offset(), 0);

        let p = Pagination::new(3, 20);
        assert_eq!(p.offset(), 40);

        let p = Pagination::new(1, 10_000);
        assert_eq!(p.limit(), Pagination::MAX_PAGE_SIZE as i64);
    }
}
