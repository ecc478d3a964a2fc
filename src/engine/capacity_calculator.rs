// ==========================================
// 养殖场区域容量台账 - 容量计算引擎
// ==========================================
// 红线: 容量约束优先于入栏请求
// 红线: 剩余容量永远在 [0, max_capacity] 区间内
// ==========================================
// 职责:
// - 全量重算: 由台账汇总在栏数量（权威路径，用于自愈漂移）
// - 增量更新: 按数量变化调整剩余容量（热路径）
// - 准入判断: 基于已维护的剩余容量计数
// ==========================================

use crate::domain::area::Area;
use crate::domain::capacity::{AdmissionDecision, CapacityConstraint};
use crate::repository::error::RepositoryResult;
use tracing::instrument;

// ==========================================
// Trait: OccupancySource
// ==========================================
// 用途: 重算路径的数据来源（依赖倒置，引擎不拼 SQL）
// 实现者: ImportRecordRepository
pub trait OccupancySource: Send + Sync {
    /// 指定区域在栏记录的数量合计（无记录返回 0）
    fn in_progress_quantity(&self, area_name: &str) -> RepositoryResult<i64>;
}

// ==========================================
// CapacityCalculator - 容量计算引擎
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct CapacityCalculator {
    // 无状态引擎，不需要注入依赖
}

impl CapacityCalculator {
    pub fn new() -> Self {
        Self {}
    }

    /// 由台账计算区域存栏数
    ///
    /// # 返回
    /// - Ok(i64): >= 0 的存栏数
    #[instrument(skip(self, source))]
    pub fn compute_occupancy(
        &self,
        source: &dyn OccupancySource,
        area_name: &str,
    ) -> RepositoryResult<i64> {
        let occupancy = source.in_progress_quantity(area_name)?;
        Ok(occupancy.max(0))
    }

    /// 由存栏数推导剩余容量
    ///
    /// 存栏数超过最大容量属于数据完整性问题，剩余容量落到 0（不为负）
    pub fn derive_remaining_capacity(&self, area: &Area, occupancy: i64) -> i64 {
        (area.max_capacity - occupancy.max(0)).clamp(0, area.max_capacity)
    }

    /// 存栏数超出最大容量的部分（0 表示正常）
    pub fn overflow(&self, area: &Area, occupancy: i64) -> i64 {
        (occupancy - area.max_capacity).max(0)
    }

    /// 准入判断：请求数量与已维护的剩余容量比较
    pub fn validate_admission(&self, area: &Area, requested_quantity: i64) -> AdmissionDecision {
        AdmissionDecision {
            ok: area.can_admit(requested_quantity),
            remaining: area.remaining_capacity(),
            max_capacity: area.max_capacity,
        }
    }

    /// 增量更新后的剩余容量
    ///
    /// # 参数
    /// - `quantity_change`: 正数=入栏（剩余减少），负数=出栏（剩余增加）
    ///
    /// # 返回
    /// clamp(current - quantity_change, 0, max)
    pub fn apply_delta(&self, area: &Area, quantity_change: i64) -> i64 {
        area.current_capacity
            .saturating_sub(quantity_change)
            .clamp(0, area.max_capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::AreaStatus;
    use crate::repository::error::RepositoryError;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    struct MockLedger {
        sums: HashMap<String, i64>,
    }

    impl OccupancySource for MockLedger {
        fn in_progress_quantity(&self, area_name: &str) -> RepositoryResult<i64> {
            Ok(self.sums.get(area_name).copied().unwrap_or(0))
        }
    }

    struct FailingLedger;

    impl OccupancySource for FailingLedger {
        fn in_progress_quantity(&self, _area_name: &str) -> RepositoryResult<i64> {
            Err(RepositoryError::DatabaseQueryError("disk I/O error".to_string()))
        }
    }

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
    fn test_compute_occupancy_from_ledger() {
        let calc = CapacityCalculator::new();
        let ledger = MockLedger {
            sums: HashMap::from([("Khu A".to_string(), 500)]),
        };
        assert_eq!(calc.compute_occupancy(&ledger, "Khu A").unwrap(), 500);
        assert_eq!(calc.compute_occupancy(&ledger, "Khu B").unwrap(), 0);
    }

    #[test]
    fn test_compute_occupancy_propagates_storage_error() {
        let calc = CapacityCalculator::new();
        assert!(calc.compute_occupancy(&FailingLedger, "Khu A").is_err());
    }

    #[test]
    fn test_derive_remaining_floors_at_zero() {
        let calc = CapacityCalculator::new();
        let a = area(1000, 1000);
        assert_eq!(calc.derive_remaining_capacity(&a, 0), 1000);
        assert_eq!(calc.derive_remaining_capacity(&a, 300), 700);
        assert_eq!(calc.derive_remaining_capacity(&a, 1200), 0);
        assert_eq!(calc.overflow(&a, 1200), 200);
        assert_eq!(calc.overflow(&a, 900), 0);
    }

    #[test]
    fn test_validate_admission_against_stored_counter() {
        let calc = CapacityCalculator::new();
        let a = area(1000, 200);

        let ok = calc.validate_admission(&a, 150);
        assert!(ok.ok);
        assert_eq!(ok.remaining, 200);
        assert_eq!(ok.max_capacity, 1000);

        assert!(calc.validate_admission(&a, 200).ok);
        assert!(!calc.validate_admission(&a, 250).ok);
    }

    #[test]
    fn test_apply_delta_clamps_both_ends() {
        let calc = CapacityCalculator::new();

        // 空栏再"出栏"100：保持 500，不会变成 600
        assert_eq!(calc.apply_delta(&area(500, 500), -100), 500);
        // 入栏超过剩余：落到 0
        assert_eq!(calc.apply_delta(&area(500, 50), 80), 0);
        // 正常路径
        assert_eq!(calc.apply_delta(&area(1000, 1000), 300), 700);
        assert_eq!(calc.apply_delta(&area(1000, 500), -300), 800);
    }

    #[test]
    fn test_apply_delta_extreme_values_do_not_overflow() {
        let calc = CapacityCalculator::new();
        assert_eq!(calc.apply_delta(&area(10, 5), i64::MIN), 10);
        assert_eq!(calc.apply_delta(&area(10, 5), i64::MAX), 0);
    }
}
