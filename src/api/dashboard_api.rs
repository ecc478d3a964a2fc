// ==========================================
// 养殖场区域容量台账 - 看板 API
// ==========================================
// 职责: 区域概况、人员分布、容量变更日志查询
// 红线: 只读，不写入任何数据
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::error::ApiResult;
use crate::domain::capacity::CapacityLogEntry;
use crate::domain::types::AreaStatus;
use crate::repository::{AreaRepository, CapacityLogRepository};

/// 日志查询上限
const MAX_LOG_LIMIT: i64 = 500;

// ==========================================
// 响应结构
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: AreaStatus,
    pub count: i64,
}

/// 区域概况
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaOverview {
    pub total_areas: i64,
    /// 四种状态全部出现（无区域时计 0）
    pub by_status: Vec<StatusCount>,
    pub total_max_capacity: i64,
    pub total_remaining_capacity: i64,
    pub total_occupancy: i64,
    /// 存栏 / 最大容量（无容量时为 0）
    pub utilization_ratio: f64,
}

/// 单个区域的人员分布
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffDistribution {
    pub area_id: String,
    pub area_name: String,
    pub staff_count: usize,
    pub staff: Vec<String>,
}

// ==========================================
// DashboardApi - 看板 API
// ==========================================
pub struct DashboardApi {
    area_repo: Arc<AreaRepository>,
    log_repo: Arc<CapacityLogRepository>,
}

impl DashboardApi {
    pub fn new(area_repo: Arc<AreaRepository>, log_repo: Arc<CapacityLogRepository>) -> Self {
        Self {
            area_repo,
            log_repo,
        }
    }

    /// 区域概况（状态计数 + 容量汇总）
    pub fn get_area_overview(&self) -> ApiResult<AreaOverview> {
        let counted = self.area_repo.count_by_status()?;
        let by_status: Vec<StatusCount> = AreaStatus::ALL
            .iter()
            .map(|status| StatusCount {
                status: *status,
                count: counted
                    .iter()
                    .find(|(s, _)| s == status)
                    .map(|(_, c)| *c)
                    .unwrap_or(0),
            })
            .collect();

        let areas = self.area_repo.list_all()?;
        let total_max_capacity: i64 = areas.iter().map(|a| a.max_capacity).sum();
        let total_remaining_capacity: i64 = areas.iter().map(|a| a.current_capacity).sum();
        let total_occupancy = total_max_capacity - total_remaining_capacity;
        let utilization_ratio = if total_max_capacity > 0 {
            total_occupancy as f64 / total_max_capacity as f64
        } else {
            0.0
        };

        Ok(AreaOverview {
            total_areas: areas.len() as i64,
            by_status,
            total_max_capacity,
            total_remaining_capacity,
            total_occupancy,
            utilization_ratio,
        })
    }

    /// 各区域人员分布（按区域名称排序）
    pub fn get_staff_distribution(&self) -> ApiResult<Vec<StaffDistribution>> {
        let areas = self.area_repo.list_all()?;
        Ok(areas
            .into_iter()
            .map(|a| StaffDistribution {
                area_id: a.area_id,
                area_name: a.name,
                staff_count: a.staff.len(),
                staff: a.staff,
            })
            .collect())
    }

    /// 最近的容量变更日志（全部区域）
    pub fn get_recent_capacity_log(&self, limit: i64) -> ApiResult<Vec<CapacityLogEntry>> {
        Ok(self.log_repo.list_recent(limit.clamp(1, MAX_LOG_LIMIT))?)
    }

    /// 最近的重算漂移修正
    pub fn get_recent_corrections(&self, limit: i64) -> ApiResult<Vec<CapacityLogEntry>> {
        Ok(self
            .log_repo
            .list_recent_corrections(limit.clamp(1, MAX_LOG_LIMIT))?)
    }
}
