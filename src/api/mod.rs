// ==========================================
// 养殖场区域容量台账 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供应用层与外部调用方使用
// ==========================================

pub mod area_api;
pub mod capacity_api;
pub mod dashboard_api;
pub mod error;
pub mod import_api;

// 重导出核心类型
pub use area_api::AreaApi;
pub use capacity_api::{CapacityApi, CapacityScope};
pub use dashboard_api::{AreaOverview, DashboardApi, StaffDistribution, StatusCount};
pub use error::{ApiError, ApiResult};
pub use import_api::ImportApi;
