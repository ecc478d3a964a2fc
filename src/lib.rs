// ==========================================
// 养殖场区域容量台账 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 区域存栏容量核算（入栏准入、增量维护、全量对账）
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 容量规则 / 区域锁 / 事件 / 对账
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// SQL 性能统计
pub mod perf;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{AreaStatus, ImportStatus, SortOrder};

// 领域实体
pub use domain::{
    Area, CapacityCheck, CapacityInfo, CapacityLogEntry, ImportRecord, NewArea, NewImportRecord,
    RecomputeOutcome,
};

// 引擎
pub use engine::{CapacityCalculator, ReconcileReport, Reconciler};

// API
pub use api::{ApiError, ApiResult, AreaApi, CapacityApi, DashboardApi, ImportApi};

// 应用
pub use app::AppState;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "养殖场区域容量台账";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
