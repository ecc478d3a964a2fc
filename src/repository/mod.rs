// ==========================================
// 养殖场区域容量台账 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod area_repo;
pub mod capacity_log_repo;
pub mod error;
pub mod import_record_repo;
pub mod sql_utils;

// 重导出核心仓储
pub use area_repo::AreaRepository;
pub use capacity_log_repo::CapacityLogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use import_record_repo::ImportRecordRepository;
