// ==========================================
// 养殖场区域容量台账 - 应用层
// ==========================================
// 职责: 组装共享连接、仓储、API 与对账调度器
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState, ENV_DB_PATH};
