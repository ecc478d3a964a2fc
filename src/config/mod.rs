// ==========================================
// 养殖场区域容量台账 - 配置层
// ==========================================
// 职责: 系统配置管理
// 存储: config_kv 表
// ==========================================

pub mod capacity_config_trait;
pub mod config_manager;

// 重导出核心配置管理器
pub use capacity_config_trait::{CapacityConfigReader, ConfigResult};
pub use config_manager::{config_keys, parse_bool, CapacityPolicy, ConfigManager};
