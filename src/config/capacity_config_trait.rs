// ==========================================
// 养殖场区域容量台账 - 容量配置读取 Trait
// ==========================================
// 职责: 定义对账调度与容量写入所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::config_manager::CapacityPolicy;
use async_trait::async_trait;
use std::error::Error;

/// 配置读取结果
pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// CapacityConfigReader Trait
// ==========================================
// 用途: 对账调度器所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait CapacityConfigReader: Send + Sync {
    /// 是否启用定时对账
    ///
    /// # 默认值
    /// - true
    async fn get_reconcile_enabled(&self) -> ConfigResult<bool>;

    /// 对账间隔（秒）
    ///
    /// # 默认值
    /// - 300
    async fn get_reconcile_interval_secs(&self) -> ConfigResult<u64>;

    /// 容量写入策略（CAS 重试次数、完整性告警）
    async fn get_capacity_policy(&self) -> ConfigResult<CapacityPolicy>;
}
