// ==========================================
// 养殖场区域容量台账 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::capacity_config_trait::{CapacityConfigReader, ConfigResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ==========================================
// 配置键
// ==========================================
pub mod config_keys {
    /// 剩余容量 CAS 写入的最大尝试次数
    pub const CAS_MAX_ATTEMPTS: &str = "capacity/cas_max_attempts";
    /// 台账存栏数超过最大容量时是否告警
    pub const ALERT_ON_INTEGRITY_VIOLATION: &str = "capacity/alert_on_integrity_violation";
    /// 是否启用定时对账
    pub const RECONCILE_ENABLED: &str = "reconcile/enabled";
    /// 定时对账间隔（秒）
    pub const RECONCILE_INTERVAL_SECS: &str = "reconcile/interval_secs";
    /// 界面/消息语言
    pub const UI_LOCALE: &str = "ui/locale";
}

/// 默认值
pub const DEFAULT_CAS_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_LOCALE: &str = "zh-CN";

/// 最小对账间隔，防止误配置成 0 导致空转
const MIN_RECONCILE_INTERVAL_SECS: u64 = 5;

// ==========================================
// CapacityPolicy - 容量写入策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityPolicy {
    pub cas_max_attempts: u32,
    pub alert_on_integrity_violation: bool,
}

impl Default for CapacityPolicy {
    fn default() -> Self {
        Self {
            cas_max_attempts: DEFAULT_CAS_MAX_ATTEMPTS,
            alert_on_integrity_violation: true,
        }
    }
}

/// 布尔配置解析
pub fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }
        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        tracing::info!(key, value, "配置已更新");
        Ok(())
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 从配置快照恢复配置
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> ConfigResult<usize> {
        let config_map: HashMap<String, String> = serde_json::from_str(snapshot_json)?;

        let mut conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for (key, value) in config_map.iter() {
            count += tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
        }

        tx.commit()?;
        Ok(count)
    }

    // ===== 容量策略 =====

    /// 读取容量写入策略
    ///
    /// 无效值回退默认值并告警，不阻断启动
    pub fn load_capacity_policy(&self) -> ConfigResult<CapacityPolicy> {
        let defaults = CapacityPolicy::default();

        let cas_max_attempts = match self.get_config_value(config_keys::CAS_MAX_ATTEMPTS)? {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(v) if v >= 1 => v,
                _ => {
                    tracing::warn!(key = config_keys::CAS_MAX_ATTEMPTS, value = %raw, "配置值无效，使用默认值");
                    defaults.cas_max_attempts
                }
            },
            None => defaults.cas_max_attempts,
        };

        let alert_on_integrity_violation =
            match self.get_config_value(config_keys::ALERT_ON_INTEGRITY_VIOLATION)? {
                Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
                    tracing::warn!(key = config_keys::ALERT_ON_INTEGRITY_VIOLATION, value = %raw, "配置值无效，使用默认值");
                    defaults.alert_on_integrity_violation
                }),
                None => defaults.alert_on_integrity_violation,
            };

        Ok(CapacityPolicy {
            cas_max_attempts,
            alert_on_integrity_violation,
        })
    }

    /// 读取消息语言
    pub fn get_locale(&self) -> ConfigResult<String> {
        self.get_config_or_default(config_keys::UI_LOCALE, DEFAULT_LOCALE)
    }

    fn reconcile_enabled(&self) -> ConfigResult<bool> {
        let raw = self.get_config_or_default(config_keys::RECONCILE_ENABLED, "true")?;
        Ok(parse_bool(&raw).unwrap_or(true))
    }

    fn reconcile_interval_secs(&self) -> ConfigResult<u64> {
        let raw = self.get_config_or_default(
            config_keys::RECONCILE_INTERVAL_SECS,
            &DEFAULT_RECONCILE_INTERVAL_SECS.to_string(),
        )?;
        let secs = raw
            .trim()
            .parse::<u64>()
            .unwrap_or(DEFAULT_RECONCILE_INTERVAL_SECS);
        Ok(secs.max(MIN_RECONCILE_INTERVAL_SECS))
    }
}

// ==========================================
// CapacityConfigReader 实现
// ==========================================
#[async_trait]
impl CapacityConfigReader for ConfigManager {
    async fn get_reconcile_enabled(&self) -> ConfigResult<bool> {
        self.reconcile_enabled()
    }

    async fn get_reconcile_interval_secs(&self) -> ConfigResult<u64> {
        self.reconcile_interval_secs()
    }

    async fn get_capacity_policy(&self) -> ConfigResult<CapacityPolicy> {
        self.load_capacity_policy()
    }
}
