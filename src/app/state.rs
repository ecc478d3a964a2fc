// ==========================================
// 养殖场区域容量台账 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::api::{AreaApi, CapacityApi, DashboardApi, ImportApi};
use crate::config::config_manager::DEFAULT_LOCALE;
use crate::config::{CapacityConfigReader, CapacityPolicy, ConfigManager};
use crate::db::{init_schema, open_sqlite_connection};
use crate::engine::{CapacityEventPublisher, OptionalEventPublisher, Reconciler};
use crate::i18n;
use crate::perf::install_sqlite_tracing;
use crate::repository::{AreaRepository, CapacityLogRepository, ImportRecordRepository};

/// 数据库路径环境变量
pub const ENV_DB_PATH: &str = "FARM_LEDGER_DB_PATH";

const DB_FILE_NAME: &str = "farm_capacity_ledger.db";

/// 应用状态
///
/// 包含所有API实例和共享资源，全部 Repository 共用一个连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    pub config_manager: Arc<ConfigManager>,

    /// 容量服务（唯一的剩余容量写入方）
    pub capacity_api: Arc<CapacityApi>,

    pub area_api: Arc<AreaApi>,

    pub import_api: Arc<ImportApi>,

    pub dashboard_api: Arc<DashboardApi>,

    /// 对账调度器
    pub reconciler: Arc<Reconciler>,
}

impl AppState {
    /// 创建新的AppState实例（无事件发布者）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径（":memory:" 可用于测试）
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::with_event_publisher(db_path, None)
    }

    /// 创建AppState，并注入容量事件发布者
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开共享连接并建表
    /// 2. 读取容量策略与语言配置
    /// 3. 创建所有 Repository 与 API 实例
    pub fn with_event_publisher(
        db_path: String,
        publisher: Option<Arc<dyn CapacityEventPublisher>>,
    ) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let mut conn =
            open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        install_sqlite_tracing(&mut conn);
        init_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 配置
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let policy = config_manager
            .load_capacity_policy()
            .map_err(|e| format!("读取容量策略失败: {}", e))?;
        let locale = config_manager.get_locale().unwrap_or_else(|e| {
            tracing::warn!("读取语言配置失败，使用默认语言: {}", e);
            DEFAULT_LOCALE.to_string()
        });
        let locale = if i18n::is_supported(&locale) {
            locale
        } else {
            tracing::warn!("不支持的语言 {}，使用默认语言", locale);
            DEFAULT_LOCALE.to_string()
        };
        i18n::set_locale(&locale);

        // ==========================================
        // Repository
        // ==========================================
        let area_repo = Arc::new(AreaRepository::new(conn.clone()));
        let import_repo = Arc::new(ImportRecordRepository::new(conn.clone()));
        let log_repo = Arc::new(CapacityLogRepository::new(conn));

        // ==========================================
        // API
        // ==========================================
        let capacity_api = Arc::new(
            CapacityApi::new(area_repo.clone(), import_repo.clone(), log_repo.clone())
                .with_policy(policy)
                .with_event_publisher(OptionalEventPublisher::from_option(publisher)),
        );
        let area_api = Arc::new(
            AreaApi::new(area_repo.clone(), import_repo.clone(), capacity_api.clone())
                .with_locale(locale.clone()),
        );
        let import_api = Arc::new(
            ImportApi::new(import_repo, area_repo.clone(), capacity_api.clone())
                .with_locale(locale),
        );
        let dashboard_api = Arc::new(DashboardApi::new(area_repo, log_repo));

        let config_reader: Arc<dyn CapacityConfigReader> = config_manager.clone();
        let reconciler = Arc::new(Reconciler::new(capacity_api.clone(), config_reader));

        tracing::info!(
            cas_max_attempts = policy.cas_max_attempts,
            alert_on_integrity_violation = policy.alert_on_integrity_violation,
            "AppState初始化完成"
        );

        Ok(Self {
            db_path,
            config_manager,
            capacity_api,
            area_api,
            import_api,
            dashboard_api,
            reconciler,
        })
    }

    /// 重新读取容量写入策略并立即生效
    ///
    /// 对账调度每轮也会刷新，此方法用于配置修改后不等下一轮
    pub fn reload_capacity_policy(&self) -> Result<CapacityPolicy, String> {
        let policy = self
            .config_manager
            .load_capacity_policy()
            .map_err(|e| format!("读取容量策略失败: {}", e))?;
        self.capacity_api.set_policy(policy);
        Ok(policy)
    }
}

/// 获取默认数据库路径
///
/// 优先使用环境变量 `FARM_LEDGER_DB_PATH`，否则放在用户数据目录
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(ENV_DB_PATH) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from(".").join(DB_FILE_NAME);

    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        let dir = data_dir.join("farm-capacity-ledger-dev");
        #[cfg(not(debug_assertions))]
        let dir = data_dir.join("farm-capacity-ledger");

        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join(DB_FILE_NAME);
        }
    }

    path.to_string_lossy().to_string()
}
