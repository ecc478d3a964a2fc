// ==========================================
// 养殖场区域容量台账 - 容量服务 API
// ==========================================
// 红线: 区域 current_capacity 只能经由本模块写入
// 红线: 同一区域的容量变更在区域锁内串行执行，落库使用 CAS
// 红线: 剩余容量永远在 [0, max_capacity] 区间内
// ==========================================
// 职责:
// - 容量查询 / 入栏前检查（只读）
// - 增量更新（热路径）与全量重算（权威路径）
// - 入栏台账变更钩子
// - 区域扩缩容
// - 每次计数写入追加 capacity_log
// ==========================================

use std::sync::{Arc, RwLock};

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::config::CapacityPolicy;
use crate::domain::area::Area;
use crate::domain::capacity::{
    CapacityChangeSource, CapacityCheck, CapacityInfo, CapacityLogEntry, RecomputeOutcome,
};
use crate::engine::area_locks::{AreaLockGuard, AreaLockRegistry};
use crate::engine::capacity_calculator::CapacityCalculator;
use crate::engine::events::{CapacityEvent, CapacityEventType, OptionalEventPublisher};
use crate::engine::reconciler::{ReconcileResult, ReconcileTarget};
use crate::repository::sql_utils::now_ts;
use crate::repository::{
    AreaRepository, CapacityLogRepository, ImportRecordRepository, RepositoryError,
};

/// 容量日志默认条数
pub const DEFAULT_LOG_LIMIT: i64 = 50;

/// 一次计数写入的目标值
#[derive(Debug, Clone, Copy)]
struct CapacityWrite {
    max_capacity: i64,
    current_capacity: i64,
    occupancy: Option<i64>,
}

// ==========================================
// CapacityApi - 容量服务
// ==========================================
pub struct CapacityApi {
    area_repo: Arc<AreaRepository>,
    import_repo: Arc<ImportRecordRepository>,
    log_repo: Arc<CapacityLogRepository>,
    calculator: CapacityCalculator,
    locks: AreaLockRegistry,
    // 运行中可由配置刷新
    policy: RwLock<CapacityPolicy>,
    events: OptionalEventPublisher,
}

impl CapacityApi {
    /// 创建新的 CapacityApi 实例（默认策略、无事件发布者）
    pub fn new(
        area_repo: Arc<AreaRepository>,
        import_repo: Arc<ImportRecordRepository>,
        log_repo: Arc<CapacityLogRepository>,
    ) -> Self {
        Self {
            area_repo,
            import_repo,
            log_repo,
            calculator: CapacityCalculator::new(),
            locks: AreaLockRegistry::new(),
            policy: RwLock::new(CapacityPolicy::default()),
            events: OptionalEventPublisher::none(),
        }
    }

    pub fn with_policy(self, policy: CapacityPolicy) -> Self {
        self.set_policy(policy);
        self
    }

    pub fn with_event_publisher(mut self, events: OptionalEventPublisher) -> Self {
        self.events = events;
        self
    }

    /// 当前生效的容量写入策略
    pub fn policy(&self) -> CapacityPolicy {
        *self.policy.read().unwrap_or_else(|p| p.into_inner())
    }

    /// 替换容量写入策略（下一次写入生效）
    pub fn set_policy(&self, policy: CapacityPolicy) {
        let mut current = self.policy.write().unwrap_or_else(|p| p.into_inner());
        if *current != policy {
            info!(
                cas_max_attempts = policy.cas_max_attempts,
                alert_on_integrity_violation = policy.alert_on_integrity_violation,
                "容量写入策略已更新"
            );
            *current = policy;
        }
    }

    // ==========================================
    // 区域作用域
    // ==========================================

    /// 进入单区域作用域（阻塞直到获得区域锁）
    pub fn lock_area(&self, area_id: &str) -> CapacityScope<'_> {
        CapacityScope {
            api: self,
            guard: self.locks.lock(area_id),
        }
    }

    /// 进入多区域作用域（一次性获得全部区域锁）
    pub fn lock_areas(&self, area_ids: &[&str]) -> CapacityScope<'_> {
        CapacityScope {
            api: self,
            guard: self.locks.lock_many(area_ids),
        }
    }

    /// 按名称解析区域（忽略大小写）
    fn resolve(&self, area_name: &str) -> ApiResult<Area> {
        self.area_repo
            .find_by_name_ci(area_name)?
            .ok_or_else(|| ApiError::area_not_found(area_name))
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 查询区域容量概况
    ///
    /// # 返回
    /// - max_capacity / current_capacity(剩余) / current_count(存栏)
    #[instrument(skip(self))]
    pub fn get_capacity_info(&self, area_name: &str) -> ApiResult<CapacityInfo> {
        let area = self.resolve(area_name)?;
        Ok(CapacityInfo::from(&area))
    }

    /// 入栏前容量检查（只读）
    ///
    /// # 参数
    /// - `new_quantity`: 拟入栏数量
    /// - `exclude_record_id`: 编辑已有记录时传入，该记录若在本区域在栏，其数量先加回剩余容量
    ///
    /// # 返回
    /// - is_valid=false 表示超容（结果值，不是错误）
    #[instrument(skip(self))]
    pub fn check_capacity(
        &self,
        area_name: &str,
        new_quantity: i64,
        exclude_record_id: Option<&str>,
    ) -> ApiResult<CapacityCheck> {
        let area = self.resolve(area_name)?;
        self.check_against(&area, new_quantity, exclude_record_id)
    }

    fn check_against(
        &self,
        area: &Area,
        new_quantity: i64,
        exclude_record_id: Option<&str>,
    ) -> ApiResult<CapacityCheck> {
        let mut remaining = area.current_capacity;

        if let Some(record_id) = exclude_record_id {
            if let Some(record) = self.import_repo.find_by_id(record_id)? {
                if area.name_matches(&record.barn) {
                    remaining = (remaining + record.occupancy_contribution()).min(area.max_capacity);
                }
            }
        }

        let mut view = area.clone();
        view.current_capacity = remaining;
        let decision = self.calculator.validate_admission(&view, new_quantity);

        Ok(CapacityCheck {
            is_valid: decision.ok,
            current_capacity: area.current_capacity,
            max_capacity: area.max_capacity,
            remaining_capacity: remaining,
        })
    }

    /// 查询区域容量变更日志（最新在前）
    pub fn list_capacity_log(
        &self,
        area_name: &str,
        limit: Option<i64>,
    ) -> ApiResult<Vec<CapacityLogEntry>> {
        let area = self.resolve(area_name)?;
        let limit = limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, 1000);
        Ok(self.log_repo.list_by_area(&area.area_id, limit)?)
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 全量重算剩余容量
    ///
    /// # 返回
    /// - Ok(i64): 重算后的剩余容量
    #[instrument(skip(self))]
    pub fn recompute_capacity(&self, area_name: &str) -> ApiResult<i64> {
        let area = self.resolve(area_name)?;
        let scope = self.lock_area(&area.area_id);
        Ok(scope.recompute(&area.area_id)?.recomputed)
    }

    /// 按区域ID重算（对账调度器使用，不受改名影响）
    pub fn reconcile_area(&self, area_id: &str) -> ApiResult<RecomputeOutcome> {
        let scope = self.lock_area(area_id);
        scope.recompute(area_id)
    }

    /// 增量调整剩余容量
    ///
    /// # 参数
    /// - `quantity_change`: 正数=入栏，负数=出栏
    ///
    /// # 返回
    /// - Ok(i64): 调整后的剩余容量
    #[instrument(skip(self))]
    pub fn apply_capacity_delta(&self, area_name: &str, quantity_change: i64) -> ApiResult<i64> {
        self.apply_by_name(area_name, quantity_change, CapacityChangeSource::ManualDelta)
    }

    /// 区域扩缩容（同时写入最大容量与剩余容量）
    ///
    /// 新的最大容量不得低于台账存栏数
    #[instrument(skip(self))]
    pub fn resize_area(&self, area_name: &str, new_max_capacity: i64) -> ApiResult<CapacityInfo> {
        let area = self.resolve(area_name)?;
        let scope = self.lock_area(&area.area_id);
        scope.resize(&area.area_id, new_max_capacity)
    }

    fn apply_by_name(
        &self,
        area_name: &str,
        quantity_change: i64,
        source: CapacityChangeSource,
    ) -> ApiResult<i64> {
        let area = self.resolve(area_name)?;
        let scope = self.lock_area(&area.area_id);
        scope.apply_delta(&area.area_id, quantity_change, source)
    }

    // ==========================================
    // 入栏台账钩子
    // ==========================================

    /// 入栏记录已创建（调用前已通过容量检查）
    pub fn on_import_created(&self, area_name: &str, quantity: i64) -> ApiResult<i64> {
        self.apply_by_name(area_name, quantity, CapacityChangeSource::ImportCreated)
    }

    /// 入栏数量变更
    pub fn on_import_quantity_changed(
        &self,
        area_name: &str,
        old_quantity: i64,
        new_quantity: i64,
    ) -> ApiResult<i64> {
        self.apply_by_name(
            area_name,
            new_quantity - old_quantity,
            CapacityChangeSource::ImportQuantityChanged,
        )
    }

    /// 入栏记录已删除
    pub fn on_import_deleted(&self, area_name: &str, quantity: i64) -> ApiResult<i64> {
        self.apply_by_name(area_name, -quantity, CapacityChangeSource::ImportDeleted)
    }

    /// 入栏记录已出栏（in-progress → completed）
    pub fn on_import_status_changed_to_completed(
        &self,
        area_name: &str,
        quantity: i64,
    ) -> ApiResult<i64> {
        self.apply_by_name(area_name, -quantity, CapacityChangeSource::ImportCompleted)
    }

    // ==========================================
    // 内部：日志与事件
    // ==========================================

    fn record_change(
        &self,
        area: &Area,
        source: CapacityChangeSource,
        quantity_change: Option<i64>,
        write: CapacityWrite,
    ) {
        let entry = CapacityLogEntry {
            log_id: Uuid::new_v4().to_string(),
            area_id: area.area_id.clone(),
            area_name: area.name.clone(),
            source,
            quantity_change,
            capacity_before: area.current_capacity,
            capacity_after: write.current_capacity,
            occupancy: write.occupancy,
            created_at: now_ts(),
        };
        // 计数已落库，审计写入失败不回滚
        if let Err(e) = self.log_repo.insert(&entry) {
            warn!(area = %area.name, source = %source, error = %e, "容量日志写入失败");
        }

        let event_type = match source {
            CapacityChangeSource::Recompute => CapacityEventType::CapacityRecomputed,
            _ => CapacityEventType::CapacityChanged,
        };
        self.events.publish(CapacityEvent {
            area_id: area.area_id.clone(),
            area_name: area.name.clone(),
            event_type,
            source,
            capacity_before: area.current_capacity,
            capacity_after: write.current_capacity,
            max_capacity: write.max_capacity,
            occupancy: write.occupancy,
        });
    }

    fn report_integrity_violation(&self, area: &Area, occupancy: i64) {
        warn!(
            area = %area.name,
            occupancy,
            max_capacity = area.max_capacity,
            "台账存栏数超过区域最大容量，剩余容量已置 0"
        );
        if self.policy().alert_on_integrity_violation {
            self.events.publish(CapacityEvent {
                area_id: area.area_id.clone(),
                area_name: area.name.clone(),
                event_type: CapacityEventType::IntegrityViolation,
                source: CapacityChangeSource::Recompute,
                capacity_before: area.current_capacity,
                capacity_after: 0,
                max_capacity: area.max_capacity,
                occupancy: Some(occupancy),
            });
        }
    }
}

// ==========================================
// CapacityScope - 区域作用域
// ==========================================
// 持有区域锁期间的容量操作入口
// 说明: 区域锁不可重入，作用域内只能调用本类型的方法，不能再调用 CapacityApi 的公开写方法
pub struct CapacityScope<'a> {
    api: &'a CapacityApi,
    guard: AreaLockGuard<'a>,
}

impl<'a> CapacityScope<'a> {
    /// 作用域是否覆盖指定区域
    pub fn covers(&self, area_id: &str) -> bool {
        self.guard.covers(area_id)
    }

    fn ensure_covered(&self, area_id: &str) -> ApiResult<()> {
        if self.covers(area_id) {
            Ok(())
        } else {
            Err(ApiError::InternalError(format!(
                "区域{}不在当前容量作用域内（已锁定: {:?}）",
                area_id,
                self.guard.keys()
            )))
        }
    }

    /// 读取作用域内区域的最新状态
    pub fn area(&self, area_id: &str) -> ApiResult<Area> {
        self.ensure_covered(area_id)?;
        self.api
            .area_repo
            .find_by_id(area_id)?
            .ok_or_else(|| {
                ApiError::from(RepositoryError::NotFound {
                    entity: "Area".to_string(),
                    id: area_id.to_string(),
                })
            })
    }

    /// 作用域内容量检查
    pub fn check(
        &self,
        area_id: &str,
        new_quantity: i64,
        exclude_record_id: Option<&str>,
    ) -> ApiResult<CapacityCheck> {
        let area = self.area(area_id)?;
        self.api.check_against(&area, new_quantity, exclude_record_id)
    }

    /// 作用域内增量调整
    pub fn apply_delta(
        &self,
        area_id: &str,
        quantity_change: i64,
        source: CapacityChangeSource,
    ) -> ApiResult<i64> {
        let calculator = self.api.calculator;
        let (area, write) = self.write_with_retry(area_id, |area| {
            let unclamped = area.current_capacity.saturating_sub(quantity_change);
            if unclamped < 0 || unclamped > area.max_capacity {
                warn!(
                    area = %area.name,
                    current = area.current_capacity,
                    quantity_change,
                    "增量超出容量区间，已钳制"
                );
            }
            Ok(CapacityWrite {
                max_capacity: area.max_capacity,
                current_capacity: calculator.apply_delta(area, quantity_change),
                occupancy: None,
            })
        })?;

        self.api
            .record_change(&area, source, Some(quantity_change), write);
        info!(
            area = %area.name,
            source = %source,
            quantity_change,
            before = area.current_capacity,
            after = write.current_capacity,
            "剩余容量已更新"
        );
        Ok(write.current_capacity)
    }

    /// 作用域内全量重算
    pub fn recompute(&self, area_id: &str) -> ApiResult<RecomputeOutcome> {
        let calculator = self.api.calculator;
        let import_repo = self.api.import_repo.clone();
        let (area, write) = self.write_with_retry(area_id, |area| {
            let occupancy = calculator.compute_occupancy(import_repo.as_ref(), &area.name)?;
            Ok(CapacityWrite {
                max_capacity: area.max_capacity,
                current_capacity: calculator.derive_remaining_capacity(area, occupancy),
                occupancy: Some(occupancy),
            })
        })?;

        let occupancy = write.occupancy.unwrap_or(0);
        let integrity_violation = calculator.overflow(&area, occupancy) > 0;
        if integrity_violation {
            self.api.report_integrity_violation(&area, occupancy);
        }

        self.api
            .record_change(&area, CapacityChangeSource::Recompute, None, write);

        let outcome = RecomputeOutcome {
            area_id: area.area_id.clone(),
            area_name: area.name.clone(),
            previous: area.current_capacity,
            recomputed: write.current_capacity,
            occupancy,
            integrity_violation,
        };
        if outcome.corrected() {
            info!(
                area = %area.name,
                previous = outcome.previous,
                recomputed = outcome.recomputed,
                "重算修正了剩余容量漂移"
            );
        } else {
            debug!(area = %area.name, remaining = outcome.recomputed, "重算无漂移");
        }
        Ok(outcome)
    }

    /// 作用域内扩缩容
    pub fn resize(&self, area_id: &str, new_max_capacity: i64) -> ApiResult<CapacityInfo> {
        if new_max_capacity <= 0 {
            return Err(ApiError::InvalidInput(format!(
                "最大容量必须大于 0，实际 {}",
                new_max_capacity
            )));
        }

        let calculator = self.api.calculator;
        let import_repo = self.api.import_repo.clone();
        let (area, write) = self.write_with_retry(area_id, |area| {
            let occupancy = calculator.compute_occupancy(import_repo.as_ref(), &area.name)?;
            if occupancy > new_max_capacity {
                return Err(ApiError::BusinessRuleViolation(format!(
                    "区域{}当前存栏{}只，最大容量不能调整为{}",
                    area.name, occupancy, new_max_capacity
                )));
            }
            let mut resized = area.clone();
            resized.max_capacity = new_max_capacity;
            Ok(CapacityWrite {
                max_capacity: new_max_capacity,
                current_capacity: calculator.derive_remaining_capacity(&resized, occupancy),
                occupancy: Some(occupancy),
            })
        })?;

        self.api
            .record_change(&area, CapacityChangeSource::Resize, None, write);
        info!(
            area = %area.name,
            old_max = area.max_capacity,
            new_max = new_max_capacity,
            remaining = write.current_capacity,
            "区域容量已调整"
        );

        Ok(CapacityInfo {
            max_capacity: write.max_capacity,
            current_capacity: write.current_capacity,
            current_count: write.max_capacity - write.current_capacity,
        })
    }

    /// CAS 写入循环
    ///
    /// 每轮重新读取区域并计算目标值；只有未生效的写入（计数已变 / 数据库繁忙）才重试
    fn write_with_retry<F>(&self, area_id: &str, mut plan: F) -> ApiResult<(Area, CapacityWrite)>
    where
        F: FnMut(&Area) -> ApiResult<CapacityWrite>,
    {
        let max_attempts = self.api.policy().cas_max_attempts.max(1);
        let mut last_err: Option<RepositoryError> = None;

        for attempt in 1..=max_attempts {
            let area = self.area(area_id)?;
            let write = plan(&area)?;

            let mut next = area.clone();
            next.max_capacity = write.max_capacity;
            next.current_capacity = write.current_capacity;
            if !next.is_within_bounds() {
                return Err(ApiError::InternalError(format!(
                    "区域{}的目标剩余容量{}超出 [0, {}]",
                    area.name, write.current_capacity, write.max_capacity
                )));
            }

            let result = if write.max_capacity == area.max_capacity {
                self.api.area_repo.compare_and_set_capacity(
                    area_id,
                    area.current_capacity,
                    write.current_capacity,
                )
            } else {
                self.api.area_repo.compare_and_set_limits(
                    area_id,
                    area.current_capacity,
                    write.max_capacity,
                    write.current_capacity,
                )
            };

            match result {
                Ok(()) => return Ok((area, write)),
                Err(e) if e.is_transient() => {
                    debug!(area_id, attempt, error = %e, "容量写入冲突，重试");
                    last_err = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(area_id, attempts = max_attempts, "容量写入重试耗尽");
        Err(match last_err {
            Some(e) => e.into(),
            None => ApiError::OptimisticLockFailure(format!("区域{}容量写入失败", area_id)),
        })
    }
}

// ==========================================
// ReconcileTarget 实现
// ==========================================
impl ReconcileTarget for CapacityApi {
    fn area_ids(&self) -> ReconcileResult<Vec<String>> {
        let areas = self.area_repo.list_all()?;
        Ok(areas.into_iter().map(|a| a.area_id).collect())
    }

    fn reconcile_area(&self, area_id: &str) -> ReconcileResult<RecomputeOutcome> {
        Ok(CapacityApi::reconcile_area(self, area_id)?)
    }

    fn apply_policy(&self, policy: CapacityPolicy) {
        self.set_policy(policy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::domain::import_record::ImportRecord;
    use crate::domain::types::{AreaStatus, ImportStatus};
    use crate::engine::events::CapacityEventPublisher;
    use chrono::NaiveDate;
    use rusqlite::Connection;
    use std::error::Error;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<CapacityEvent>>,
    }

    impl CapacityEventPublisher for Recorder {
        fn publish(&self, event: CapacityEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
            self.events.lock().unwrap().push(event);
            Ok(String::new())
        }
    }

    struct Fixture {
        api: CapacityApi,
        areas: Arc<AreaRepository>,
        imports: Arc<ImportRecordRepository>,
        recorder: Arc<Recorder>,
    }

    fn fixture() -> Fixture {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let areas = Arc::new(AreaRepository::new(conn.clone()));
        let imports = Arc::new(ImportRecordRepository::new(conn.clone()));
        let logs = Arc::new(CapacityLogRepository::new(conn));
        let recorder = Arc::new(Recorder::default());
        let api = CapacityApi::new(areas.clone(), imports.clone(), logs)
            .with_event_publisher(OptionalEventPublisher::with_publisher(recorder.clone()));
        Fixture {
            api,
            areas,
            imports,
            recorder,
        }
    }

    fn seed_area(repo: &AreaRepository, id: &str, name: &str, max: i64, current: i64) {
        let ts = now_ts();
        repo.insert(&Area {
            area_id: id.to_string(),
            name: name.to_string(),
            max_capacity: max,
            current_capacity: current,
            status: AreaStatus::Active,
            staff: vec![],
            created_at: ts,
            updated_at: ts,
        })
        .unwrap();
    }

    fn seed_import(repo: &ImportRecordRepository, id: &str, barn: &str, qty: i64, status: ImportStatus) {
        let ts = now_ts();
        repo.insert(&ImportRecord {
            import_id: id.to_string(),
            import_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            supplier: "CP".to_string(),
            breed: "Ross 308".to_string(),
            quantity: qty,
            avg_weight: 0.5,
            barn: barn.to_string(),
            status,
            notes: None,
            created_at: ts,
            updated_at: ts,
        })
        .unwrap();
    }

    #[test]
    fn test_check_capacity_uses_stored_counter() {
        let f = fixture();
        seed_area(&f.areas, "A1", "Khu A", 1000, 200);

        let ok = f.api.check_capacity("Khu A", 150, None).unwrap();
        assert!(ok.is_valid);
        assert_eq!(ok.remaining_capacity, 200);

        let rejected = f.api.check_capacity("khu a", 250, None).unwrap();
        assert!(!rejected.is_valid);
        assert_eq!(rejected.current_capacity, 200);
        assert_eq!(rejected.max_capacity, 1000);
    }

    #[test]
    fn test_check_capacity_adds_back_excluded_record() {
        let f = fixture();
        seed_area(&f.areas, "A1", "Khu A", 1000, 700);
        seed_import(&f.imports, "R1", "Khu A", 300, ImportStatus::InProgress);

        let check = f.api.check_capacity("Khu A", 900, Some("R1")).unwrap();
        assert!(check.is_valid);
        assert_eq!(check.remaining_capacity, 1000);
        assert_eq!(check.current_capacity, 700);

        // 其他区域的记录不加回
        seed_area(&f.areas, "B1", "Khu B", 1000, 700);
        let other = f.api.check_capacity("Khu B", 900, Some("R1")).unwrap();
        assert!(!other.is_valid);
    }

    #[test]
    fn test_apply_delta_clamps_and_logs() {
        let f = fixture();
        seed_area(&f.areas, "A1", "Khu A", 500, 500);

        assert_eq!(f.api.apply_capacity_delta("Khu A", -100).unwrap(), 500);
        assert_eq!(f.api.apply_capacity_delta("Khu A", 200).unwrap(), 300);

        let log = f.api.list_capacity_log("Khu A", None).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].capacity_after, 300);
        assert_eq!(log[0].quantity_change, Some(200));
    }

    #[test]
    fn test_recompute_flags_integrity_violation() {
        let f = fixture();
        seed_area(&f.areas, "A1", "Khu A", 100, 100);
        seed_import(&f.imports, "R1", "Khu A", 150, ImportStatus::InProgress);

        let outcome = f.api.reconcile_area("A1").unwrap();
        assert_eq!(outcome.recomputed, 0);
        assert_eq!(outcome.occupancy, 150);
        assert!(outcome.integrity_violation);

        let events = f.recorder.events.lock().unwrap();
        assert!(events
            .iter()
            .any(|e| e.event_type == CapacityEventType::IntegrityViolation));
    }

    #[test]
    fn test_resize_rejects_below_occupancy() {
        let f = fixture();
        seed_area(&f.areas, "A1", "Khu A", 1000, 700);
        seed_import(&f.imports, "R1", "Khu A", 300, ImportStatus::InProgress);

        let err = f.api.resize_area("Khu A", 200).unwrap_err();
        assert!(matches!(err, ApiError::BusinessRuleViolation(_)));

        let info = f.api.resize_area("Khu A", 400).unwrap();
        assert_eq!(info.max_capacity, 400);
        assert_eq!(info.current_capacity, 100);
        assert_eq!(info.current_count, 300);
    }

    #[test]
    fn test_scope_rejects_uncovered_area() {
        let f = fixture();
        seed_area(&f.areas, "A1", "Khu A", 1000, 1000);
        seed_area(&f.areas, "B1", "Khu B", 1000, 1000);

        let scope = f.api.lock_area("A1");
        let err = scope
            .apply_delta("B1", 10, CapacityChangeSource::ManualDelta)
            .unwrap_err();
        assert!(matches!(err, ApiError::InternalError(_)));
    }

    #[test]
    fn test_unknown_area_is_not_found() {
        let f = fixture();
        assert!(matches!(
            f.api.get_capacity_info("Khu Z").unwrap_err(),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            f.api.reconcile_area("missing").unwrap_err(),
            ApiError::NotFound(_)
        ));
    }

    #[test]
    fn test_scope_rejects_area_outside_lock() {
        let f = fixture();
        seed_area(&f.areas, "A1", "Khu A", 100, 100);
        seed_area(&f.areas, "A2", "Khu B", 100, 100);

        let scope = f.api.lock_area("A1");
        let err = scope.area("A2").unwrap_err();
        assert!(matches!(err, ApiError::InternalError(_)));
        assert!(err.to_string().contains("A1"));
        assert_eq!(scope.area("A1").unwrap().name, "Khu A");
    }

    #[test]
    fn test_set_policy_takes_effect_for_next_write() {
        let f = fixture();
        seed_area(&f.areas, "A1", "Khu A", 100, 100);
        seed_import(&f.imports, "R1", "Khu A", 150, ImportStatus::InProgress);

        f.api.set_policy(CapacityPolicy {
            cas_max_attempts: 3,
            alert_on_integrity_violation: false,
        });
        assert_eq!(f.api.policy().cas_max_attempts, 3);

        // 台账超容，但告警已关闭
        assert_eq!(f.api.recompute_capacity("Khu A").unwrap(), 0);
        assert!(f
            .recorder
            .events
            .lock()
            .unwrap()
            .iter()
            .all(|e| e.event_type != CapacityEventType::IntegrityViolation));
    }
}
