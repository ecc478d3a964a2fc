// ==========================================
// 养殖场区域容量台账 - 入栏登记 API
// ==========================================
// 职责: 入栏记录的增删改查，并驱动区域剩余容量变更
// 红线: 超容的入栏请求整体拒绝，不落库
// 红线: 记录写入与容量变更在同一区域作用域内完成
// ==========================================

use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::api::capacity_api::{CapacityApi, CapacityScope};
use crate::api::error::{ApiError, ApiResult};
use crate::config::config_manager::DEFAULT_LOCALE;
use crate::domain::area::{Area, Page, Pagination};
use crate::domain::capacity::{CapacityChangeSource, CapacityCheck};
use crate::domain::import_record::{
    validate_record_fields, ImportFilter, ImportRecord, ImportRecordPatch, NewImportRecord,
};
use crate::domain::types::ImportStatus;
use crate::i18n::t_with_args_in;
use crate::perf::PerfGuard;
use crate::repository::sql_utils::now_ts;
use crate::repository::{AreaRepository, ImportRecordRepository};

// ==========================================
// ImportApi - 入栏登记 API
// ==========================================
pub struct ImportApi {
    import_repo: Arc<ImportRecordRepository>,
    area_repo: Arc<AreaRepository>,
    capacity: Arc<CapacityApi>,
    locale: String,
}

impl ImportApi {
    /// 创建新的ImportApi实例
    pub fn new(
        import_repo: Arc<ImportRecordRepository>,
        area_repo: Arc<AreaRepository>,
        capacity: Arc<CapacityApi>,
    ) -> Self {
        Self {
            import_repo,
            area_repo,
            capacity,
            locale: DEFAULT_LOCALE.to_string(),
        }
    }

    /// 设置拒绝消息使用的语言
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    fn resolve_barn(&self, barn: &str) -> ApiResult<Area> {
        self.area_repo.find_by_name_ci(barn)?.ok_or_else(|| {
            ApiError::NotFound(t_with_args_in(
                &self.locale,
                "capacity.barn_not_found",
                &[("area", barn.trim())],
            ))
        })
    }

    fn rejection(&self, area: &Area, requested: i64, check: &CapacityCheck) -> ApiError {
        let requested_str = requested.to_string();
        let remaining_str = check.remaining_capacity.to_string();
        let max_str = check.max_capacity.to_string();
        let message = t_with_args_in(
            &self.locale,
            "capacity.admission_rejected",
            &[
                ("area", area.name.as_str()),
                ("requested", requested_str.as_str()),
                ("remaining", remaining_str.as_str()),
                ("max", max_str.as_str()),
            ],
        );
        info!(
            area = %area.name,
            requested,
            remaining = check.remaining_capacity,
            "入栏请求超出剩余容量，已拒绝"
        );
        ApiError::CapacityConstraintViolation {
            area: area.name.clone(),
            requested,
            remaining: check.remaining_capacity,
            message,
        }
    }

    /// 作用域内准入检查，超容转为拒绝错误
    fn admit(
        &self,
        scope: &CapacityScope<'_>,
        area: &Area,
        quantity: i64,
        exclude_record_id: Option<&str>,
    ) -> ApiResult<()> {
        let check = scope.check(&area.area_id, quantity, exclude_record_id)?;
        if check.is_valid {
            Ok(())
        } else {
            Err(self.rejection(area, quantity, &check))
        }
    }

    fn normalize(record: &mut ImportRecord) {
        record.supplier = record.supplier.trim().to_string();
        record.breed = record.breed.trim().to_string();
        record.notes = record
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 登记入栏
    ///
    /// # 返回
    /// - Ok(ImportRecord): 已落库的记录（barn 为区域规范名称）
    /// - Err(CapacityConstraintViolation): 超出剩余容量，未落库
    /// - Err(NotFound): 区域不存在
    #[instrument(skip(self, request), fields(barn = %request.barn, quantity = request.quantity))]
    pub fn create_import(&self, request: NewImportRecord) -> ApiResult<ImportRecord> {
        let _perf = PerfGuard::new("create_import");
        let target = self.resolve_barn(&request.barn)?;

        let ts = now_ts();
        let mut record = ImportRecord {
            import_id: Uuid::new_v4().to_string(),
            import_date: request.import_date,
            supplier: request.supplier,
            breed: request.breed,
            quantity: request.quantity,
            avg_weight: request.avg_weight,
            barn: target.name.clone(),
            status: request.status,
            notes: request.notes,
            created_at: ts,
            updated_at: ts,
        };
        Self::normalize(&mut record);
        validate_record_fields(&record).map_err(ApiError::InvalidInput)?;

        let scope = self.capacity.lock_area(&target.area_id);
        // 加锁前可能被改名，以锁内读到的名称为准
        let area = scope.area(&target.area_id)?;
        record.barn = area.name.clone();

        let contribution = record.occupancy_contribution();
        if contribution > 0 {
            self.admit(&scope, &area, contribution, None)?;
        }

        self.import_repo.insert(&record)?;
        if contribution > 0 {
            scope.apply_delta(
                &area.area_id,
                contribution,
                CapacityChangeSource::ImportCreated,
            )?;
        }

        info!(import_id = %record.import_id, area = %area.name, "入栏记录已登记");
        Ok(record)
    }

    /// 编辑入栏记录
    ///
    /// 支持数量变更、状态变更（出栏 / 重新入栏）、转栏
    #[instrument(skip(self, patch))]
    pub fn update_import(&self, import_id: &str, patch: ImportRecordPatch) -> ApiResult<ImportRecord> {
        let _perf = PerfGuard::new("update_import");
        let snapshot = self
            .import_repo
            .find_by_id(import_id)?
            .ok_or_else(|| ApiError::import_not_found(import_id))?;

        let old_target = self.area_repo.find_by_name_ci(&snapshot.barn)?;
        let new_target = match patch.barn.as_deref() {
            Some(barn) => self.resolve_barn(barn)?,
            None => old_target
                .clone()
                .ok_or_else(|| ApiError::area_not_found(&snapshot.barn))?,
        };

        let mut lock_ids: Vec<&str> = vec![new_target.area_id.as_str()];
        if let Some(old) = &old_target {
            lock_ids.push(old.area_id.as_str());
        }
        let scope = self.capacity.lock_areas(&lock_ids);

        let existing = self
            .import_repo
            .find_by_id(import_id)?
            .ok_or_else(|| ApiError::import_not_found(import_id))?;
        if existing.barn != snapshot.barn {
            return Err(ApiError::OptimisticLockFailure(format!(
                "入栏记录{}已被并发转栏，请重试",
                import_id
            )));
        }

        let old_area = match &old_target {
            Some(old) => Some(scope.area(&old.area_id)?),
            None => None,
        };
        let new_area = scope.area(&new_target.area_id)?;

        let mut next = patch.apply_to(&existing);
        next.barn = new_area.name.clone();
        next.updated_at = now_ts();
        Self::normalize(&mut next);
        validate_record_fields(&next).map_err(ApiError::InvalidInput)?;

        let old_contribution = existing.occupancy_contribution();
        let new_contribution = next.occupancy_contribution();
        let same_area = old_area
            .as_ref()
            .map(|a| a.area_id == new_area.area_id)
            .unwrap_or(false);

        if same_area {
            let delta = new_contribution - old_contribution;
            if delta > 0 {
                self.admit(&scope, &new_area, new_contribution, Some(import_id))?;
            }

            self.import_repo.update(&next)?;

            if delta != 0 {
                let source = match (existing.status, next.status) {
                    (ImportStatus::InProgress, ImportStatus::Completed) => {
                        CapacityChangeSource::ImportCompleted
                    }
                    (ImportStatus::Completed, ImportStatus::InProgress) => {
                        CapacityChangeSource::ImportReopened
                    }
                    _ => CapacityChangeSource::ImportQuantityChanged,
                };
                scope.apply_delta(&new_area.area_id, delta, source)?;
            }
        } else {
            if new_contribution > 0 {
                self.admit(&scope, &new_area, new_contribution, None)?;
            }

            self.import_repo.update(&next)?;

            if let Some(old) = old_area.as_ref().filter(|_| old_contribution > 0) {
                scope.apply_delta(
                    &old.area_id,
                    -old_contribution,
                    CapacityChangeSource::ImportMoved,
                )?;
            }
            if new_contribution > 0 {
                scope.apply_delta(
                    &new_area.area_id,
                    new_contribution,
                    CapacityChangeSource::ImportMoved,
                )?;
            }
            info!(
                import_id,
                from = %existing.barn,
                to = %new_area.name,
                "入栏记录已转栏"
            );
        }

        Ok(next)
    }

    /// 出栏（in-progress → completed）
    pub fn complete_import(&self, import_id: &str) -> ApiResult<ImportRecord> {
        self.update_import(
            import_id,
            ImportRecordPatch {
                status: Some(ImportStatus::Completed),
                ..Default::default()
            },
        )
    }

    /// 删除入栏记录
    #[instrument(skip(self))]
    pub fn delete_import(&self, import_id: &str) -> ApiResult<()> {
        let snapshot = self
            .import_repo
            .find_by_id(import_id)?
            .ok_or_else(|| ApiError::import_not_found(import_id))?;
        let target = self.area_repo.find_by_name_ci(&snapshot.barn)?;
        let scope = target
            .as_ref()
            .map(|area| self.capacity.lock_area(&area.area_id));

        let existing = self
            .import_repo
            .find_by_id(import_id)?
            .ok_or_else(|| ApiError::import_not_found(import_id))?;
        if existing.barn != snapshot.barn {
            return Err(ApiError::OptimisticLockFailure(format!(
                "入栏记录{}已被并发转栏，请重试",
                import_id
            )));
        }

        self.import_repo.delete(import_id)?;

        let contribution = existing.occupancy_contribution();
        if let (Some(scope), Some(area)) = (scope.as_ref(), target.as_ref()) {
            if contribution > 0 {
                scope.apply_delta(
                    &area.area_id,
                    -contribution,
                    CapacityChangeSource::ImportDeleted,
                )?;
            }
        }

        info!(import_id, barn = %existing.barn, "入栏记录已删除");
        Ok(())
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn get_import(&self, import_id: &str) -> ApiResult<ImportRecord> {
        self.import_repo
            .find_by_id(import_id)?
            .ok_or_else(|| ApiError::import_not_found(import_id))
    }

    /// 分页查询入栏记录（按入栏日期倒序）
    ///
    /// barn 过滤条件按区域名称忽略大小写解析
    pub fn list_imports(
        &self,
        filter: ImportFilter,
        pagination: Pagination,
    ) -> ApiResult<Page<ImportRecord>> {
        let filter = self.canonical_filter(filter)?;
        let items = self.import_repo.list(&filter, pagination)?;
        let total = self.import_repo.count(&filter)?;
        Ok(Page {
            items,
            total,
            page: pagination.page.max(1),
            page_size: pagination.limit() as u32,
        })
    }

    pub fn count_imports(&self, filter: ImportFilter) -> ApiResult<i64> {
        let filter = self.canonical_filter(filter)?;
        Ok(self.import_repo.count(&filter)?)
    }

    fn canonical_filter(&self, mut filter: ImportFilter) -> ApiResult<ImportFilter> {
        if let Some(barn) = filter.barn.as_deref() {
            if let Some(area) = self.area_repo.find_by_name_ci(barn)? {
                filter.barn = Some(area.name);
            }
        }
        Ok(filter)
    }
}
