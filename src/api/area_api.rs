// ==========================================
// 养殖场区域容量台账 - 区域管理 API
// ==========================================
// 职责: 区域的增删改查
// 红线: 区域名称唯一（忽略大小写与首尾空白）
// 红线: 剩余容量不在此处写入，扩缩容委托 CapacityScope
// ==========================================

use std::sync::{Arc, Mutex};

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::api::capacity_api::{CapacityApi, CapacityScope};
use crate::api::error::{ApiError, ApiResult};
use crate::config::config_manager::DEFAULT_LOCALE;
use crate::domain::area::{
    Area, AreaFilter, AreaPatch, AreaSort, NewArea, Page, Pagination, AREA_NAME_MAX_LEN,
};
use crate::i18n::t_with_args_in;
use crate::repository::sql_utils::now_ts;
use crate::repository::{AreaRepository, ImportRecordRepository};

// ==========================================
// AreaApi - 区域管理 API
// ==========================================
pub struct AreaApi {
    area_repo: Arc<AreaRepository>,
    import_repo: Arc<ImportRecordRepository>,
    capacity: Arc<CapacityApi>,
    locale: String,
    // 名称唯一性检查与写入之间串行化，冲突以业务错误返回而非 name_key 唯一约束错误
    name_lock: Mutex<()>,
}

impl AreaApi {
    /// 创建新的AreaApi实例
    pub fn new(
        area_repo: Arc<AreaRepository>,
        import_repo: Arc<ImportRecordRepository>,
        capacity: Arc<CapacityApi>,
    ) -> Self {
        Self {
            area_repo,
            import_repo,
            capacity,
            locale: DEFAULT_LOCALE.to_string(),
            name_lock: Mutex::new(()),
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    fn validate_name(name: &str) -> ApiResult<String> {
        let trimmed = name.trim();
        let len = trimmed.chars().count();
        if len == 0 || len > AREA_NAME_MAX_LEN {
            return Err(ApiError::InvalidInput(format!(
                "区域名称长度必须在 1..={} 之间，实际 {}",
                AREA_NAME_MAX_LEN, len
            )));
        }
        Ok(trimmed.to_string())
    }

    fn validate_max_capacity(max_capacity: i64) -> ApiResult<()> {
        if max_capacity <= 0 {
            return Err(ApiError::InvalidInput(format!(
                "最大容量必须大于 0，实际 {}",
                max_capacity
            )));
        }
        Ok(())
    }

    /// 人员ID去空白、去空串、去重（保持原顺序）
    fn normalize_staff(staff: Vec<String>) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(staff.len());
        for s in staff {
            let s = s.trim().to_string();
            if !s.is_empty() && !out.contains(&s) {
                out.push(s);
            }
        }
        out
    }

    /// 名称是否已被其他区域占用
    fn ensure_name_available(&self, name: &str, self_id: Option<&str>) -> ApiResult<()> {
        if let Some(other) = self.area_repo.find_by_name_ci(name)? {
            if Some(other.area_id.as_str()) != self_id {
                return Err(ApiError::BusinessRuleViolation(t_with_args_in(
                    &self.locale,
                    "area.name_taken",
                    &[("name", name)],
                )));
            }
        }
        Ok(())
    }

    fn lock_names(&self) -> ApiResult<std::sync::MutexGuard<'_, ()>> {
        self.name_lock
            .lock()
            .map_err(|e| ApiError::InternalError(format!("锁获取失败: {}", e)))
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 新建区域（剩余容量 = 最大容量，状态缺省为 EMPTY）
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub fn create_area(&self, request: NewArea) -> ApiResult<Area> {
        let name = Self::validate_name(&request.name)?;
        Self::validate_max_capacity(request.max_capacity)?;

        let ts = now_ts();
        let area = Area {
            area_id: Uuid::new_v4().to_string(),
            name,
            max_capacity: request.max_capacity,
            current_capacity: request.max_capacity,
            status: request.status.unwrap_or_default(),
            staff: Self::normalize_staff(request.staff),
            created_at: ts,
            updated_at: ts,
        };

        let _names = self.lock_names()?;
        self.ensure_name_available(&area.name, None)?;
        self.area_repo.insert(&area)?;

        info!(area_id = %area.area_id, name = %area.name, max = area.max_capacity, "区域已创建");
        Ok(area)
    }

    /// 编辑区域
    ///
    /// - 改名: 唯一性检查 + 级联更新入栏记录
    /// - 最大容量: 经容量作用域扩缩容，不得低于台账存栏数
    ///
    /// 业务规则检查全部在首次写入前完成，任一项被拒绝时区域保持原样
    #[instrument(skip(self, patch))]
    pub fn update_area(&self, area_id: &str, patch: AreaPatch) -> ApiResult<Area> {
        if patch.is_empty() {
            return self.get_area(area_id);
        }

        let new_name = match patch.name.as_deref() {
            Some(n) => Some(Self::validate_name(n)?),
            None => None,
        };
        if let Some(max) = patch.max_capacity {
            Self::validate_max_capacity(max)?;
        }

        let _names = match new_name {
            Some(_) => Some(self.lock_names()?),
            None => None,
        };
        let scope = self.capacity.lock_area(area_id);
        let current = scope.area(area_id)?;

        let rename_to = new_name.as_deref().filter(|n| *n != current.name);
        if let Some(name) = rename_to {
            self.ensure_name_available(name, Some(area_id))?;
        }

        // 扩缩容在写入前校验存栏，先于改名执行
        let resized = match patch.max_capacity.filter(|m| *m != current.max_capacity) {
            Some(max) => {
                scope.resize(area_id, max)?;
                true
            }
            None => false,
        };

        if let Some(name) = rename_to {
            match self
                .area_repo
                .rename_with_cascade(area_id, &current.name, name)
            {
                Ok(cascaded) => info!(
                    area_id,
                    from = %current.name,
                    to = %name,
                    cascaded,
                    "区域已改名"
                ),
                Err(e) => {
                    if resized {
                        self.restore_max_capacity(&scope, &current);
                    }
                    return Err(e.into());
                }
            }
        }

        if patch.status.is_some() || patch.staff.is_some() {
            let staff = patch.staff.map(Self::normalize_staff);
            self.area_repo
                .update_profile(area_id, patch.status, staff.as_deref())?;
        }

        scope.area(area_id)
    }

    /// 改名失败时撤回已完成的扩缩容
    fn restore_max_capacity(&self, scope: &CapacityScope<'_>, original: &Area) {
        if let Err(e) = scope.resize(&original.area_id, original.max_capacity) {
            warn!(
                area_id = %original.area_id,
                max_capacity = original.max_capacity,
                error = %e,
                "撤回扩缩容失败，等待对账修正"
            );
        }
    }

    /// 删除区域
    ///
    /// 仍有入栏记录引用时拒绝
    #[instrument(skip(self))]
    pub fn delete_area(&self, area_id: &str) -> ApiResult<()> {
        let scope = self.capacity.lock_area(area_id);
        let area = scope.area(area_id)?;

        let references = self.import_repo.count_by_barn(&area.name)?;
        if references > 0 {
            let count = references.to_string();
            return Err(ApiError::BusinessRuleViolation(t_with_args_in(
                &self.locale,
                "area.in_use",
                &[("name", area.name.as_str()), ("count", count.as_str())],
            )));
        }

        self.area_repo.delete(area_id)?;
        info!(area_id, name = %area.name, "区域已删除");
        Ok(())
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn get_area(&self, area_id: &str) -> ApiResult<Area> {
        self.area_repo
            .find_by_id(area_id)?
            .ok_or_else(|| ApiError::NotFound(format!("区域(id={})不存在", area_id)))
    }

    /// 按名称查找（忽略大小写与首尾空白）
    pub fn find_area_by_name(&self, name: &str) -> ApiResult<Option<Area>> {
        Ok(self.area_repo.find_by_name_ci(name)?)
    }

    pub fn list_areas(
        &self,
        filter: AreaFilter,
        pagination: Pagination,
        sort: AreaSort,
    ) -> ApiResult<Page<Area>> {
        let items = self.area_repo.list(&filter, pagination, sort)?;
        let total = self.area_repo.count(&filter)?;
        Ok(Page {
            items,
            total,
            page: pagination.page.max(1),
            page_size: pagination.limit() as u32,
        })
    }

    pub fn count_areas(&self, filter: AreaFilter) -> ApiResult<i64> {
        Ok(self.area_repo.count(&filter)?)
    }
}
