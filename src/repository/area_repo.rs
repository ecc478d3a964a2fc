// ==========================================
// 养殖场区域容量台账 - 区域数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: current_capacity 的写入接口仅 crate 内可见，只由 CapacityApi 调用
// ==========================================

use crate::domain::area::{normalize_area_name, Area, AreaFilter, AreaSort, Pagination};
use crate::domain::types::AreaStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_utils::{
    conversion_error, fmt_ts, like_pattern, now_ts, parse_ts, WhereBuilder,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const AREA_COLUMNS: &str = r#"
    area_id, name, max_capacity, current_capacity, status, staff_json, created_at, updated_at
"#;

// ==========================================
// AreaRepository - 区域仓储
// ==========================================

/// 区域仓储
/// 职责: 管理 area 表的 CRUD 操作
pub struct AreaRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AreaRepository {
    /// 从共享连接创建仓储实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Area> {
        let status_raw: String = row.get(4)?;
        let status = AreaStatus::parse(&status_raw)
            .ok_or_else(|| conversion_error(4, format!("未知区域状态: {}", status_raw)))?;

        let staff_raw: String = row.get(5)?;
        let staff: Vec<String> = serde_json::from_str(&staff_raw)
            .map_err(|e| conversion_error(5, format!("staff_json 解析失败: {}", e)))?;

        Ok(Area {
            area_id: row.get(0)?,
            name: row.get(1)?,
            max_capacity: row.get(2)?,
            current_capacity: row.get(3)?,
            status,
            staff,
            created_at: parse_ts(6, &row.get::<_, String>(6)?)?,
            updated_at: parse_ts(7, &row.get::<_, String>(7)?)?,
        })
    }

    fn staff_json(staff: &[String]) -> RepositoryResult<String> {
        serde_json::to_string(staff).map_err(|e| RepositoryError::FieldValueError {
            field: "staff".to_string(),
            message: e.to_string(),
        })
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入区域
    ///
    /// # 返回
    /// - Ok(area_id)
    /// - Err(UniqueConstraintViolation): 名称重复（忽略大小写）
    pub fn insert(&self, area: &Area) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO area (
                area_id, name, name_key, max_capacity, current_capacity, status, staff_json,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                area.area_id,
                area.name,
                normalize_area_name(&area.name),
                area.max_capacity,
                area.current_capacity,
                area.status.to_db_str(),
                Self::staff_json(&area.staff)?,
                fmt_ts(&area.created_at),
                fmt_ts(&area.updated_at),
            ],
        )?;
        Ok(area.area_id.clone())
    }

    /// 更新区域的非容量字段（状态 / 人员）
    ///
    /// 名称变更走 `rename_with_cascade`，容量变更走 crate 内部接口
    pub fn update_profile(
        &self,
        area_id: &str,
        status: Option<AreaStatus>,
        staff: Option<&[String]>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let staff_json = match staff {
            Some(s) => Some(Self::staff_json(s)?),
            None => None,
        };

        let rows = conn.execute(
            r#"
            UPDATE area
               SET status = COALESCE(?2, status),
                   staff_json = COALESCE(?3, staff_json),
                   updated_at = ?4
             WHERE area_id = ?1
            "#,
            params![
                area_id,
                status.map(|s| s.to_db_str()),
                staff_json,
                fmt_ts(&now_ts()),
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Area".to_string(),
                id: area_id.to_string(),
            });
        }
        Ok(())
    }

    /// 区域改名，并在同一事务内级联更新入栏记录的 barn 引用
    ///
    /// # 返回
    /// - Ok(usize): 被级联更新的入栏记录数
    pub fn rename_with_cascade(
        &self,
        area_id: &str,
        old_name: &str,
        new_name: &str,
    ) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let rows = tx.execute(
            "UPDATE area SET name = ?2, name_key = ?3, updated_at = ?4 WHERE area_id = ?1 AND name = ?5",
            params![
                area_id,
                new_name,
                normalize_area_name(new_name),
                fmt_ts(&now_ts()),
                old_name
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Area".to_string(),
                id: area_id.to_string(),
            });
        }

        let cascaded = tx.execute(
            "UPDATE import_record SET barn = ?2, updated_at = ?3 WHERE barn = ?1",
            params![old_name, new_name, fmt_ts(&now_ts())],
        )?;

        tx.commit()?;
        Ok(cascaded)
    }

    /// 删除区域（物理删除）
    ///
    /// # 返回
    /// - Ok(usize): 删除行数
    pub fn delete(&self, area_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute("DELETE FROM area WHERE area_id = ?1", params![area_id])?;
        Ok(rows)
    }

    // ==========================================
    // 容量写入（crate 内部）
    // ==========================================

    /// 比较并设置剩余容量（乐观并发）
    ///
    /// # 返回
    /// - Ok(()): 写入成功
    /// - Err(OptimisticLockFailure): 读到的 expected 已被其他写入改变
    /// - Err(NotFound): 区域不存在
    pub(crate) fn compare_and_set_capacity(
        &self,
        area_id: &str,
        expected: i64,
        new_capacity: i64,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE area
               SET current_capacity = ?3, updated_at = ?4
             WHERE area_id = ?1 AND current_capacity = ?2
            "#,
            params![area_id, expected, new_capacity, fmt_ts(&now_ts())],
        )?;

        if rows == 0 {
            return Err(Self::cas_failure(&conn, area_id, expected)?);
        }
        Ok(())
    }

    /// 比较并同时设置最大容量与剩余容量（区域扩缩容）
    pub(crate) fn compare_and_set_limits(
        &self,
        area_id: &str,
        expected_capacity: i64,
        new_max_capacity: i64,
        new_capacity: i64,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE area
               SET max_capacity = ?3, current_capacity = ?4, updated_at = ?5
             WHERE area_id = ?1 AND current_capacity = ?2
            "#,
            params![
                area_id,
                expected_capacity,
                new_max_capacity,
                new_capacity,
                fmt_ts(&now_ts())
            ],
        )?;

        if rows == 0 {
            return Err(Self::cas_failure(&conn, area_id, expected_capacity)?);
        }
        Ok(())
    }

    /// 判断 CAS 失败原因：记录不存在 or 计数已变化
    fn cas_failure(
        conn: &Connection,
        area_id: &str,
        expected: i64,
    ) -> RepositoryResult<RepositoryError> {
        let actual: Option<i64> = conn
            .query_row(
                "SELECT current_capacity FROM area WHERE area_id = ?1",
                params![area_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(match actual {
            Some(actual) => RepositoryError::OptimisticLockFailure {
                area_id: area_id.to_string(),
                expected,
                actual,
            },
            None => RepositoryError::NotFound {
                entity: "Area".to_string(),
                id: area_id.to_string(),
            },
        })
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 按ID查询
    pub fn find_by_id(&self, area_id: &str) -> RepositoryResult<Option<Area>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM area WHERE area_id = ?1", AREA_COLUMNS);
        let area = conn
            .query_row(&sql, params![area_id], Self::map_row)
            .optional()?;
        Ok(area)
    }

    /// 按名称查询（忽略大小写与首尾空白）
    pub fn find_by_name_ci(&self, name: &str) -> RepositoryResult<Option<Area>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM area WHERE name_key = ?1", AREA_COLUMNS);
        let area = conn
            .query_row(&sql, params![normalize_area_name(name)], Self::map_row)
            .optional()?;
        Ok(area)
    }

    /// 查询全部区域（按名称排序）
    pub fn list_all(&self) -> RepositoryResult<Vec<Area>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM area ORDER BY name", AREA_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let areas = stmt
            .query_map([], Self::map_row)?
            .collect::<rusqlite::Result<Vec<Area>>>()?;
        Ok(areas)
    }

    fn build_filter(filter: &AreaFilter) -> WhereBuilder {
        let mut wb = WhereBuilder::new();
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            wb.push(
                "name_key LIKE ? ESCAPE '\\'",
                vec![Value::Text(like_pattern(&normalize_area_name(search)))],
            );
        }
        if let Some(status) = filter.status {
            wb.push("status = ?", vec![Value::Text(status.to_db_str().to_string())]);
        }
        wb
    }

    /// 分页查询
    pub fn list(
        &self,
        filter: &AreaFilter,
        pagination: Pagination,
        sort: AreaSort,
    ) -> RepositoryResult<Vec<Area>> {
        let conn = self.get_conn()?;
        let wb = Self::build_filter(filter);
        let sql = format!(
            "SELECT {} FROM area{} ORDER BY {} {}, area_id LIMIT ? OFFSET ?",
            AREA_COLUMNS,
            wb.sql(),
            sort.field.column(),
            sort.order.to_sql(),
        );

        let mut stmt = conn.prepare(&sql)?;
        let values = wb.values_with_page(pagination.limit(), pagination.offset());
        let areas = stmt
            .query_map(params_from_iter(values.iter()), Self::map_row)?
            .collect::<rusqlite::Result<Vec<Area>>>()?;
        Ok(areas)
    }

    /// 计数
    pub fn count(&self, filter: &AreaFilter) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let wb = Self::build_filter(filter);
        let sql = format!("SELECT COUNT(*) FROM area{}", wb.sql());
        let count = conn.query_row(&sql, params_from_iter(wb.values().iter()), |row| {
            row.get(0)
        })?;
        Ok(count)
    }

    /// 按状态分组计数
    pub fn count_by_status(&self) -> RepositoryResult<Vec<(AreaStatus, i64)>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT status, COUNT(*) FROM area GROUP BY status ORDER BY status")?;
        let rows = stmt
            .query_map([], |row| {
                let raw: String = row.get(0)?;
                let status = AreaStatus::parse(&raw)
                    .ok_or_else(|| conversion_error(0, format!("未知区域状态: {}", raw)))?;
                Ok((status, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
