// ==========================================
// 养殖场区域容量台账 - 入栏记录仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: barn 按区域名称精确匹配（写入时已规范为区域存储名）
// ==========================================

use crate::domain::area::Pagination;
use crate::domain::import_record::{ImportFilter, ImportRecord};
use crate::domain::types::ImportStatus;
use crate::engine::capacity_calculator::OccupancySource;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_utils::{
    conversion_error, fmt_date, fmt_ts, like_pattern, parse_date, parse_ts, WhereBuilder,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const IMPORT_COLUMNS: &str = r#"
    import_id, import_date, supplier, breed, quantity, avg_weight, barn, status, notes,
    created_at, updated_at
"#;

// ==========================================
// ImportRecordRepository - 入栏记录仓储
// ==========================================
pub struct ImportRecordRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ImportRecordRepository {
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

    fn map_row(row: &Row<'_>) -> rusqlite::Result<ImportRecord> {
        let status_raw: String = row.get(7)?;
        let status = ImportStatus::parse(&status_raw)
            .ok_or_else(|| conversion_error(7, format!("未知入栏状态: {}", status_raw)))?;

        Ok(ImportRecord {
            import_id: row.get(0)?,
            import_date: parse_date(1, &row.get::<_, String>(1)?)?,
            supplier: row.get(2)?,
            breed: row.get(3)?,
            quantity: row.get(4)?,
            avg_weight: row.get(5)?,
            barn: row.get(6)?,
            status,
            notes: row.get(8)?,
            created_at: parse_ts(9, &row.get::<_, String>(9)?)?,
            updated_at: parse_ts(10, &row.get::<_, String>(10)?)?,
        })
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入入栏记录
    pub fn insert(&self, record: &ImportRecord) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO import_record (
                import_id, import_date, supplier, breed, quantity, avg_weight, barn, status,
                notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                record.import_id,
                fmt_date(&record.import_date),
                record.supplier,
                record.breed,
                record.quantity,
                record.avg_weight,
                record.barn,
                record.status.to_db_str(),
                record.notes,
                fmt_ts(&record.created_at),
                fmt_ts(&record.updated_at),
            ],
        )?;
        Ok(record.import_id.clone())
    }

    /// 整行更新（按 import_id）
    pub fn update(&self, record: &ImportRecord) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE import_record
               SET import_date = ?2, supplier = ?3, breed = ?4, quantity = ?5,
                   avg_weight = ?6, barn = ?7, status = ?8, notes = ?9, updated_at = ?10
             WHERE import_id = ?1
            "#,
            params![
                record.import_id,
                fmt_date(&record.import_date),
                record.supplier,
                record.breed,
                record.quantity,
                record.avg_weight,
                record.barn,
                record.status.to_db_str(),
                record.notes,
                fmt_ts(&record.updated_at),
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ImportRecord".to_string(),
                id: record.import_id.clone(),
            });
        }
        Ok(())
    }

    /// 删除入栏记录（物理删除）
    pub fn delete(&self, import_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM import_record WHERE import_id = ?1",
            params![import_id],
        )?;
        Ok(rows)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, import_id: &str) -> RepositoryResult<Option<ImportRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM import_record WHERE import_id = ?1",
            IMPORT_COLUMNS
        );
        let record = conn
            .query_row(&sql, params![import_id], Self::map_row)
            .optional()?;
        Ok(record)
    }

    /// 按区域名称与状态汇总数量
    ///
    /// 空结果集返回 0
    pub fn sum_quantity_by_area_and_status(
        &self,
        area_name: &str,
        status: ImportStatus,
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let sum: i64 = conn.query_row(
            "SELECT COALESCE(SUM(quantity), 0) FROM import_record WHERE barn = ?1 AND status = ?2",
            params![area_name, status.to_db_str()],
            |row| row.get(0),
        )?;
        Ok(sum)
    }

    /// 引用指定区域的记录数（任意状态）
    pub fn count_by_barn(&self, area_name: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM import_record WHERE barn = ?1",
            params![area_name],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn build_filter(filter: &ImportFilter) -> WhereBuilder {
        let mut wb = WhereBuilder::new();
        if let Some(barn) = filter.barn.as_deref() {
            wb.push("barn = ?", vec![Value::Text(barn.trim().to_string())]);
        }
        if let Some(status) = filter.status {
            wb.push("status = ?", vec![Value::Text(status.to_db_str().to_string())]);
        }
        if let Some(supplier) = filter.supplier.as_deref().filter(|s| !s.trim().is_empty()) {
            wb.push(
                "supplier LIKE ? ESCAPE '\\'",
                vec![Value::Text(like_pattern(supplier))],
            );
        }
        if let Some(from) = filter.date_from {
            wb.push("import_date >= ?", vec![Value::Text(fmt_date(&from))]);
        }
        if let Some(to) = filter.date_to {
            wb.push("import_date <= ?", vec![Value::Text(fmt_date(&to))]);
        }
        wb
    }

    /// 分页查询（按入栏日期倒序）
    pub fn list(
        &self,
        filter: &ImportFilter,
        pagination: Pagination,
    ) -> RepositoryResult<Vec<ImportRecord>> {
        let conn = self.get_conn()?;
        let wb = Self::build_filter(filter);
        let sql = format!(
            "SELECT {} FROM import_record{} ORDER BY import_date DESC, created_at DESC, import_id LIMIT ? OFFSET ?",
            IMPORT_COLUMNS,
            wb.sql()
        );
        let mut stmt = conn.prepare(&sql)?;
        let values = wb.values_with_page(pagination.limit(), pagination.offset());
        let records = stmt
            .query_map(params_from_iter(values.iter()), Self::map_row)?
            .collect::<rusqlite::Result<Vec<ImportRecord>>>()?;
        Ok(records)
    }

    pub fn count(&self, filter: &ImportFilter) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let wb = Self::build_filter(filter);
        let sql = format!("SELECT COUNT(*) FROM import_record{}", wb.sql());
        let count = conn.query_row(&sql, params_from_iter(wb.values().iter()), |row| {
            row.get(0)
        })?;
        Ok(count)
    }
}

// ==========================================
// OccupancySource 实现
// ==========================================
// 权威重算路径的数据来源：在栏记录数量汇总
impl OccupancySource for ImportRecordRepository {
    fn in_progress_quantity(&self, area_name: &str) -> RepositoryResult<i64> {
        self.sum_quantity_by_area_and_status(area_name, ImportStatus::InProgress)
    }
}
