// ==========================================
// 养殖场区域容量台账 - 容量变更日志仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
// 用途: 记录每次剩余容量写入（增量/重算/扩缩容），便于对账追溯
// ==========================================

use crate::domain::capacity::{CapacityChangeSource, CapacityLogEntry};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_utils::{conversion_error, fmt_ts, parse_ts};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

const LOG_COLUMNS: &str = r#"
    log_id, area_id, area_name, source, quantity_change, capacity_before, capacity_after,
    occupancy, created_at
"#;

pub struct CapacityLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CapacityLogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<CapacityLogEntry> {
        let source_raw: String = row.get(3)?;
        let source = CapacityChangeSource::parse(&source_raw)
            .ok_or_else(|| conversion_error(3, format!("未知变更来源: {}", source_raw)))?;

        Ok(CapacityLogEntry {
            log_id: row.get(0)?,
            area_id: row.get(1)?,
            area_name: row.get(2)?,
            source,
            quantity_change: row.get(4)?,
            capacity_before: row.get(5)?,
            capacity_after: row.get(6)?,
            occupancy: row.get(7)?,
            created_at: parse_ts(8, &row.get::<_, String>(8)?)?,
        })
    }

    /// 插入日志
    pub fn insert(&self, entry: &CapacityLogEntry) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO capacity_log (
                log_id, area_id, area_name, source, quantity_change,
                capacity_before, capacity_after, occupancy, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                entry.log_id,
                entry.area_id,
                entry.area_name,
                entry.source.to_db_str(),
                entry.quantity_change,
                entry.capacity_before,
                entry.capacity_after,
                entry.occupancy,
                fmt_ts(&entry.created_at),
            ],
        )?;
        Ok(entry.log_id.clone())
    }

    /// 查询指定区域最近的日志（新→旧）
    pub fn list_by_area(&self, area_id: &str, limit: i64) -> RepositoryResult<Vec<CapacityLogEntry>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM capacity_log WHERE area_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
            LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![area_id, limit.max(0)], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// 查询全部区域最近的日志（新→旧）
    pub fn list_recent(&self, limit: i64) -> RepositoryResult<Vec<CapacityLogEntry>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM capacity_log ORDER BY created_at DESC, rowid DESC LIMIT ?1",
            LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![limit.max(0)], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// 查询重算路径中发生修正的日志（漂移记录）
    pub fn list_recent_corrections(&self, limit: i64) -> RepositoryResult<Vec<CapacityLogEntry>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"SELECT {} FROM capacity_log
                WHERE source = 'RECOMPUTE' AND capacity_before <> capacity_after
                ORDER BY created_at DESC, rowid DESC LIMIT ?1"#,
            LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![limit.max(0)], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}
