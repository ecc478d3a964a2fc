// ==========================================
// 养殖场区域容量台账 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 幂等建表（area / import_record / capacity_log / config_kv）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 幂等初始化 schema
///
/// 红线:
/// - area.current_capacity 在存储层也有 CHECK 约束 (0 <= current <= max)
/// - area.name 保留原始大小写；name_key 为规范化名称（去空白、Unicode 小写），唯一
/// - 忽略大小写的查找与搜索都走 name_key（SQLite NOCASE 只折叠 ASCII）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id TEXT PRIMARY KEY,
            scope_type TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(scope_type, scope_key)
        );

        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
        VALUES ('global', 'GLOBAL', 'global');

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS area (
            area_id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            name_key TEXT NOT NULL UNIQUE,
            max_capacity INTEGER NOT NULL CHECK (max_capacity > 0),
            current_capacity INTEGER NOT NULL
                CHECK (current_capacity >= 0 AND current_capacity <= max_capacity),
            status TEXT NOT NULL,
            staff_json TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_area_status ON area(status);

        CREATE TABLE IF NOT EXISTS import_record (
            import_id TEXT PRIMARY KEY,
            import_date TEXT NOT NULL,
            supplier TEXT NOT NULL,
            breed TEXT NOT NULL,
            quantity INTEGER NOT NULL CHECK (quantity >= 1),
            avg_weight REAL NOT NULL CHECK (avg_weight >= 0.1),
            barn TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('in-progress', 'completed')),
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_import_record_barn_status
            ON import_record(barn, status);
        CREATE INDEX IF NOT EXISTS idx_import_record_date ON import_record(import_date);

        CREATE TABLE IF NOT EXISTS capacity_log (
            log_id TEXT PRIMARY KEY,
            area_id TEXT NOT NULL,
            area_name TEXT NOT NULL,
            source TEXT NOT NULL,
            quantity_change INTEGER,
            capacity_before INTEGER NOT NULL,
            capacity_after INTEGER NOT NULL,
            occupancy INTEGER,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_capacity_log_area_ts
            ON capacity_log(area_id, created_at);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
