// ==========================================
// 楼栋层物量引擎 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 建表（幂等）
// ==========================================

use rusqlite::Connection;
use std::path::PathBuf;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "FLOOR_QUANTITY_DB_PATH";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// foreign_keys / busy_timeout 需要每个连接单独配置
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

/// 建表（已存在时跳过）
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS building (
            building_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            meta_json TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS floor (
            floor_id TEXT PRIMARY KEY,
            building_id TEXT NOT NULL,
            floor_label TEXT NOT NULL,
            floor_number INTEGER NOT NULL,
            level_type TEXT NOT NULL,
            floor_class TEXT NOT NULL,
            height REAL
        );
        CREATE INDEX IF NOT EXISTS idx_floor_building ON floor(building_id);

        CREATE TABLE IF NOT EXISTS floor_trade (
            trade_id TEXT PRIMARY KEY,
            floor_id TEXT NOT NULL,
            building_id TEXT NOT NULL,
            trade_group TEXT NOT NULL,
            trades_json TEXT NOT NULL,
            updated_at TEXT,
            UNIQUE (floor_id, trade_group)
        );
        CREATE INDEX IF NOT EXISTS idx_floor_trade_building ON floor_trade(building_id);

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (scope_id, key)
        );
        "#,
    )
}

/// 默认数据库路径
///
/// 优先环境变量，其次用户数据目录，最后当前目录
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./floor_quantity.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("floor-quantity-engine");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("floor_quantity.db");
        }
    }
    path.to_string_lossy().to_string()
}
