// ==========================================
// 楼栋层物量引擎 - 楼栋仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::building::BuildingMeta;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

/// 楼栋行（基本信息）
#[derive(Debug, Clone, PartialEq)]
pub struct BuildingRow {
    pub building_id: String,
    pub name: String,
    pub meta: BuildingMeta,
}

// ==========================================
// BuildingRepository
// ==========================================
/// 职责: 管理 building 表（基本信息以 JSON 存储）
pub struct BuildingRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BuildingRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入或更新楼栋基本信息
    pub fn upsert(&self, building_id: &str, name: &str, meta: &BuildingMeta) -> RepositoryResult<()> {
        let meta_json = serde_json::to_string(meta)?;
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO building (building_id, name, meta_json, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(building_id) DO UPDATE SET
                name = excluded.name,
                meta_json = excluded.meta_json,
                updated_at = excluded.updated_at
            "#,
            params![building_id, name, meta_json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// 按 ID 查询
    pub fn find_by_id(&self, building_id: &str) -> RepositoryResult<Option<BuildingRow>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                "SELECT building_id, name, meta_json FROM building WHERE building_id = ?1",
                params![building_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((building_id, name, meta_json)) => Ok(Some(BuildingRow {
                building_id,
                name,
                meta: serde_json::from_str(&meta_json)?,
            })),
            None => Ok(None),
        }
    }

    /// 全部楼栋 ID（升序）
    pub fn list_ids(&self) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT building_id FROM building ORDER BY building_id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}
