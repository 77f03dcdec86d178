// ==========================================
// 楼栋层物量引擎 - 层仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::floor::Floor;
use crate::domain::types::{FloorClass, LevelType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// FloorRepository
// ==========================================
/// 职责: 管理 floor 表的 CRUD
pub struct FloorRepository {
    conn: Arc<Mutex<Connection>>,
}

impl FloorRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn upsert(&self, floor: &Floor) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        upsert_floor(&conn, floor)
    }

    /// 删除层（不存在时无操作）
    pub fn delete(&self, floor_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM floor WHERE floor_id = ?1", params![floor_id])?;
        Ok(affected)
    }

    /// 楼栋全部层（层号升序）
    pub fn list_by_building(&self, building_id: &str) -> RepositoryResult<Vec<Floor>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT floor_id, building_id, floor_label, floor_number, level_type, floor_class, height
            FROM floor
            WHERE building_id = ?1
            ORDER BY floor_number, floor_label
            "#,
        )?;
        let rows = stmt
            .query_map(params![building_id], map_floor_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// 在给定连接（或事务）上写入一层
pub(crate) fn upsert_floor(conn: &Connection, floor: &Floor) -> RepositoryResult<()> {
    conn.execute(
        r#"
        INSERT INTO floor (
            floor_id, building_id, floor_label, floor_number, level_type, floor_class, height
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(floor_id) DO UPDATE SET
            floor_label = excluded.floor_label,
            floor_number = excluded.floor_number,
            level_type = excluded.level_type,
            floor_class = excluded.floor_class,
            height = excluded.height
        "#,
        params![
            floor.id,
            floor.building_id,
            floor.floor_label,
            floor.floor_number,
            floor.level_type.as_str(),
            floor.floor_class.as_str(),
            floor.height,
        ],
    )?;
    Ok(())
}

fn map_floor_row(row: &Row<'_>) -> rusqlite::Result<Floor> {
    let level_type: String = row.get(4)?;
    let floor_class: String = row.get(5)?;
    Ok(Floor {
        id: row.get(0)?,
        building_id: row.get(1)?,
        floor_label: row.get(2)?,
        floor_number: row.get(3)?,
        level_type: LevelType::parse(&level_type).unwrap_or(LevelType::Ground),
        floor_class: FloorClass::parse(&floor_class).unwrap_or(FloorClass::Standard),
        height: row.get(6)?,
    })
}
