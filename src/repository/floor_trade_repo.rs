// ==========================================
// 楼栋层物量引擎 - 层物量仓储
// ==========================================
// 唯一键: (floor_id, trade_group)
// INSERT OR REPLACE: 同 ID 改挂到新层或同键新记录都替换旧行
// 物量明细以 JSON 存储
// ==========================================

use crate::domain::trade::FloorTrade;
use crate::domain::types::TradeGroup;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// FloorTradeRepository
// ==========================================
pub struct FloorTradeRepository {
    conn: Arc<Mutex<Connection>>,
}

impl FloorTradeRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn upsert(&self, trade: &FloorTrade) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        upsert_trade(&conn, trade)
    }

    pub fn delete(&self, floor_id: &str, trade_group: TradeGroup) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM floor_trade WHERE floor_id = ?1 AND trade_group = ?2",
            params![floor_id, trade_group.as_str()],
        )?;
        Ok(affected)
    }

    pub fn list_by_building(&self, building_id: &str) -> RepositoryResult<Vec<FloorTrade>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT trade_id, floor_id, building_id, trade_group, trades_json, updated_at
            FROM floor_trade
            WHERE building_id = ?1
            ORDER BY floor_id, trade_group
            "#,
        )?;
        let raw = stmt
            .query_map(params![building_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut trades = Vec::with_capacity(raw.len());
        for (id, floor_id, building_id, group, trades_json, updated_at) in raw {
            let Some(trade_group) = TradeGroup::parse(&group) else {
                tracing::warn!(trade_id = %id, trade_group = %group, "未知工种分组，跳过");
                continue;
            };
            trades.push(FloorTrade {
                id,
                floor_id,
                building_id,
                trade_group,
                trades: serde_json::from_str(&trades_json)?,
                updated_at: updated_at
                    .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
                    .map(|dt| dt.with_timezone(&chrono::Utc)),
            });
        }
        Ok(trades)
    }
}

/// 在给定连接（或事务）上写入一条物量
pub(crate) fn upsert_trade(conn: &Connection, trade: &FloorTrade) -> RepositoryResult<()> {
    let trades_json = serde_json::to_string(&trade.trades)?;
    conn.execute(
        r#"
        INSERT OR REPLACE INTO floor_trade (
            trade_id, floor_id, building_id, trade_group, trades_json, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            trade.id,
            trade.floor_id,
            trade.building_id,
            trade.trade_group.as_str(),
            trades_json,
            trade.updated_at.map(|dt| dt.to_rfc3339()),
        ],
    )?;
    Ok(())
}
