// ==========================================
// 楼栋层物量引擎 - SQLite 记录存储
// ==========================================
// 职责: 写入端口 (RecordSink) 的 SQLite 适配器
//       楼栋快照的整体保存与加载
// ==========================================

use crate::db::{ensure_schema, open_sqlite_connection};
use crate::domain::building::Building;
use crate::engine::write_port::{RecordSink, WriteRecord};
use crate::repository::building_repo::BuildingRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::floor_repo::{upsert_floor, FloorRepository};
use crate::repository::floor_trade_repo::{upsert_trade, FloorTradeRepository};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};
use tracing::instrument;

pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
    buildings: BuildingRepository,
    floors: FloorRepository,
    trades: FloorTradeRepository,
}

impl SqliteRecordStore {
    /// 打开数据库并建表
    pub fn open(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        ensure_schema(&conn)?;
        Ok(Self::from_connection(Arc::new(Mutex::new(conn))))
    }

    /// 从已有连接创建（调用方负责建表）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            buildings: BuildingRepository::from_connection(Arc::clone(&conn)),
            floors: FloorRepository::from_connection(Arc::clone(&conn)),
            trades: FloorTradeRepository::from_connection(Arc::clone(&conn)),
            conn,
        }
    }

    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// 加载楼栋快照（基本信息 + 层 + 物量）
    #[instrument(skip(self))]
    pub fn load_building(&self, building_id: &str) -> RepositoryResult<Option<Building>> {
        let Some(row) = self.buildings.find_by_id(building_id)? else {
            return Ok(None);
        };
        let mut building = Building::new(row.building_id, row.name, row.meta);
        building.floors = self.floors.list_by_building(building_id)?;
        building.floor_trades = self.trades.list_by_building(building_id)?;
        tracing::debug!(
            floors = building.floors.len(),
            trades = building.floor_trades.len(),
            "楼栋快照加载完成"
        );
        Ok(Some(building))
    }

    /// 整体保存楼栋快照（事务内先清空再写入）
    #[instrument(skip(self, building), fields(building_id = %building.id))]
    pub fn save_building_snapshot(&self, building: &Building) -> RepositoryResult<()> {
        self.buildings
            .upsert(&building.id, &building.name, &building.meta)?;

        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM floor WHERE building_id = ?1", params![building.id])?;
        tx.execute(
            "DELETE FROM floor_trade WHERE building_id = ?1",
            params![building.id],
        )?;
        for floor in &building.floors {
            upsert_floor(&tx, floor)?;
        }
        for trade in &building.floor_trades {
            upsert_trade(&tx, trade)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// 同步执行一条写入
    pub fn apply(&self, record: &WriteRecord) -> RepositoryResult<()> {
        match record {
            WriteRecord::BuildingMeta {
                building_id,
                name,
                meta,
            } => self.buildings.upsert(building_id, name, meta),
            WriteRecord::Floor(floor) => self.floors.upsert(floor),
            WriteRecord::FloorTrade(trade) => self.trades.upsert(trade),
            WriteRecord::DeleteFloor { floor_id, .. } => self.floors.delete(floor_id).map(|_| ()),
            WriteRecord::DeleteFloorTrade {
                floor_id,
                trade_group,
                ..
            } => self.trades.delete(floor_id, *trade_group).map(|_| ()),
        }
    }
}

#[async_trait]
impl RecordSink for SqliteRecordStore {
    async fn write(&self, record: WriteRecord) -> RepositoryResult<()> {
        self.apply(&record)
    }
}
