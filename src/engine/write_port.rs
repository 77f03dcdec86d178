// ==========================================
// 楼栋层物量引擎 - 写入端口
// ==========================================
// 职责: 定义引擎产出的写入记录与持久化端口 trait
// 说明: 引擎层定义 trait，仓储层实现适配器（依赖倒置）
// ==========================================

use crate::domain::building::BuildingMeta;
use crate::domain::floor::Floor;
use crate::domain::trade::FloorTrade;
use crate::domain::types::TradeGroup;
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ==========================================
// 写入记录
// ==========================================

/// 一次待持久化的写入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum WriteRecord {
    BuildingMeta {
        building_id: String,
        name: String,
        meta: BuildingMeta,
    },
    Floor(Floor),
    FloorTrade(FloorTrade),
    DeleteFloor {
        building_id: String,
        floor_id: String,
    },
    DeleteFloorTrade {
        building_id: String,
        floor_id: String,
        trade_group: TradeGroup,
    },
}

/// 记录身份（写入合并的键）
///
/// 同一记录的更新与删除共用一个键，后到者覆盖先到者
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKey {
    Building(String),
    Floor(String),
    FloorTrade { floor_id: String, trade_group: TradeGroup },
}

impl WriteRecord {
    pub fn key(&self) -> RecordKey {
        match self {
            WriteRecord::BuildingMeta { building_id, .. } => RecordKey::Building(building_id.clone()),
            WriteRecord::Floor(floor) => RecordKey::Floor(floor.id.clone()),
            WriteRecord::DeleteFloor { floor_id, .. } => RecordKey::Floor(floor_id.clone()),
            WriteRecord::FloorTrade(trade) => RecordKey::FloorTrade {
                floor_id: trade.floor_id.clone(),
                trade_group: trade.trade_group,
            },
            WriteRecord::DeleteFloorTrade {
                floor_id,
                trade_group,
                ..
            } => RecordKey::FloorTrade {
                floor_id: floor_id.clone(),
                trade_group: *trade_group,
            },
        }
    }

    pub fn building_id(&self) -> &str {
        match self {
            WriteRecord::BuildingMeta { building_id, .. }
            | WriteRecord::DeleteFloor { building_id, .. }
            | WriteRecord::DeleteFloorTrade { building_id, .. } => building_id,
            WriteRecord::Floor(floor) => &floor.building_id,
            WriteRecord::FloorTrade(trade) => &trade.building_id,
        }
    }
}

// ==========================================
// 持久化端口 Trait
// ==========================================

/// 记录写入端口
///
/// 仓储层的 `SqliteRecordStore` 实现此 trait；测试可注入内存实现
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn write(&self, record: WriteRecord) -> RepositoryResult<()>;
}

/// 空实现（不持久化）
pub struct NoOpRecordSink;

#[async_trait]
impl RecordSink for NoOpRecordSink {
    async fn write(&self, record: WriteRecord) -> RepositoryResult<()> {
        tracing::trace!(key = ?record.key(), "NoOpRecordSink: 跳过写入");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trade::TradeQuantities;

    #[test]
    fn test_upsert_and_delete_share_key() {
        let trade = FloorTrade::new("BLD", "BLD-3F", TradeGroup::Apartment, TradeQuantities::default());
        let upsert = WriteRecord::FloorTrade(trade);
        let delete = WriteRecord::DeleteFloorTrade {
            building_id: "BLD".to_string(),
            floor_id: "BLD-3F".to_string(),
            trade_group: TradeGroup::Apartment,
        };
        assert_eq!(upsert.key(), delete.key());
        assert_eq!(upsert.building_id(), "BLD");
    }
}
