// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、楼栋构建、写入端口替身
// ==========================================

#![allow(dead_code)]

use async_trait::async_trait;
use floor_quantity_engine::domain::{
    Building, BuildingMeta, Floor, FloorCount, FloorTrade, Heights, TradeQuantities,
};
use floor_quantity_engine::engine::{CoreGeometryResolver, RecordSink, WriteRecord};
use floor_quantity_engine::repository::{RepositoryError, RepositoryResult};
use floor_quantity_engine::{FloorClass, LevelType, TradeGroup, TradeMetric};
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = floor_quantity_engine::db::open_sqlite_connection(&db_path)?;
    floor_quantity_engine::db::ensure_schema(&conn)?;

    Ok((temp_file, db_path))
}

// ==========================================
// 楼栋构建器
// ==========================================

pub struct BuildingBuilder {
    id: String,
    meta: BuildingMeta,
}

impl BuildingBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            meta: BuildingMeta {
                core_count: 1,
                heights: Heights {
                    standard: Some(2850.0),
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }

    pub fn ground(mut self, ground: u32) -> Self {
        self.meta.floor_count.ground = ground;
        self
    }

    pub fn basement(mut self, basement: u32) -> Self {
        self.meta.floor_count.basement = basement;
        self
    }

    pub fn ph(mut self, ph: u32) -> Self {
        self.meta.floor_count.ph = ph;
        self
    }

    pub fn cores(mut self, core_ground_floors: Vec<u32>) -> Self {
        self.meta.core_count = core_ground_floors.len() as u32;
        self.meta.floor_count = FloorCount {
            ground: core_ground_floors.iter().copied().max().unwrap_or(0),
            core_ground_floors: Some(core_ground_floors),
            ..self.meta.floor_count
        };
        self
    }

    pub fn floor1_height(mut self, height: f64) -> Self {
        self.meta.heights.floor1 = Some(height);
        self
    }

    pub fn basic_info_locked(mut self) -> Self {
        self.meta.is_basic_info_locked = true;
        self
    }

    pub fn data_input_locked(mut self) -> Self {
        self.meta.is_data_input_locked = true;
        self
    }

    /// 只有元数据，没有层记录
    pub fn build_meta_only(self) -> Building {
        Building::new(self.id, "101동", self.meta)
    }

    /// 按元数据派生层集合
    pub fn build(self) -> Building {
        let mut building = self.build_meta_only();
        building.floors = CoreGeometryResolver::new().derive_floors(&building);
        building
    }
}

/// 紧凑范围记录（如 "2~14F"）
pub fn create_test_range_record(building_id: &str, id: &str, start: u32, end: u32) -> Floor {
    Floor {
        id: id.to_string(),
        building_id: building_id.to_string(),
        floor_label: format!("{}~{}F", start, end),
        floor_number: start as i32,
        level_type: LevelType::Ground,
        floor_class: FloorClass::Standard,
        height: Some(2850.0),
    }
}

pub fn create_test_trade(
    building_id: &str,
    floor_id: &str,
    trade_group: TradeGroup,
    metric: TradeMetric,
    value: f64,
) -> FloorTrade {
    FloorTrade::new(
        building_id,
        floor_id,
        trade_group,
        TradeQuantities::default().with(metric, value),
    )
}

pub fn class_of(building: &Building, label: &str) -> Option<FloorClass> {
    building
        .floors
        .iter()
        .find(|f| f.floor_label == label)
        .map(|f| f.floor_class)
}

// ==========================================
// 写入端口替身
// ==========================================

/// 记录所有写入；可切换为失败模式
#[derive(Default)]
pub struct RecordingSink {
    pub written: Mutex<Vec<WriteRecord>>,
    failing: AtomicBool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.set_failing(true);
        sink
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn written(&self) -> Vec<WriteRecord> {
        self.written.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordSink for RecordingSink {
    async fn write(&self, record: WriteRecord) -> RepositoryResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepositoryError::DatabaseConnectionError(
                "sink offline".to_string(),
            ));
        }
        self.written.lock().unwrap().push(record);
        Ok(())
    }
}
