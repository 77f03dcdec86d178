// ==========================================
// 楼栋层物量引擎 - 命令行入口
// ==========================================
// 用法:
//   floor-quantity-engine <building.json> [catalog.csv|catalog.xlsx] [--db [path]]
//
// 输出楼栋的层显示行与人工估算报告
// 指定 --db 时从 config_kv 加载配置并保存楼栋快照
// ==========================================

use anyhow::{bail, Context};
use floor_quantity_engine::api::BuildingApi;
use floor_quantity_engine::config::{default_catalog, load_catalog_file, ConfigManager, EngineConfig};
use floor_quantity_engine::domain::{Building, FloorView};
use floor_quantity_engine::engine::{CoreGeometryResolver, NoOpRecordSink, RecordSink};
use floor_quantity_engine::repository::SqliteRecordStore;
use floor_quantity_engine::services::WriteQueue;
use floor_quantity_engine::{db, logging, VERSION};
use std::sync::Arc;

struct CliArgs {
    building_path: String,
    catalog_path: Option<String>,
    db_path: Option<String>,
}

fn parse_args() -> anyhow::Result<CliArgs> {
    let mut positional = Vec::new();
    let mut db_path = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--db" {
            // 省略路径时使用默认数据库位置
            db_path = Some(args.next().unwrap_or_else(db::get_default_db_path));
        } else {
            positional.push(arg);
        }
    }

    let mut positional = positional.into_iter();
    let Some(building_path) = positional.next() else {
        bail!("用法: floor-quantity-engine <building.json> [catalog.csv|xlsx] [--db [path]]");
    };
    Ok(CliArgs {
        building_path,
        catalog_path: positional.next(),
        db_path,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    tracing::info!(version = VERSION, "层物量引擎启动");

    let args = parse_args()?;
    let raw = std::fs::read_to_string(&args.building_path)
        .with_context(|| format!("无法读取楼栋文件: {}", args.building_path))?;
    let mut building: Building = serde_json::from_str(&raw).context("楼栋 JSON 格式错误")?;

    let mut store = None;
    let config = match &args.db_path {
        Some(db_path) => {
            let manager = ConfigManager::new(db_path).map_err(|e| anyhow::anyhow!(e.to_string()))?;
            let config = manager
                .load_engine_config()
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
            store = Some(Arc::new(SqliteRecordStore::open(db_path)?));
            config
        }
        None => EngineConfig::default(),
    };

    let catalog = match &args.catalog_path {
        Some(path) => load_catalog_file(path)?,
        None => default_catalog(&config.equipment),
    };

    if building.floors.is_empty() {
        building.floors = CoreGeometryResolver::new().derive_floors(&building);
        tracing::info!(floors = building.floors.len(), "按基本信息派生层集合");
    }

    let sink: Arc<dyn RecordSink> = match &store {
        Some(store) => {
            store.save_building_snapshot(&building)?;
            store.clone()
        }
        None => Arc::new(NoOpRecordSink),
    };
    let api = BuildingApi::new(building, WriteQueue::new(sink), config);

    println!("== {} ({}) ==", api.building().name, api.building().id);
    for row in api.consolidate_for_display() {
        let class = row.view.floor_class();
        let detail = match &row.view {
            FloorView::Real(floor) => floor
                .height
                .map(|h| format!("{:.0}mm", h))
                .unwrap_or_else(|| "-".to_string()),
            FloorView::Range(range) => format!("{} floors", range.members.len()),
            FloorView::Placeholder(_) => "(미생성)".to_string(),
        };
        println!("{:<16} {:<6} {}", row.view.label(), class.as_str(), detail);
    }

    println!();
    println!("== 인력 산출 ==");
    for estimate in api.estimate_labor(&catalog)? {
        println!(
            "{:<6} {:>3}일 {:>2}. {:<20} 물량 {:>10.2}  인원 {:>3}",
            estimate.category.as_str(),
            estimate.cycle_days,
            estimate.seq,
            estimate.work_step,
            estimate.total_quantity,
            estimate.daily_workers
        );
    }

    api.flush_pending_writes().await?;
    Ok(())
}
