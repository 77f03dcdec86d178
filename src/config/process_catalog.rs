// ==========================================
// 楼栋层物量引擎 - 工序模块目录
// ==========================================
// 内置默认目录 + 文件导入（CSV / Excel）
// 列: category, cycle_days, seq, work_step, quantity_reference,
//     trade_metric, daily_productivity, equipment_base,
//     workers_per_unit, max_units
// ==========================================

use crate::config::engine_config::EquipmentDefaults;
use crate::domain::process::{
    EquipmentSpec, ProcessCatalog, ProcessCategory, ProcessItem, ProcessModule,
};
use crate::domain::types::TradeMetric;
use calamine::{open_workbook, Reader, Xlsx};
use csv::ReaderBuilder;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::Path;
use thiserror::Error;

// ==========================================
// 导入错误
// ==========================================
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("不支持的文件格式: {0}")]
    UnsupportedFormat(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("第 {row} 行缺少字段: {column}")]
    MissingField { row: usize, column: String },

    #[error("第 {row} 行字段 {column} 的值无效: {value}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("文件读取失败: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for CatalogError {
    fn from(err: csv::Error) -> Self {
        CatalogError::CsvParseError(err.to_string())
    }
}

type RawRecord = HashMap<String, String>;

// ==========================================
// 内置默认目录
// ==========================================

/// 内置工序目录（设备参数取自配置）
pub fn default_catalog(equipment: &EquipmentDefaults) -> ProcessCatalog {
    let area = |seq, step: &str, reference: &str, productivity| ProcessItem {
        seq,
        work_step: step.to_string(),
        quantity_reference: Some(reference.to_string()),
        trade_metric: None,
        daily_productivity: productivity,
        equipment: None,
    };
    let pour = |seq, step: &str, reference: &str, category| ProcessItem {
        seq,
        work_step: step.to_string(),
        quantity_reference: Some(reference.to_string()),
        trade_metric: None,
        daily_productivity: 0.0,
        equipment: Some(equipment.spec_for(category)),
    };

    use ProcessCategory::*;
    let modules = vec![
        ProcessModule {
            category: Blinding,
            cycle_days: 1,
            items: vec![pour(1, "버림 콘크리트 타설", "G6", Blinding)],
        },
        ProcessModule {
            category: Foundation,
            cycle_days: 3,
            items: vec![
                area(1, "기초 거푸집", "D7", 12.0),
                area(2, "기초 철근 배근", "F7", 2.0),
                pour(3, "기초 콘크리트 타설", "G7", Foundation),
            ],
        },
        ProcessModule {
            category: Basement,
            cycle_days: 10,
            items: vec![
                area(1, "지하층 형틀", "D8+D9", 10.0),
                area(2, "지하층 철근", "F8+F9", 1.5),
                pour(3, "지하층 콘크리트 타설", "G8+G9", Basement),
            ],
        },
        ProcessModule {
            category: SettingFloor,
            cycle_days: 10,
            items: vec![
                area(1, "갱폼 셋팅", "B11+B12", 20.0),
                area(2, "알폼 셋팅", "C11+C12", 15.0),
                area(3, "셋팅층 철근", "F11+F12", 1.5),
                pour(4, "셋팅층 콘크리트 타설", "G11+G12", SettingFloor),
            ],
        },
        ProcessModule {
            category: StandardFloor,
            cycle_days: 7,
            items: vec![
                area(1, "갱폼 인상", "B14", 25.0),
                area(2, "알폼 설치", "C14", 18.0),
                area(3, "해체 정리", "E14", 30.0),
                area(4, "기준층 철근", "F14", 1.8),
                pour(5, "기준층 콘크리트 타설", "G14", StandardFloor),
            ],
        },
        ProcessModule {
            category: Penthouse,
            cycle_days: 10,
            items: vec![
                area(1, "옥탑 형틀", "D26+D27+D28", 10.0),
                area(2, "옥탑 철근", "F26+F27+F28", 1.2),
                pour(3, "옥탑 콘크리트 타설", "G26+G27+G28", Penthouse),
            ],
        },
    ];
    ProcessCatalog { modules }
}

// ==========================================
// 文件导入
// ==========================================

/// 按扩展名选择解析器导入目录
pub fn load_catalog_file<P: AsRef<Path>>(path: P) -> Result<ProcessCatalog, CatalogError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(CatalogError::FileNotFound(path.display().to_string()));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let records = match ext.as_str() {
        "csv" => read_csv_records(path)?,
        "xlsx" => read_excel_records(path)?,
        _ => return Err(CatalogError::UnsupportedFormat(ext)),
    };
    let catalog = catalog_from_records(&records)?;
    tracing::info!(
        file = %path.display(),
        modules = catalog.modules.len(),
        "工序目录导入完成"
    );
    Ok(catalog)
}

fn read_csv_records(path: &Path) -> Result<Vec<RawRecord>, CatalogError> {
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        let row: RawRecord = record
            .iter()
            .enumerate()
            .filter_map(|(i, v)| headers.get(i).map(|h| (h.clone(), v.trim().to_string())))
            .collect();
        if row.values().all(|v| v.is_empty()) {
            continue;
        }
        records.push(row);
    }
    Ok(records)
}

fn read_excel_records(path: &Path) -> Result<Vec<RawRecord>, CatalogError> {
    let mut workbook: Xlsx<_> = open_workbook(path)
        .map_err(|e: calamine::XlsxError| CatalogError::ExcelParseError(e.to_string()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| CatalogError::ExcelParseError("Excel 文件无工作表".to_string()))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| CatalogError::ExcelParseError(e.to_string()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| CatalogError::ExcelParseError("Excel 文件无数据行".to_string()))?
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();

    let mut records = Vec::new();
    for data_row in rows {
        let row: RawRecord = data_row
            .iter()
            .enumerate()
            .filter_map(|(i, cell)| headers.get(i).map(|h| (h.clone(), cell.to_string().trim().to_string())))
            .collect();
        if row.values().all(|v| v.is_empty()) {
            continue;
        }
        records.push(row);
    }
    Ok(records)
}

/// 行记录 → 目录（按 类别 × 循环天数 分组，组内按 seq 排序）
pub fn catalog_from_records(records: &[RawRecord]) -> Result<ProcessCatalog, CatalogError> {
    let mut grouped: BTreeMap<(usize, u32), Vec<ProcessItem>> = BTreeMap::new();

    for (index, record) in records.iter().enumerate() {
        // 表头为第 1 行
        let row = index + 2;
        let category_raw = required(record, row, "category")?;
        let category = ProcessCategory::parse(category_raw).ok_or_else(|| invalid(row, "category", category_raw))?;
        let category_order = ProcessCategory::ALL
            .iter()
            .position(|c| *c == category)
            .unwrap_or(0);
        let cycle_days: u32 = parse_field(record, row, "cycle_days")?;

        let equipment = match optional(record, "equipment_base") {
            Some(raw) => {
                let base: f64 = raw.parse().map_err(|_| invalid(row, "equipment_base", raw))?;
                Some(EquipmentSpec {
                    equipment_calculation_base: base,
                    equipment_workers_per_unit: parse_optional(record, row, "workers_per_unit")?.unwrap_or(1.0),
                    max_equipment_units: parse_optional(record, row, "max_units")?.unwrap_or(1),
                })
            }
            None => None,
        };

        let trade_metric = match optional(record, "trade_metric") {
            Some(raw) => Some(parse_trade_metric(raw).ok_or_else(|| invalid(row, "trade_metric", raw))?),
            None => None,
        };

        let item = ProcessItem {
            seq: parse_field(record, row, "seq")?,
            work_step: required(record, row, "work_step")?.to_string(),
            quantity_reference: optional(record, "quantity_reference").map(str::to_string),
            trade_metric,
            daily_productivity: parse_optional(record, row, "daily_productivity")?.unwrap_or(0.0),
            equipment,
        };
        grouped.entry((category_order, cycle_days)).or_default().push(item);
    }

    let modules = grouped
        .into_iter()
        .map(|((order, cycle_days), mut items)| {
            items.sort_by_key(|i| i.seq);
            ProcessModule {
                category: ProcessCategory::ALL[order],
                cycle_days,
                items,
            }
        })
        .collect();
    Ok(ProcessCatalog { modules })
}

/// "rebar.ton" 或列字母 "F"
fn parse_trade_metric(raw: &str) -> Option<TradeMetric> {
    if let Some((trade, sub)) = raw.split_once('.') {
        return TradeMetric::from_keys(trade.trim(), sub.trim());
    }
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => TradeMetric::from_column(c.to_ascii_uppercase()),
        _ => None,
    }
}

fn optional<'r>(record: &'r RawRecord, column: &str) -> Option<&'r str> {
    record
        .get(column)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn required<'r>(record: &'r RawRecord, row: usize, column: &str) -> Result<&'r str, CatalogError> {
    optional(record, column).ok_or_else(|| CatalogError::MissingField {
        row,
        column: column.to_string(),
    })
}

fn parse_field<T: std::str::FromStr>(record: &RawRecord, row: usize, column: &str) -> Result<T, CatalogError> {
    let raw = required(record, row, column)?;
    raw.parse().map_err(|_| invalid(row, column, raw))
}

fn parse_optional<T: std::str::FromStr>(
    record: &RawRecord,
    row: usize,
    column: &str,
) -> Result<Option<T>, CatalogError> {
    match optional(record, column) {
        Some(raw) => raw.parse().map(Some).map_err(|_| invalid(row, column, raw)),
        None => Ok(None),
    }
}

fn invalid(row: usize, column: &str, value: &str) -> CatalogError {
    CatalogError::InvalidValue {
        row,
        column: column.to_string(),
        value: value.to_string(),
    }
}
