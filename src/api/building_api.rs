// ==========================================
// 楼栋层物量引擎 - 楼栋 API
// ==========================================
// 职责: 持有楼栋快照，编排引擎调用，登记写入
// 锁定:
//   - isBasicInfoLocked: 拒绝层结构重建、分类、层高编辑、基本信息修改
//   - isDataInputLocked: 拒绝物量写入
// 重建: 先 flush 待写队列，失败则中止
// ==========================================

use crate::api::error::{ApiError, ApiResult, LockKind};
use crate::config::engine_config::EngineConfig;
use crate::domain::building::{Building, BuildingMeta};
use crate::domain::floor::{DisplayRow, Floor, FloorView, RangeView};
use crate::domain::process::{ProcessCatalog, ProcessItem};
use crate::domain::trade::{FloorTrade, TradeQuantities};
use crate::domain::types::{FloorClass, TradeGroup, TradeMetric};
use crate::engine::core_geometry::CoreGeometryResolver;
use crate::engine::floor_classifier::FloorClassifier;
use crate::engine::labor_estimator::{LaborEstimate, LaborEstimator};
use crate::engine::quantity_resolver::QuantityResolver;
use crate::engine::range_consolidator::{find_group_trade, individual_floor_id, RangeConsolidator};
use crate::engine::reference_pattern::{quantity_by_reference, try_quantity_by_reference};
use crate::engine::regeneration::plan_regeneration;
use crate::engine::write_port::WriteRecord;
use crate::i18n::t_with_args;
use crate::services::write_queue::WriteQueue;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// 物量写入目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuantityTarget {
    /// 单层（真实层 ID 或范围成员派生 ID）
    Floor(String),
    /// 显示范围行；floor_number 为 None 表示整行写入
    Range {
        range_id: String,
        floor_number: Option<u32>,
    },
    /// 楼栋级 버림/기초 记录
    Group,
}

/// 层结构重建结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerationReport {
    pub floor_count: usize,
    pub removed_floor_ids: Vec<String>,
    pub rekeyed_trades: usize,
    pub dropped_trades: usize,
}

// ==========================================
// BuildingApi - 楼栋 API
// ==========================================
pub struct BuildingApi {
    building: Building,
    queue: WriteQueue,
    config: EngineConfig,
    geometry: CoreGeometryResolver,
    classifier: FloorClassifier,
    consolidator: RangeConsolidator,
    estimator: LaborEstimator,
}

impl BuildingApi {
    pub fn new(building: Building, queue: WriteQueue, config: EngineConfig) -> Self {
        Self {
            building,
            queue,
            config,
            geometry: CoreGeometryResolver::new(),
            classifier: FloorClassifier::new(),
            consolidator: RangeConsolidator::new(),
            estimator: LaborEstimator::new(),
        }
    }

    pub fn building(&self) -> &Building {
        &self.building
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn queue(&self) -> &WriteQueue {
        &self.queue
    }

    // ==========================================
    // 层结构
    // ==========================================

    /// 按当前元数据派生层集合（不修改快照）
    pub fn derive_floors(&self) -> Vec<Floor> {
        self.geometry.derive_floors(&self.building)
    }

    /// 修改楼栋基本信息（整表自动保存防抖）
    ///
    /// 锁定时只允许修改锁定标志本身
    pub fn update_basic_info(&mut self, name: Option<String>, meta: BuildingMeta) -> ApiResult<()> {
        if self.building.meta.is_basic_info_locked {
            let mut unlocked_view = meta.clone();
            unlocked_view.is_basic_info_locked = self.building.meta.is_basic_info_locked;
            unlocked_view.is_data_input_locked = self.building.meta.is_data_input_locked;
            let name_changed = name.as_ref().is_some_and(|n| *n != self.building.name);
            if unlocked_view != self.building.meta || name_changed {
                return Err(ApiError::Locked {
                    lock: LockKind::BasicInfo,
                });
            }
        }

        if let Some(name) = name {
            self.building.name = name;
        }
        self.building.meta = meta;
        self.queue.schedule(
            self.meta_record(),
            self.config.write_timings.basic_info_policy(),
        );
        Ok(())
    }

    /// 设置锁定标志（立即写入）
    pub fn set_locks(&mut self, basic_info: bool, data_input: bool) {
        self.building.meta.is_basic_info_locked = basic_info;
        self.building.meta.is_data_input_locked = data_input;
        info!(building_id = %self.building.id, basic_info, data_input, "锁定标志更新");
        self.queue.schedule(
            self.meta_record(),
            self.config.write_timings.classification_policy(),
        );
    }

    /// 按当前元数据重建层结构
    ///
    /// 先 flush 旧层身份上的全部待写记录，失败则中止且快照不变
    ///
    /// 新层结构写入内存快照后再 flush 新记录；这一步失败时快照保持新层结构，
    /// 未写入的记录留在队列中，由下一次 flush 重试
    #[instrument(skip(self), fields(building_id = %self.building.id))]
    pub async fn regenerate_floors(&mut self) -> ApiResult<RegenerationReport> {
        self.ensure_unlocked(LockKind::BasicInfo)?;

        if let Err(e) = self.queue.flush().await {
            warn!(error = %e, "待写记录刷新失败，中止层结构重建");
            return Err(ApiError::RegenerationAborted(e.to_string()));
        }

        let plan = plan_regeneration(&self.building);
        let policy = self.config.write_timings.classification_policy();

        let mut records: Vec<WriteRecord> = plan
            .removed_floor_ids
            .iter()
            .map(|floor_id| WriteRecord::DeleteFloor {
                building_id: self.building.id.clone(),
                floor_id: floor_id.clone(),
            })
            .collect();
        records.extend(plan.floors.iter().cloned().map(WriteRecord::Floor));
        records.extend(plan.dropped_trades.iter().map(|t| WriteRecord::DeleteFloorTrade {
            building_id: self.building.id.clone(),
            floor_id: t.floor_id.clone(),
            trade_group: t.trade_group,
        }));
        let old_trades = std::mem::take(&mut self.building.floor_trades);
        records.extend(
            plan.floor_trades
                .iter()
                .filter(|t| !old_trades.iter().any(|o| o.id == t.id && o.floor_id == t.floor_id))
                .cloned()
                .map(WriteRecord::FloorTrade),
        );

        let report = RegenerationReport {
            floor_count: plan.floors.len(),
            removed_floor_ids: plan.removed_floor_ids,
            rekeyed_trades: plan.rekeyed,
            dropped_trades: plan.dropped_trades.len(),
        };

        self.building.floors = plan.floors;
        self.building.floor_trades = plan.floor_trades;
        self.queue.schedule_all(records, policy);
        if let Err(e) = self.queue.flush().await {
            warn!(
                error = %e,
                pending = self.queue.pending_count(),
                "新层结构已生效，待写记录保留在队列中等待重试"
            );
            return Err(e.into());
        }

        info!(
            floors = report.floor_count,
            rekeyed = report.rekeyed_trades,
            dropped = report.dropped_trades,
            "层结构重建完成"
        );
        Ok(report)
    }

    // ==========================================
    // 分类 / 层高
    // ==========================================

    /// 设置层分类（范围记录自动扇出），返回受影响的层
    pub fn apply_classification(&mut self, floor_id: &str, new_class: FloorClass) -> ApiResult<Vec<Floor>> {
        self.ensure_unlocked(LockKind::BasicInfo)?;
        let floor = self
            .building
            .find_floor(floor_id)
            .ok_or_else(|| ApiError::NotFound(format!("层(id={})不存在", floor_id)))?;
        if floor.is_range_record() {
            return self.apply_range_classification(floor_id, new_class);
        }

        let outcome = self
            .classifier
            .apply_classification(&self.building.floors, floor_id, new_class);
        self.building.floors = outcome.floors;
        self.queue.schedule_all(
            outcome.affected.iter().cloned().map(WriteRecord::Floor),
            self.config.write_timings.classification_policy(),
        );
        Ok(outcome.affected)
    }

    /// 设置显示范围行的分类，扇出到每个成员层
    pub fn apply_range_classification(&mut self, range_id: &str, new_class: FloorClass) -> ApiResult<Vec<Floor>> {
        self.ensure_unlocked(LockKind::BasicInfo)?;
        let range = self.find_range(range_id)?;

        let result = self
            .consolidator
            .apply_range_classification(&self.building.floors, &range, new_class);
        self.building.floors = result.outcome.floors;

        let policy = self.config.write_timings.classification_policy();
        let deletes = result
            .removed_floor_ids
            .iter()
            .map(|floor_id| WriteRecord::DeleteFloor {
                building_id: self.building.id.clone(),
                floor_id: floor_id.clone(),
            })
            .collect::<Vec<_>>();
        self.queue.schedule_all(deletes, policy);
        self.queue.schedule_all(
            result.outcome.affected.iter().cloned().map(WriteRecord::Floor),
            policy,
        );
        Ok(result.outcome.affected)
    }

    /// 编辑层高；推断出的셋팅층经分类 reducer 落地
    ///
    /// 目标层的写入按层高防抖，级联变化的层立即写入
    pub fn edit_floor_height(&mut self, floor_id: &str, height: Option<f64>) -> ApiResult<Vec<Floor>> {
        self.ensure_unlocked(LockKind::BasicInfo)?;
        if self.building.find_floor(floor_id).is_none() {
            return Err(ApiError::NotFound(format!("层(id={})不存在", floor_id)));
        }
        if let Some(h) = height {
            if !h.is_finite() || h <= 0.0 {
                return Err(ApiError::InvalidInput(format!("层高必须为正数: {}", h)));
            }
        }

        let standard = self.building.standard_height();
        let outcome = self
            .classifier
            .edit_height(&self.building.floors, floor_id, height, standard);
        self.building.floors = outcome.floors;

        let timings = &self.config.write_timings;
        for floor in &outcome.affected {
            let policy = if floor.id == floor_id {
                timings.height_policy()
            } else {
                timings.classification_policy()
            };
            self.queue.schedule(WriteRecord::Floor(floor.clone()), policy);
        }
        Ok(outcome.affected)
    }

    /// 显示行
    pub fn consolidate_for_display(&self) -> Vec<DisplayRow> {
        let layout = self.geometry.display_layout(&self.building);
        self.consolidator
            .consolidate_for_display(&self.building.floors, &layout)
    }

    // ==========================================
    // 物量
    // ==========================================

    /// 写入一个物量指标，返回新增/更新的物量记录
    pub fn write_quantity(
        &mut self,
        target: &QuantityTarget,
        trade_group: TradeGroup,
        metric: TradeMetric,
        value: f64,
    ) -> ApiResult<Vec<FloorTrade>> {
        self.ensure_unlocked(LockKind::DataInput)?;
        if !value.is_finite() || value < 0.0 {
            return Err(ApiError::InvalidInput(format!("物量必须为非负数: {}", value)));
        }

        let upserts = match target {
            QuantityTarget::Range {
                range_id,
                floor_number,
            } => {
                let range = self.find_range(range_id)?;
                if let Some(n) = floor_number {
                    if !range.contains(*n) {
                        return Err(ApiError::InvalidInput(format!(
                            "{}层不在范围 {} 内",
                            n, range.label
                        )));
                    }
                }
                self.consolidator
                    .plan_quantity_write(
                        &self.building.id,
                        &self.building.floor_trades,
                        &range,
                        *floor_number,
                        trade_group,
                        metric,
                        value,
                    )
                    .upserts
            }
            QuantityTarget::Floor(floor_id) => {
                if !self.is_known_floor_id(floor_id) {
                    return Err(ApiError::NotFound(format!("层(id={})不存在", floor_id)));
                }
                match self.range_member(floor_id) {
                    // 范围成员 ID 与范围成员写入同样扇出
                    Some((range, n)) => {
                        self.consolidator
                            .plan_quantity_write(
                                &self.building.id,
                                &self.building.floor_trades,
                                &range,
                                Some(n),
                                trade_group,
                                metric,
                                value,
                            )
                            .upserts
                    }
                    None => vec![self.single_upsert(floor_id, trade_group, metric, value)],
                }
            }
            QuantityTarget::Group => {
                if trade_group == TradeGroup::Apartment {
                    return Err(ApiError::InvalidInput(
                        "아파트 物量必须写入具体层".to_string(),
                    ));
                }
                let floor_id = format!("{}-{}", self.building.id, trade_group.as_str());
                vec![self.single_upsert(&floor_id, trade_group, metric, value)]
            }
        };

        for trade in &upserts {
            let position = self
                .building
                .floor_trades
                .iter()
                .position(|t| t.floor_id == trade.floor_id && t.trade_group == trade.trade_group);
            match position {
                Some(index) => self.building.floor_trades[index] = trade.clone(),
                None => self.building.floor_trades.push(trade.clone()),
            }
        }
        self.queue.schedule_all(
            upserts.iter().cloned().map(WriteRecord::FloorTrade),
            self.config.write_timings.quantity_policy(),
        );
        Ok(upserts)
    }

    /// 按标签解析层物量
    pub fn resolve_quantity(&self, floor_label: &str, metric: TradeMetric, range_floor_id: Option<&str>) -> f64 {
        QuantityResolver::new(&self.building).get_quantity_from_floor(floor_label, metric, range_floor_id)
    }

    /// 引用表达式求值（宽松模式）
    pub fn quantity_by_reference(&self, pattern: &str) -> f64 {
        quantity_by_reference(&self.building, pattern)
    }

    /// 引用表达式求值（严格模式）
    pub fn try_quantity_by_reference(&self, pattern: &str) -> ApiResult<f64> {
        try_quantity_by_reference(&self.building, pattern).map_err(|e| {
            ApiError::InvalidInput(format!(
                "{} ({})",
                t_with_args("reference.invalid", &[("pattern", pattern)]),
                e
            ))
        })
    }

    // ==========================================
    // 人工估算
    // ==========================================

    pub fn estimate_daily_workers(&self, item: &ProcessItem, total_quantity: f64) -> u32 {
        self.estimator.estimate_daily_workers(item, total_quantity)
    }

    /// 楼栋人工报告；严格模式下先校验全部引用表达式
    pub fn estimate_labor(&self, catalog: &ProcessCatalog) -> ApiResult<Vec<LaborEstimate>> {
        if self.config.strict_references {
            for item in catalog.modules.iter().flat_map(|m| m.items.iter()) {
                if let Some(pattern) = item.quantity_reference.as_deref() {
                    self.try_quantity_by_reference(pattern)?;
                }
            }
        }
        Ok(self.estimator.estimate_catalog(&self.building, catalog))
    }

    /// 发出全部待写记录并等待完成
    pub async fn flush_pending_writes(&self) -> ApiResult<()> {
        self.queue.flush().await?;
        Ok(())
    }

    // ==========================================
    // 内部工具
    // ==========================================

    fn ensure_unlocked(&self, lock: LockKind) -> ApiResult<()> {
        let locked = match lock {
            LockKind::BasicInfo => self.building.meta.is_basic_info_locked,
            LockKind::DataInput => self.building.meta.is_data_input_locked,
        };
        if locked {
            warn!(building_id = %self.building.id, lock = lock.as_str(), "锁定状态下拒绝写入");
            return Err(ApiError::Locked { lock });
        }
        Ok(())
    }

    fn meta_record(&self) -> WriteRecord {
        WriteRecord::BuildingMeta {
            building_id: self.building.id.clone(),
            name: self.building.name.clone(),
            meta: self.building.meta.clone(),
        }
    }

    fn find_range(&self, range_id: &str) -> ApiResult<RangeView> {
        self.consolidate_for_display()
            .into_iter()
            .find_map(|row| match row.view {
                FloorView::Range(range) if range.id == range_id => Some(range),
                _ => None,
            })
            .ok_or_else(|| ApiError::NotFound(format!("范围(id={})不存在", range_id)))
    }

    /// 真实层 ID 或范围记录成员的派生 ID
    fn is_known_floor_id(&self, floor_id: &str) -> bool {
        self.building.floors.iter().any(|f| match f.range_span() {
            Some((start, end)) => (start..=end).any(|n| individual_floor_id(&f.id, n) == floor_id),
            None => f.id == floor_id,
        })
    }

    /// 派生成员 ID 所属的显示范围及层号
    fn range_member(&self, floor_id: &str) -> Option<(RangeView, u32)> {
        self.building.floors.iter().find_map(|f| {
            let (start, end) = f.range_span()?;
            let n = (start..=end).find(|n| individual_floor_id(&f.id, *n) == floor_id)?;
            self.find_range(&f.id).ok().map(|range| (range, n))
        })
    }

    fn single_upsert(&self, floor_id: &str, trade_group: TradeGroup, metric: TradeMetric, value: f64) -> FloorTrade {
        match find_group_trade(&self.building.floor_trades, floor_id, trade_group) {
            Some(existing) => {
                let mut updated = existing.clone();
                updated.trades.set(metric, value);
                updated.updated_at = Some(chrono::Utc::now());
                updated
            }
            None => FloorTrade::new(
                &self.building.id,
                floor_id,
                trade_group,
                TradeQuantities::default().with(metric, value),
            ),
        }
    }
}
