// ==========================================
// 楼栋层物量引擎 - 层分类器 (FloorClassifier)
// ==========================================
// 纯函数 reducer: 输入完整层集合，返回新的层集合 + 受影响的层
//
// 셋팅층级联（1~5 层被设为셋팅층时触发，仅作用于同一核心）:
// 1) 其上方、层号 ≤ 5、非셋팅층的地上层 → 기준층
// 2) 其下方（1 ≤ n < 셋팅층号）、非셋팅층的地上层 → 일반층
// 级联以不动点循环执行，直到没有分类变化
//
// 层高推断（层高编辑触发，以기준층层高为参照）:
// - 1 层: 2 层为기준층高且新层高不同 → 1 层为셋팅층
// - N>1 层改为非기준층高: 向上扫描，最上方连续的기준층/기준층高段的最低层 → 셋팅층
// - 任意层（含 1 层）改为기준층高: 自顶向下扫描，连续段下方紧邻层高不同 → 段的最低层 → 셋팅층
// 执行顺序: 写入层高 → 落定同核心已有셋팅층的级联 → 层高推断
//   → 推断出的晋升经分类 reducer（含级联）落地
// 推断出的셋팅층与已有셋팅층并存时记录 warn，不自动撤销已有分类
// ==========================================

use crate::domain::building::heights_equal;
use crate::domain::floor::Floor;
use crate::domain::types::FloorClass;

/// 级联规则作用的最高层号
pub const SETTING_CASCADE_MAX_FLOOR: i32 = 5;

/// 分类变更结果
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationOutcome {
    /// 变更后的完整层集合
    pub floors: Vec<Floor>,
    /// 受影响的层（目标层 + 所有分类/层高发生变化的层）
    pub affected: Vec<Floor>,
}

impl ClassificationOutcome {
    fn unchanged(floors: &[Floor]) -> Self {
        Self {
            floors: floors.to_vec(),
            affected: Vec::new(),
        }
    }
}

// ==========================================
// FloorClassifier
// ==========================================
pub struct FloorClassifier {
    // 无状态
}

impl FloorClassifier {
    pub fn new() -> Self {
        Self {}
    }

    /// 设置单层分类，并在需要时执行셋팅층级联
    ///
    /// 目标层不存在时返回原集合，affected 为空
    pub fn apply_classification(
        &self,
        floors: &[Floor],
        floor_id: &str,
        new_class: FloorClass,
    ) -> ClassificationOutcome {
        let Some(target_index) = floors.iter().position(|f| f.id == floor_id) else {
            tracing::debug!(floor_id, "分类目标层不存在，忽略");
            return ClassificationOutcome::unchanged(floors);
        };

        let mut next = floors.to_vec();
        next[target_index].floor_class = new_class;

        if new_class == FloorClass::Setting && triggers_cascade(&next[target_index]) {
            next = self.cascade_to_fixed_point(next, floor_id);
        }

        let affected = collect_affected(floors, &next, floor_id);
        tracing::debug!(
            floor_id,
            new_class = %new_class,
            affected = affected.len(),
            "层分类已更新"
        );
        ClassificationOutcome {
            floors: next,
            affected,
        }
    }

    /// 重复应用级联规则直到不再变化
    fn cascade_to_fixed_point(&self, mut floors: Vec<Floor>, trigger_id: &str) -> Vec<Floor> {
        loop {
            let next = self.cascade_step(&floors, trigger_id);
            if next == floors {
                return next;
            }
            floors = next;
        }
    }

    fn cascade_step(&self, floors: &[Floor], trigger_id: &str) -> Vec<Floor> {
        let Some(trigger) = floors.iter().find(|f| f.id == trigger_id) else {
            return floors.to_vec();
        };
        if trigger.floor_class != FloorClass::Setting || !triggers_cascade(trigger) {
            return floors.to_vec();
        }
        let core = trigger.core_index();
        let setting_number = trigger.floor_number;

        floors
            .iter()
            .map(|floor| {
                let mut floor = floor.clone();
                if floor.id == trigger_id
                    || !floor.is_ground_individual()
                    || floor.core_index() != core
                    || floor.floor_class == FloorClass::Setting
                {
                    return floor;
                }
                let n = floor.floor_number;
                if n > setting_number && n <= SETTING_CASCADE_MAX_FLOOR {
                    floor.floor_class = FloorClass::Standard;
                } else if n >= 1 && n < setting_number {
                    floor.floor_class = FloorClass::General;
                }
                floor
            })
            .collect()
    }

    /// 编辑层高，并按层高推断晋升셋팅층
    ///
    /// - `standard_height`: 楼栋기준층层高；None 时只写入层高
    pub fn edit_height(
        &self,
        floors: &[Floor],
        floor_id: &str,
        new_height: Option<f64>,
        standard_height: Option<f64>,
    ) -> ClassificationOutcome {
        let Some(target_index) = floors.iter().position(|f| f.id == floor_id) else {
            tracing::debug!(floor_id, "层高编辑目标层不存在，忽略");
            return ClassificationOutcome::unchanged(floors);
        };

        let mut edited = floors.to_vec();
        edited[target_index].height = new_height;
        let target = edited[target_index].clone();
        let edited = self.settle_cascades(edited, target.core_index());

        let promotion = match (standard_height, new_height) {
            (Some(standard), Some(height)) if target.is_ground_individual() => {
                self.height_promotion(&edited, &target, height, standard)
            }
            _ => None,
        };

        let next = match promotion {
            Some(promoted_id) => {
                tracing::debug!(floor_id, promoted = %promoted_id, "层高推断晋升셋팅층");
                let existing: Vec<&str> = core_column(&edited, target.core_index())
                    .into_iter()
                    .filter(|f| f.floor_class == FloorClass::Setting && f.id != promoted_id)
                    .map(|f| f.id.as_str())
                    .collect();
                if !existing.is_empty() {
                    tracing::warn!(
                        floor_id,
                        promoted = %promoted_id,
                        existing = ?existing,
                        "层高推断的셋팅층与已有셋팅층并存"
                    );
                }
                self.apply_classification(&edited, &promoted_id, FloorClass::Setting)
                    .floors
            }
            None => edited,
        };

        let affected = collect_affected(floors, &next, floor_id);
        ClassificationOutcome {
            floors: next,
            affected,
        }
    }

    /// 对同核心已有的셋팅층（1~5 层）按层号升序重放级联
    fn settle_cascades(&self, floors: Vec<Floor>, core: usize) -> Vec<Floor> {
        let triggers: Vec<String> = core_column(&floors, core)
            .into_iter()
            .filter(|f| f.floor_class == FloorClass::Setting && triggers_cascade(f))
            .map(|f| f.id.clone())
            .collect();
        triggers
            .iter()
            .fold(floors, |current, id| self.cascade_to_fixed_point(current, id))
    }

    fn height_promotion(
        &self,
        floors: &[Floor],
        target: &Floor,
        height: f64,
        standard: f64,
    ) -> Option<String> {
        let core = target.core_index();
        let column = core_column(floors, core);

        if target.floor_number == 1 && !heights_equal(height, standard) {
            let floor2 = column.iter().find(|f| f.floor_number == 2)?;
            let floor2_standard = floor2
                .height
                .map(|h| heights_equal(h, standard))
                .unwrap_or(false);
            if floor2_standard && target.floor_class != FloorClass::Setting {
                return Some(target.id.clone());
            }
            return None;
        }

        if !heights_equal(height, standard) {
            let above: Vec<&Floor> = column
                .iter()
                .copied()
                .filter(|f| f.floor_number > target.floor_number)
                .collect();
            let run = topmost_standard_run(&above, standard)?;
            let lowest = run.lowest;
            return (lowest.floor_class != FloorClass::Setting).then(|| lowest.id.clone());
        }

        let run = topmost_standard_run(&column, standard)?;
        let below = run.below?;
        let below_irregular = below
            .height
            .map(|h| !heights_equal(h, standard))
            .unwrap_or(false);
        (below_irregular && run.lowest.floor_class != FloorClass::Setting)
            .then(|| run.lowest.id.clone())
    }

    /// 层集合生成时推断某核心的셋팅층
    pub fn infer_setting_floor(
        &self,
        floors: &[Floor],
        core: usize,
        standard: f64,
    ) -> Option<String> {
        let column = core_column(floors, core);
        if column.iter().any(|f| f.floor_class == FloorClass::Setting) {
            return None;
        }

        let floor1 = column.iter().find(|f| f.floor_number == 1);
        let floor2 = column.iter().find(|f| f.floor_number == 2);
        if let (Some(floor1), Some(floor2)) = (floor1, floor2) {
            let floor1_irregular = floor1
                .height
                .map(|h| !heights_equal(h, standard))
                .unwrap_or(false);
            let floor2_standard = floor2
                .height
                .map(|h| heights_equal(h, standard))
                .unwrap_or(false);
            if floor1.floor_class == FloorClass::Standard && floor1_irregular && floor2_standard {
                return Some(floor1.id.clone());
            }
        }

        let run = topmost_standard_run(&column, standard)?;
        let below = run.below?;
        let below_irregular = below
            .height
            .map(|h| !heights_equal(h, standard))
            .unwrap_or(false);
        below_irregular.then(|| run.lowest.id.clone())
    }
}

impl Default for FloorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// 1~5 层的地上单层被设为셋팅층时触发级联
fn triggers_cascade(floor: &Floor) -> bool {
    floor.is_ground_individual()
        && floor.floor_number >= 1
        && floor.floor_number <= SETTING_CASCADE_MAX_FLOOR
}

/// 某核心的地上单层，按层号升序
fn core_column(floors: &[Floor], core: usize) -> Vec<&Floor> {
    let mut column: Vec<&Floor> = floors
        .iter()
        .filter(|f| f.is_ground_individual() && f.core_index() == core)
        .collect();
    column.sort_by_key(|f| f.floor_number);
    column
}

fn is_standard_run_member(floor: &Floor, standard: f64) -> bool {
    floor.floor_class == FloorClass::Standard
        && floor
            .height
            .map(|h| heights_equal(h, standard))
            .unwrap_or(false)
}

struct StandardRun<'a> {
    lowest: &'a Floor,
    /// 段下方紧邻的层（层号连续）
    below: Option<&'a Floor>,
}

/// 自顶向下寻找最上方的连续기준층段（层号连续、기준층且层高等于기준층高）
fn topmost_standard_run<'a>(column: &[&'a Floor], standard: f64) -> Option<StandardRun<'a>> {
    let mut iter = column.iter().rev().peekable();

    // 跳过顶部不满足条件的层
    while let Some(floor) = iter.peek() {
        if is_standard_run_member(floor, standard) {
            break;
        }
        iter.next();
    }

    let mut lowest: &'a Floor = *iter.next()?;
    for floor in iter {
        if floor.floor_number == lowest.floor_number - 1 && is_standard_run_member(floor, standard)
        {
            lowest = *floor;
            continue;
        }
        let below = (floor.floor_number == lowest.floor_number - 1).then_some(*floor);
        return Some(StandardRun { lowest, below });
    }
    Some(StandardRun {
        lowest,
        below: None,
    })
}

/// 受影响层: 目标层 + 分类或层高变化的层（保持集合顺序）
fn collect_affected(before: &[Floor], after: &[Floor], target_id: &str) -> Vec<Floor> {
    after
        .iter()
        .filter(|floor| {
            floor.id == target_id
                || before
                    .iter()
                    .find(|b| b.id == floor.id)
                    .map(|b| b.floor_class != floor.floor_class || b.height != floor.height)
                    .unwrap_or(true)
        })
        .cloned()
        .collect()
}
