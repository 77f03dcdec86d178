// ==========================================
// 楼栋层物量引擎 - 层物量记录
// ==========================================
// FloorTrade: (层 × 工种分组) 的物量记录
// 缺失的工种/子指标视为 0，而不是错误
// ==========================================

use crate::domain::types::{TradeGroup, TradeMetric};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaQuantity {
    #[serde(default)]
    pub area_m2: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RebarQuantity {
    #[serde(default)]
    pub ton: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcreteQuantity {
    #[serde(default)]
    pub volume_m3: f64,
}

// ==========================================
// TradeQuantities - 工种物量（稀疏）
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeQuantities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gang_form: Option<AreaQuantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub al_form: Option<AreaQuantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formwork: Option<AreaQuantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strip_clean: Option<AreaQuantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rebar: Option<RebarQuantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concrete: Option<ConcreteQuantity>,
}

impl TradeQuantities {
    /// 读取指标值；缺失、负数或非有限值一律返回 0
    pub fn get(&self, metric: TradeMetric) -> f64 {
        let raw = match metric {
            TradeMetric::GangFormArea => self.gang_form.map(|q| q.area_m2),
            TradeMetric::AlFormArea => self.al_form.map(|q| q.area_m2),
            TradeMetric::FormworkArea => self.formwork.map(|q| q.area_m2),
            TradeMetric::StripCleanArea => self.strip_clean.map(|q| q.area_m2),
            TradeMetric::RebarTon => self.rebar.map(|q| q.ton),
            TradeMetric::ConcreteVolume => self.concrete.map(|q| q.volume_m3),
        };
        sanitize_quantity(raw.unwrap_or(0.0))
    }

    pub fn set(&mut self, metric: TradeMetric, value: f64) {
        let value = sanitize_quantity(value);
        match metric {
            TradeMetric::GangFormArea => self.gang_form = Some(AreaQuantity { area_m2: value }),
            TradeMetric::AlFormArea => self.al_form = Some(AreaQuantity { area_m2: value }),
            TradeMetric::FormworkArea => self.formwork = Some(AreaQuantity { area_m2: value }),
            TradeMetric::StripCleanArea => self.strip_clean = Some(AreaQuantity { area_m2: value }),
            TradeMetric::RebarTon => self.rebar = Some(RebarQuantity { ton: value }),
            TradeMetric::ConcreteVolume => {
                self.concrete = Some(ConcreteQuantity { volume_m3: value })
            }
        }
    }

    pub fn with(mut self, metric: TradeMetric, value: f64) -> Self {
        self.set(metric, value);
        self
    }

    /// 逐指标累加（用于楼栋汇总）
    pub fn accumulate(&mut self, other: &TradeQuantities) {
        for metric in TradeMetric::ALL {
            let added = other.get(metric);
            if added > 0.0 {
                self.set(metric, self.get(metric) + added);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        TradeMetric::ALL.iter().all(|m| self.get(*m) == 0.0)
    }
}

/// 物量值清洗：有限且非负
pub fn sanitize_quantity(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

// ==========================================
// FloorTrade - 层物量记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorTrade {
    pub id: String,
    pub floor_id: String,
    pub building_id: String,
    pub trade_group: TradeGroup,
    #[serde(default)]
    pub trades: TradeQuantities,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl FloorTrade {
    /// 新建物量记录（ID 随机生成）
    pub fn new(
        building_id: impl Into<String>,
        floor_id: impl Into<String>,
        trade_group: TradeGroup,
        trades: TradeQuantities,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            floor_id: floor_id.into(),
            building_id: building_id.into(),
            trade_group,
            trades,
            updated_at: Some(Utc::now()),
        }
    }

    pub fn value(&self, metric: TradeMetric) -> f64 {
        self.trades.get(metric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_metric_reads_zero() {
        let trades = TradeQuantities::default();
        for metric in TradeMetric::ALL {
            assert_eq!(trades.get(metric), 0.0);
        }
        assert!(trades.is_empty());
    }

    #[test]
    fn test_set_sanitizes_values() {
        let mut trades = TradeQuantities::default();
        trades.set(TradeMetric::RebarTon, -3.0);
        assert_eq!(trades.get(TradeMetric::RebarTon), 0.0);
        trades.set(TradeMetric::ConcreteVolume, f64::NAN);
        assert_eq!(trades.get(TradeMetric::ConcreteVolume), 0.0);
        trades.set(TradeMetric::GangFormArea, 120.5);
        assert_eq!(trades.get(TradeMetric::GangFormArea), 120.5);
    }

    #[test]
    fn test_accumulate() {
        let mut total = TradeQuantities::default().with(TradeMetric::RebarTon, 2.0);
        let other = TradeQuantities::default()
            .with(TradeMetric::RebarTon, 3.5)
            .with(TradeMetric::FormworkArea, 40.0);
        total.accumulate(&other);
        assert_eq!(total.get(TradeMetric::RebarTon), 5.5);
        assert_eq!(total.get(TradeMetric::FormworkArea), 40.0);
    }

    #[test]
    fn test_trades_json_shape() {
        let json = r#"{ "gangForm": { "areaM2": 310.0 }, "rebar": { "ton": 12.5 }, "concrete": { "volumeM3": 98.0 } }"#;
        let trades: TradeQuantities = serde_json::from_str(json).unwrap();
        assert_eq!(trades.get(TradeMetric::GangFormArea), 310.0);
        assert_eq!(trades.get(TradeMetric::RebarTon), 12.5);
        assert_eq!(trades.get(TradeMetric::ConcreteVolume), 98.0);
        assert_eq!(trades.get(TradeMetric::AlFormArea), 0.0);

        let back = serde_json::to_value(trades).unwrap();
        assert_eq!(back["stripClean"], serde_json::Value::Null);
        assert_eq!(back["concrete"]["volumeM3"], 98.0);
    }
}
