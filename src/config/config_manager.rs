// ==========================================
// 楼栋层物量引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::engine_config::EngineConfig;
use crate::db::{configure_sqlite_connection, ensure_schema, open_sqlite_connection};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;
        ensure_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 对传入连接再次应用统一 PRAGMA（幂等）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            configure_sqlite_connection(&conn_guard)?;
            ensure_schema(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at) VALUES ('global', ?1, ?2, ?3)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = ?3",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        tracing::info!(key, value, "配置已更新");
        Ok(())
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 加载引擎配置（config_kv 覆写默认值，格式错误的值忽略）
    pub fn load_engine_config(&self) -> Result<EngineConfig, Box<dyn Error>> {
        let mut config = EngineConfig::default();

        let timings = &mut config.write_timings;
        self.override_parsed(config_keys::HEIGHT_DEBOUNCE_MS, &mut timings.height_debounce_ms)?;
        self.override_parsed(config_keys::QUANTITY_DEBOUNCE_MS, &mut timings.quantity_debounce_ms)?;
        self.override_parsed(
            config_keys::BASIC_INFO_AUTOSAVE_MS,
            &mut timings.basic_info_autosave_ms,
        )?;

        let equipment = &mut config.equipment;
        self.override_parsed(
            config_keys::EQUIPMENT_BASE_BLINDING_FOUNDATION,
            &mut equipment.blinding_foundation_base,
        )?;
        self.override_parsed(config_keys::EQUIPMENT_BASE_BASEMENT, &mut equipment.basement_base)?;
        self.override_parsed(config_keys::EQUIPMENT_BASE_SETTING, &mut equipment.setting_floor_base)?;
        self.override_parsed(config_keys::EQUIPMENT_BASE_STANDARD, &mut equipment.standard_floor_base)?;
        self.override_parsed(config_keys::EQUIPMENT_BASE_PENTHOUSE, &mut equipment.penthouse_base)?;
        self.override_parsed(config_keys::EQUIPMENT_MAX_UNITS, &mut equipment.max_equipment_units)?;
        self.override_parsed(
            config_keys::EQUIPMENT_WORKERS_PER_UNIT,
            &mut equipment.workers_per_unit,
        )?;

        self.override_parsed(config_keys::STRICT_REFERENCES, &mut config.strict_references)?;
        Ok(config)
    }

    fn override_parsed<T: FromStr>(&self, key: &str, target: &mut T) -> Result<(), Box<dyn Error>> {
        if let Some(raw) = self.get_global_config_value(key)? {
            match raw.trim().parse::<T>() {
                Ok(value) => *target = value,
                Err(_) => {
                    tracing::warn!(config_key = key, raw_value = %raw, "配置格式错误，使用默认值");
                }
            }
        }
        Ok(())
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 写入时序
    pub const HEIGHT_DEBOUNCE_MS: &str = "write/height_debounce_ms";
    pub const QUANTITY_DEBOUNCE_MS: &str = "write/quantity_debounce_ms";
    pub const BASIC_INFO_AUTOSAVE_MS: &str = "write/basic_info_autosave_ms";

    // 设备基准
    pub const EQUIPMENT_BASE_BLINDING_FOUNDATION: &str = "equipment/base_blinding_foundation";
    pub const EQUIPMENT_BASE_BASEMENT: &str = "equipment/base_basement";
    pub const EQUIPMENT_BASE_SETTING: &str = "equipment/base_setting_floor";
    pub const EQUIPMENT_BASE_STANDARD: &str = "equipment/base_standard_floor";
    pub const EQUIPMENT_BASE_PENTHOUSE: &str = "equipment/base_penthouse";
    pub const EQUIPMENT_MAX_UNITS: &str = "equipment/max_units";
    pub const EQUIPMENT_WORKERS_PER_UNIT: &str = "equipment/workers_per_unit";

    // 引用表达式
    pub const STRICT_REFERENCES: &str = "reference/strict";
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_manager() -> (NamedTempFile, ConfigManager) {
        let file = NamedTempFile::new().unwrap();
        let manager = ConfigManager::new(file.path().to_str().unwrap()).unwrap();
        (file, manager)
    }

    #[test]
    fn test_defaults_without_overrides() {
        let (_file, manager) = create_test_manager();
        assert_eq!(manager.load_engine_config().unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let (_file, manager) = create_test_manager();
        manager
            .set_config_value(config_keys::QUANTITY_DEBOUNCE_MS, "500")
            .unwrap();
        manager
            .set_config_value(config_keys::EQUIPMENT_BASE_STANDARD, "not-a-number")
            .unwrap();
        manager.set_config_value(config_keys::STRICT_REFERENCES, "true").unwrap();

        let config = manager.load_engine_config().unwrap();
        assert_eq!(config.write_timings.quantity_debounce_ms, 500);
        assert_eq!(config.equipment.standard_floor_base, 320.0);
        assert!(config.strict_references);

        let snapshot = manager.get_config_snapshot().unwrap();
        assert!(snapshot.contains("write/quantity_debounce_ms"));
    }
}
