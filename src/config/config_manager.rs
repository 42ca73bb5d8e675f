// ==========================================
// 血库管理系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::engine_config_trait::EngineConfigReader;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = crate::db::open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }
        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }
}

// ==========================================
// EngineConfigReader Trait 实现
// ==========================================
#[async_trait]
impl EngineConfigReader for ConfigManager {
    async fn get_escalation_sla_minutes(&self) -> Result<i64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::ESCALATION_SLA_MINUTES, "30")?;
        Ok(value.parse::<i64>().unwrap_or(30))
    }

    async fn get_donation_cooldown_days(&self) -> Result<i64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::DONATION_COOLDOWN_DAYS, "56")?;
        Ok(value.parse::<i64>().unwrap_or(56))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 升级提醒
    pub const ESCALATION_SLA_MINUTES: &str = "escalation_sla_minutes";

    // 献血间隔期
    pub const DONATION_COOLDOWN_DAYS: &str = "donation_cooldown_days";
}
