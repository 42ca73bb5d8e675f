// ==========================================
// 血库管理系统 - 操作日志仓储
// ==========================================
// 红线: 所有写入操作必须留痕 (可解释性)
// ==========================================

use crate::domain::action_log::ActionLog;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

/// 操作日志仓储
/// 职责: action_log 表的写入与查询
pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入一条操作日志
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        insert_tx(&conn, log)?;
        Ok(())
    }

    /// 查询最近的操作日志 (按时间倒序)
    pub fn list_recent(&self, limit: i64) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT action_id, action_type, action_ts, actor, payload_json, detail
            FROM action_log
            ORDER BY action_ts DESC, action_id DESC
            LIMIT ?1
            "#,
        )?;
        let logs = stmt
            .query_map(params![limit], map_action_log_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    }

    /// 按操作类型查询日志 (按时间倒序)
    pub fn list_by_type(&self, action_type: &str, limit: i64) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT action_id, action_type, action_ts, actor, payload_json, detail
            FROM action_log
            WHERE action_type = ?1
            ORDER BY action_ts DESC, action_id DESC
            LIMIT ?2
            "#,
        )?;
        let logs = stmt
            .query_map(params![action_type, limit], map_action_log_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    }
}

/// 事务内插入 (供履约/库存事务复用, 保证留痕与业务写入同生共死)
pub(crate) fn insert_tx(conn: &Connection, log: &ActionLog) -> rusqlite::Result<()> {
    let payload_str = log
        .payload_json
        .as_ref()
        .map(|v| v.to_string());
    conn.execute(
        r#"
        INSERT INTO action_log (action_id, action_type, action_ts, actor, payload_json, detail)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            log.action_id,
            log.action_type,
            log.action_ts,
            log.actor,
            payload_str,
            log.detail,
        ],
    )?;
    Ok(())
}

/// 行映射: action_log
fn map_action_log_row(row: &Row) -> rusqlite::Result<ActionLog> {
    let payload_str: Option<String> = row.get(4)?;
    let payload_json = payload_str.and_then(|s| serde_json::from_str(&s).ok());
    Ok(ActionLog {
        action_id: row.get(0)?,
        action_type: row.get(1)?,
        action_ts: row.get(2)?,
        actor: row.get(3)?,
        payload_json,
        detail: row.get(5)?,
    })
}
