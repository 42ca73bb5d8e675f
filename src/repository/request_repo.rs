// ==========================================
// 血库管理系统 - 输血请求数据仓储
// ==========================================
// 红线: Repository 不含业务判断; 状态迁移只允许经
//       fulfillment_repo 的事务路径写入
// ==========================================

use crate::domain::inventory::BucketKey;
use crate::domain::request::TransfusionRequest;
use crate::domain::types::{BloodComponent, BloodType, RequestStatus, Urgency};
use crate::repository::enum_column_error;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use std::sync::{Arc, Mutex};

// ==========================================
// RequestFilter - 列表查询过滤条件
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub urgency: Option<Urgency>,
    pub blood_type: Option<BloodType>,
    pub component: Option<BloodComponent>,
}

// ==========================================
// RequestRepository - 输血请求仓储
// ==========================================

/// 输血请求仓储
/// 职责: transfusion_requests 表的查询与非状态机字段更新
pub struct RequestRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RequestRepository {
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

    /// 按请求ID查询
    pub fn find_by_id(&self, request_id: &str) -> RepositoryResult<Option<TransfusionRequest>> {
        let conn = self.get_conn()?;
        Ok(find_by_id_tx(&conn, request_id)?)
    }

    /// 按过滤条件查询请求列表
    ///
    /// # 排序
    /// 紧急等级降序 → 提交时间升序 (先到先处理), 与待办队列口径一致
    pub fn list(&self, filter: RequestFilter) -> RepositoryResult<Vec<TransfusionRequest>> {
        let conn = self.get_conn()?;

        let mut sql = String::from(
            r#"
            SELECT request_id, patient_id, blood_type, component, units_requested,
                   urgency, status, indication, submitted_at, cross_matched_at,
                   issued_at, cancelled_at, escalated_at, updated_at
            FROM transfusion_requests
            WHERE 1 = 1
            "#,
        );
        let mut params_vec: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(status) = filter.status {
            params_vec.push(Box::new(status.to_db_str()));
            sql.push_str(&format!(" AND status = ?{}", params_vec.len()));
        }
        if let Some(urgency) = filter.urgency {
            params_vec.push(Box::new(urgency.to_db_str()));
            sql.push_str(&format!(" AND urgency = ?{}", params_vec.len()));
        }
        if let Some(blood_type) = filter.blood_type {
            params_vec.push(Box::new(blood_type.to_db_str()));
            sql.push_str(&format!(" AND blood_type = ?{}", params_vec.len()));
        }
        if let Some(component) = filter.component {
            params_vec.push(Box::new(component.to_db_str()));
            sql.push_str(&format!(" AND component = ?{}", params_vec.len()));
        }
        sql.push_str(
            r#"
            ORDER BY CASE urgency
                WHEN 'EMERGENCY' THEN 0
                WHEN 'URGENT' THEN 1
                ELSE 2
            END, submitted_at ASC, request_id ASC
            "#,
        );

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        let requests = stmt
            .query_map(params_refs.as_slice(), map_request_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(requests)
    }

    /// 查询待处理队列 (PENDING, 紧急优先, 同级先到先处理)
    ///
    /// # 参数
    /// - key: 指定库存桶时只返回该 (血型, 成分) 的待办; None 为全量
    pub fn list_pending(&self, key: Option<BucketKey>) -> RepositoryResult<Vec<TransfusionRequest>> {
        self.list(RequestFilter {
            status: Some(RequestStatus::Pending),
            blood_type: key.map(|k| k.blood_type),
            component: key.map(|k| k.component),
            ..RequestFilter::default()
        })
    }

    /// 标记升级通知时间 (每个请求最多升级一次)
    ///
    /// # 返回
    /// - Ok(true): 本次标记成功
    /// - Ok(false): 已标记过或请求不存在
    pub fn mark_escalated(&self, request_id: &str, now: DateTime<Utc>) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            r#"
            UPDATE transfusion_requests
            SET escalated_at = ?2, updated_at = ?2
            WHERE request_id = ?1 AND escalated_at IS NULL
            "#,
            params![request_id, now],
        )?;
        Ok(changed > 0)
    }
}

// ==========================================
// 事务内辅助函数 (供 fulfillment_repo 复用)
// ==========================================

/// 行映射: transfusion_requests
pub(crate) fn map_request_row(row: &Row) -> rusqlite::Result<TransfusionRequest> {
    let bt_str: String = row.get(2)?;
    let comp_str: String = row.get(3)?;
    let urgency_str: String = row.get(5)?;
    let status_str: String = row.get(6)?;
    Ok(TransfusionRequest {
        request_id: row.get(0)?,
        patient_id: row.get(1)?,
        blood_type: BloodType::from_db_str(&bt_str).ok_or_else(|| enum_column_error(2, &bt_str))?,
        component: BloodComponent::from_db_str(&comp_str)
            .ok_or_else(|| enum_column_error(3, &comp_str))?,
        units_requested: row.get(4)?,
        urgency: Urgency::from_db_str(&urgency_str)
            .ok_or_else(|| enum_column_error(5, &urgency_str))?,
        status: RequestStatus::from_db_str(&status_str)
            .ok_or_else(|| enum_column_error(6, &status_str))?,
        indication: row.get(7)?,
        submitted_at: row.get(8)?,
        cross_matched_at: row.get(9)?,
        issued_at: row.get(10)?,
        cancelled_at: row.get(11)?,
        escalated_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

/// 按请求ID查询 (可在事务内调用)
pub(crate) fn find_by_id_tx(
    conn: &Connection,
    request_id: &str,
) -> rusqlite::Result<Option<TransfusionRequest>> {
    conn.query_row(
        r#"
        SELECT request_id, patient_id, blood_type, component, units_requested,
               urgency, status, indication, submitted_at, cross_matched_at,
               issued_at, cancelled_at, escalated_at, updated_at
        FROM transfusion_requests
        WHERE request_id = ?1
        "#,
        params![request_id],
        map_request_row,
    )
    .optional()
}
