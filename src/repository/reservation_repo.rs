// ==========================================
// 血库管理系统 - 库存预约数据仓储
// ==========================================
// 红线: 预约的创建/提交/释放只允许经 fulfillment_repo 的
//       事务路径写入; 本仓储只读
// ==========================================

use crate::domain::inventory::Reservation;
use crate::domain::types::{BloodComponent, BloodType, ReservationStatus};
use crate::repository::enum_column_error;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

/// 库存预约仓储
/// 职责: reservations 表的查询
pub struct ReservationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReservationRepository {
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

    /// 查询请求关联的全部预约 (按创建时间升序)
    pub fn find_by_request(&self, request_id: &str) -> RepositoryResult<Vec<Reservation>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT reservation_id, request_id, blood_type, component,
                   units, status, created_at, updated_at
            FROM reservations
            WHERE request_id = ?1
            ORDER BY created_at ASC, reservation_id ASC
            "#,
        )?;
        let reservations = stmt
            .query_map(params![request_id], map_reservation_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reservations)
    }

    /// 查询请求当前未决的预约
    pub fn find_active_by_request(&self, request_id: &str) -> RepositoryResult<Option<Reservation>> {
        let conn = self.get_conn()?;
        Ok(find_by_request_and_status_tx(
            &conn,
            request_id,
            ReservationStatus::Active,
        )?)
    }
}

// ==========================================
// 事务内辅助函数 (供 fulfillment_repo / inventory_repo 复用)
// ==========================================

/// 行映射: reservations
pub(crate) fn map_reservation_row(row: &Row) -> rusqlite::Result<Reservation> {
    let bt_str: String = row.get(2)?;
    let comp_str: String = row.get(3)?;
    let status_str: String = row.get(5)?;
    Ok(Reservation {
        reservation_id: row.get(0)?,
        request_id: row.get(1)?,
        blood_type: BloodType::from_db_str(&bt_str).ok_or_else(|| enum_column_error(2, &bt_str))?,
        component: BloodComponent::from_db_str(&comp_str)
            .ok_or_else(|| enum_column_error(3, &comp_str))?,
        units: row.get(4)?,
        status: ReservationStatus::from_db_str(&status_str)
            .ok_or_else(|| enum_column_error(5, &status_str))?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// 按请求ID与状态查询预约 (可在事务内调用)
pub(crate) fn find_by_request_and_status_tx(
    conn: &Connection,
    request_id: &str,
    status: ReservationStatus,
) -> rusqlite::Result<Option<Reservation>> {
    conn.query_row(
        r#"
        SELECT reservation_id, request_id, blood_type, component,
               units, status, created_at, updated_at
        FROM reservations
        WHERE request_id = ?1 AND status = ?2
        ORDER BY created_at DESC
        LIMIT 1
        "#,
        params![request_id, status.to_db_str()],
        map_reservation_row,
    )
    .optional()
}
