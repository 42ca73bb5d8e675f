// ==========================================
// 血库管理系统 - 履约事务仓储
// ==========================================
// 红线1: 未交叉配血禁止发血 (状态机在事务内复核)
// 红线2: 库存不可透支 (可用量判定与预约创建在同一事务内)
// 红线3: 终态不可变更
// 红线: 每个履约操作 = 一个 SQLite 事务, 失败不留半写状态
// ==========================================

use crate::domain::action_log::{action_types, ActionLog};
use crate::domain::inventory::{BucketKey, Reservation};
use crate::domain::request::TransfusionRequest;
use crate::domain::types::{RequestStatus, ReservationStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{action_log_repo, inventory_repo, request_repo, reservation_repo};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// 履约事务仓储
/// 职责: 输血请求生命周期中所有跨表写入 (提交/配血预约/发血/取消)
pub struct FulfillmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl FulfillmentRepository {
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

    /// 提交输血请求
    ///
    /// # 事务
    /// 请求插入 + 操作留痕
    pub fn submit_request(&self, request: &TransfusionRequest, actor: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            r#"
            INSERT INTO transfusion_requests (
                request_id, patient_id, blood_type, component, units_requested,
                urgency, status, indication, submitted_at, cross_matched_at,
                issued_at, cancelled_at, escalated_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, NULL, NULL, NULL, ?10)
            "#,
            params![
                request.request_id,
                request.patient_id,
                request.blood_type.to_db_str(),
                request.component.to_db_str(),
                request.units_requested,
                request.urgency.to_db_str(),
                request.status.to_db_str(),
                request.indication,
                request.submitted_at,
                request.updated_at,
            ],
        )?;

        let log = ActionLog::new(
            action_types::SUBMIT_REQUEST,
            actor,
            Some(serde_json::json!({
                "request_id": request.request_id,
                "patient_id": request.patient_id,
                "blood_type": request.blood_type,
                "component": request.component,
                "units_requested": request.units_requested,
                "urgency": request.urgency,
            })),
            request.indication.clone(),
            request.submitted_at,
        );
        action_log_repo::insert_tx(&tx, &log)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }

    /// 交叉配血: 可用量判定 + 预约占用 + 状态迁移 PENDING → CROSS_MATCHED
    ///
    /// # 事务
    /// 可用量计算、预约插入与请求状态更新在同一事务中完成,
    /// 并发配血不可能让同一份库存被许诺两次 (红线2)
    pub fn reserve_and_cross_match(
        &self,
        request_id: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<(TransfusionRequest, Reservation)> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let request = load_request_tx(&tx, request_id)?;
        ensure_transition(&request, RequestStatus::CrossMatched)?;

        let key = BucketKey::new(request.blood_type, request.component);
        let available = inventory_repo::available_units_tx(&tx, key, now.date_naive())?;
        if available < request.units_requested {
            return Err(RepositoryError::InsufficientStock {
                key: key.to_string(),
                requested: request.units_requested,
                available,
            });
        }

        let reservation = Reservation {
            reservation_id: uuid::Uuid::new_v4().to_string(),
            request_id: request.request_id.clone(),
            blood_type: request.blood_type,
            component: request.component,
            units: request.units_requested,
            status: ReservationStatus::Active,
            created_at: now,
            updated_at: now,
        };
        tx.execute(
            r#"
            INSERT INTO reservations (
                reservation_id, request_id, blood_type, component,
                units, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                reservation.reservation_id,
                reservation.request_id,
                reservation.blood_type.to_db_str(),
                reservation.component.to_db_str(),
                reservation.units,
                reservation.status.to_db_str(),
                now,
                now,
            ],
        )?;

        tx.execute(
            r#"
            UPDATE transfusion_requests
            SET status = ?2, cross_matched_at = ?3, updated_at = ?3
            WHERE request_id = ?1
            "#,
            params![request_id, RequestStatus::CrossMatched.to_db_str(), now],
        )?;

        let log = ActionLog::new(
            action_types::CROSS_MATCH,
            actor,
            Some(serde_json::json!({
                "request_id": request_id,
                "reservation_id": reservation.reservation_id,
                "units": reservation.units,
                "available_before": available,
            })),
            None,
            now,
        );
        action_log_repo::insert_tx(&tx, &log)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        debug!(request_id, reservation_id = %reservation.reservation_id, "交叉配血完成, 预约占用 {} 单位", reservation.units);

        let updated = TransfusionRequest {
            status: RequestStatus::CrossMatched,
            cross_matched_at: Some(now),
            updated_at: now,
            ..request
        };
        Ok((updated, reservation))
    }

    /// 发血: 预约提交 + 在库量扣减 (先到期先出) + 状态迁移 CROSS_MATCHED → ISSUED
    ///
    /// # 事务
    /// 预约校验、批次扣减、桶计数扣减与状态更新在同一事务中完成
    ///
    /// # 错误
    /// - InvalidStateTransition: 未配血或已终态 (红线1/红线3)
    /// - ReservedUnitExpired: 预约单位已被过期清扫判废
    /// - UnknownReservation: 无未决预约 (预约泄漏防护)
    pub fn commit_and_issue(
        &self,
        request_id: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<TransfusionRequest> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let request = load_request_tx(&tx, request_id)?;
        ensure_transition(&request, RequestStatus::Issued)?;

        let reservation = match reservation_repo::find_by_request_and_status_tx(
            &tx,
            request_id,
            ReservationStatus::Active,
        )? {
            Some(r) => r,
            None => {
                // 预约被过期清扫判废时, 发血必须以明确原因失败
                if let Some(expired) = reservation_repo::find_by_request_and_status_tx(
                    &tx,
                    request_id,
                    ReservationStatus::Expired,
                )? {
                    return Err(RepositoryError::ReservedUnitExpired {
                        reservation_id: expired.reservation_id,
                    });
                }
                return Err(RepositoryError::UnknownReservation {
                    request_id: request_id.to_string(),
                });
            }
        };

        let key = BucketKey::new(request.blood_type, request.component);
        let on_hand = inventory_repo::find_bucket_tx(&tx, key)?
            .map(|b| b.quantity_on_hand)
            .unwrap_or(0);
        if on_hand < reservation.units {
            return Err(RepositoryError::InsufficientStock {
                key: key.to_string(),
                requested: reservation.units,
                available: on_hand,
            });
        }

        tx.execute(
            r#"
            UPDATE inventory_buckets
            SET quantity_on_hand = quantity_on_hand - ?3, updated_at = ?4
            WHERE blood_type = ?1 AND component = ?2
            "#,
            params![
                key.blood_type.to_db_str(),
                key.component.to_db_str(),
                reservation.units,
                now,
            ],
        )?;

        decrement_lots_fefo_tx(&tx, key, reservation.units, now)?;
        inventory_repo::recompute_windows_tx(&tx, key, now.date_naive(), now)?;

        tx.execute(
            "UPDATE reservations SET status = ?2, updated_at = ?3 WHERE reservation_id = ?1",
            params![
                reservation.reservation_id,
                ReservationStatus::Committed.to_db_str(),
                now,
            ],
        )?;

        tx.execute(
            r#"
            UPDATE transfusion_requests
            SET status = ?2, issued_at = ?3, updated_at = ?3
            WHERE request_id = ?1
            "#,
            params![request_id, RequestStatus::Issued.to_db_str(), now],
        )?;

        let log = ActionLog::new(
            action_types::ISSUE_BLOOD,
            actor,
            Some(serde_json::json!({
                "request_id": request_id,
                "reservation_id": reservation.reservation_id,
                "units": reservation.units,
                "blood_type": key.blood_type,
                "component": key.component,
            })),
            None,
            now,
        );
        action_log_repo::insert_tx(&tx, &log)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        debug!(request_id, "发血完成, 扣减 {} 单位", reservation.units);

        let updated = TransfusionRequest {
            status: RequestStatus::Issued,
            issued_at: Some(now),
            updated_at: now,
            ..request
        };
        Ok(updated)
    }

    /// 取消请求: 预约释放 + 状态迁移 → CANCELLED
    ///
    /// # 事务
    /// 预约释放与状态更新在同一事务中完成 (预约泄漏防护:
    /// 取消已配血请求必须同时归还可用量)
    pub fn release_and_cancel(
        &self,
        request_id: &str,
        actor: &str,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<TransfusionRequest> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let request = load_request_tx(&tx, request_id)?;
        ensure_transition(&request, RequestStatus::Cancelled)?;

        // 只释放未决预约; 已判废 (EXPIRED) 的保持原状, 不参与可用量
        let released = tx.execute(
            r#"
            UPDATE reservations
            SET status = ?2, updated_at = ?3
            WHERE request_id = ?1 AND status = ?4
            "#,
            params![
                request_id,
                ReservationStatus::Released.to_db_str(),
                now,
                ReservationStatus::Active.to_db_str(),
            ],
        )?;

        tx.execute(
            r#"
            UPDATE transfusion_requests
            SET status = ?2, cancelled_at = ?3, updated_at = ?3
            WHERE request_id = ?1
            "#,
            params![request_id, RequestStatus::Cancelled.to_db_str(), now],
        )?;

        let log = ActionLog::new(
            action_types::CANCEL_REQUEST,
            actor,
            Some(serde_json::json!({
                "request_id": request_id,
                "released_reservations": released,
            })),
            reason,
            now,
        );
        action_log_repo::insert_tx(&tx, &log)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let updated = TransfusionRequest {
            status: RequestStatus::Cancelled,
            cancelled_at: Some(now),
            updated_at: now,
            ..request
        };
        Ok(updated)
    }
}

// ==========================================
// 事务内辅助函数
// ==========================================

/// 加载请求, 不存在时返回 NotFound
fn load_request_tx(conn: &Connection, request_id: &str) -> RepositoryResult<TransfusionRequest> {
    request_repo::find_by_id_tx(conn, request_id)?.ok_or_else(|| RepositoryError::NotFound {
        entity: "TransfusionRequest".to_string(),
        id: request_id.to_string(),
    })
}

/// 在事务内复核状态机迁移 (迁移表唯一口径见 RequestStatus::can_transition_to)
fn ensure_transition(request: &TransfusionRequest, to: RequestStatus) -> RepositoryResult<()> {
    if !request.status.can_transition_to(to) {
        return Err(RepositoryError::InvalidStateTransition {
            from: request.status.to_string(),
            to: to.to_string(),
        });
    }
    Ok(())
}

/// 先到期先出扣减献血批次
///
/// 未过期批次按效期升序扣减; 扣尽的批次直接删除。
/// 批次总量与桶计数允许少量漂移, 以桶计数为准, 不因批次不足而失败。
fn decrement_lots_fefo_tx(
    conn: &Connection,
    key: BucketKey,
    units: i64,
    now: DateTime<Utc>,
) -> rusqlite::Result<()> {
    let today = now.date_naive();
    let lots: Vec<(String, i64)> = {
        let mut stmt = conn.prepare(
            r#"
            SELECT lot_id, units_remaining FROM donation_lots
            WHERE blood_type = ?1 AND component = ?2
              AND expiry_date >= ?3 AND units_remaining > 0
            ORDER BY expiry_date ASC, lot_id ASC
            "#,
        )?;
        let rows = stmt.query_map(
            params![key.blood_type.to_db_str(), key.component.to_db_str(), today],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    let mut remaining = units;
    for (lot_id, lot_units) in lots {
        if remaining <= 0 {
            break;
        }
        let take = remaining.min(lot_units);
        if take == lot_units {
            conn.execute("DELETE FROM donation_lots WHERE lot_id = ?1", params![lot_id])?;
        } else {
            conn.execute(
                "UPDATE donation_lots SET units_remaining = units_remaining - ?2 WHERE lot_id = ?1",
                params![lot_id, take],
            )?;
        }
        remaining -= take;
    }
    Ok(())
}
