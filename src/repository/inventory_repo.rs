// ==========================================
// 血库管理系统 - 库存数据仓储
// ==========================================
// 红线2: 库存不可透支
//   可用量 = 在库量 - 未决预约 - 未清扫过期 (永远是派生值, 不落库)
// 红线: 清扫/入库等跨表写入必须在单个事务中完成
// ==========================================

use crate::domain::action_log::{action_types, ActionLog};
use crate::domain::inventory::{BucketKey, DonationLot, InventoryBucket};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{action_log_repo, enum_column_error};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

// ==========================================
// SweepReport - 过期清扫结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    /// 本次出库的过期单位总数
    pub swept_units: i64,
    /// 受影响的库存桶
    pub affected_buckets: Vec<BucketKey>,
    /// 因清扫侵占而判废的预约 (后续发血必须失败)
    pub expired_reservations: Vec<String>,
}

impl SweepReport {
    pub fn is_noop(&self) -> bool {
        self.swept_units == 0 && self.expired_reservations.is_empty()
    }
}

// ==========================================
// InventoryRepository - 库存仓储
// ==========================================

/// 库存仓储
/// 职责: inventory_buckets / donation_lots 表的读写与过期清扫
pub struct InventoryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl InventoryRepository {
    /// 创建新的库存仓储实例
    pub fn new(db_path: String) -> RepositoryResult<Self> {
        let conn = crate::db::open_sqlite_connection(&db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

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

    /// 查询单个库存桶
    ///
    /// # 说明
    /// - 未知 (血型, 成分) 返回全零空桶, 查询永不因"桶不存在"失败
    pub fn get_bucket(&self, key: BucketKey, now: DateTime<Utc>) -> RepositoryResult<InventoryBucket> {
        let conn = self.get_conn()?;
        let bucket = find_bucket_tx(&conn, key)?;
        Ok(bucket.unwrap_or_else(|| InventoryBucket::empty(key, now)))
    }

    /// 查询全部库存桶快照 (按血型/成分排序)
    pub fn snapshot_all(&self) -> RepositoryResult<Vec<InventoryBucket>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT blood_type, component, quantity_on_hand,
                   expiring_in_3_days, expiring_in_7_days, expired_count, updated_at
            FROM inventory_buckets
            ORDER BY blood_type, component
            "#,
        )?;
        let buckets = stmt
            .query_map([], map_bucket_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(buckets)
    }

    /// 计算可用量 (派生值)
    pub fn available_units(&self, key: BucketKey, now: DateTime<Utc>) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Ok(available_units_tx(&conn, key, now.date_naive())?)
    }

    /// 入库一个献血批次
    ///
    /// # 事务
    /// 批次插入 + 桶计数增加 + 效期窗口重算 + 操作留痕, 必须在事务中完成
    ///
    /// # 参数
    /// - units: 入库单位数 (必须为正)
    /// - expiry_date: 效期 (不得早于今日)
    pub fn record_donation(
        &self,
        key: BucketKey,
        units: i64,
        expiry_date: NaiveDate,
        donor_id: Option<&str>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<DonationLot> {
        if units <= 0 {
            return Err(RepositoryError::ValidationError(format!(
                "入库单位数必须为正: {}",
                units
            )));
        }
        let today = now.date_naive();
        if expiry_date < today {
            return Err(RepositoryError::ValidationError(format!(
                "效期不得早于今日: {}",
                expiry_date
            )));
        }

        let lot = DonationLot {
            lot_id: uuid::Uuid::new_v4().to_string(),
            blood_type: key.blood_type,
            component: key.component,
            units_remaining: units,
            expiry_date,
            donor_id: donor_id.map(|s| s.to_string()),
            donated_at: now,
        };

        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            r#"
            INSERT INTO donation_lots (
                lot_id, blood_type, component, units_remaining,
                expiry_date, donor_id, donated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                lot.lot_id,
                key.blood_type.to_db_str(),
                key.component.to_db_str(),
                units,
                expiry_date,
                lot.donor_id,
                now,
            ],
        )?;

        tx.execute(
            r#"
            INSERT INTO inventory_buckets (
                blood_type, component, quantity_on_hand,
                expiring_in_3_days, expiring_in_7_days, expired_count, updated_at
            ) VALUES (?1, ?2, ?3, 0, 0, 0, ?4)
            ON CONFLICT (blood_type, component) DO UPDATE SET
                quantity_on_hand = quantity_on_hand + excluded.quantity_on_hand,
                updated_at = excluded.updated_at
            "#,
            params![
                key.blood_type.to_db_str(),
                key.component.to_db_str(),
                units,
                now,
            ],
        )?;

        recompute_windows_tx(&tx, key, today, now)?;

        let log = ActionLog::new(
            action_types::RECORD_DONATION,
            actor,
            Some(serde_json::json!({
                "lot_id": lot.lot_id,
                "blood_type": key.blood_type,
                "component": key.component,
                "units": units,
                "expiry_date": expiry_date,
                "donor_id": lot.donor_id,
            })),
            None,
            now,
        );
        action_log_repo::insert_tx(&tx, &log)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(lot)
    }

    /// 过期清扫 (幂等)
    ///
    /// # 事务
    /// 在单个事务中完成:
    /// 1. 汇总已过期批次 (expiry_date < 今日) 并删除
    /// 2. 相应桶的在库量下调、expired_count 上调
    /// 3. 重算受影响桶的效期窗口
    /// 4. 预约侵占判废: 若剩余在库量不足以覆盖未决预约,
    ///    按创建时间从旧到新把预约标记为 EXPIRED
    ///
    /// 重复执行不会二次扣减 (过期批次已删除)。
    pub fn sweep_expirations(&self, actor: &str, now: DateTime<Utc>) -> RepositoryResult<SweepReport> {
        let today = now.date_naive();
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        // 1. 按桶汇总过期单位
        let expired: Vec<(BucketKey, i64)> = {
            let mut stmt = tx.prepare(
                r#"
                SELECT blood_type, component, SUM(units_remaining)
                FROM donation_lots
                WHERE expiry_date < ?1 AND units_remaining > 0
                GROUP BY blood_type, component
                "#,
            )?;
            let rows = stmt.query_map(params![today], |row| {
                let bt_str: String = row.get(0)?;
                let comp_str: String = row.get(1)?;
                let units: i64 = row.get(2)?;
                let blood_type = crate::domain::types::BloodType::from_db_str(&bt_str)
                    .ok_or_else(|| enum_column_error(0, &bt_str))?;
                let component = crate::domain::types::BloodComponent::from_db_str(&comp_str)
                    .ok_or_else(|| enum_column_error(1, &comp_str))?;
                Ok((BucketKey::new(blood_type, component), units))
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let mut report = SweepReport {
            swept_units: 0,
            affected_buckets: Vec::new(),
            expired_reservations: Vec::new(),
        };

        for (key, units) in &expired {
            tx.execute(
                r#"
                UPDATE inventory_buckets SET
                    quantity_on_hand = MAX(quantity_on_hand - ?3, 0),
                    expired_count = expired_count + ?3,
                    updated_at = ?4
                WHERE blood_type = ?1 AND component = ?2
                "#,
                params![
                    key.blood_type.to_db_str(),
                    key.component.to_db_str(),
                    units,
                    now,
                ],
            )?;
            report.swept_units += units;
            report.affected_buckets.push(*key);
        }

        // 2. 删除过期批次 (幂等性的来源: 删除后二次清扫无可汇总)
        tx.execute(
            "DELETE FROM donation_lots WHERE expiry_date < ?1",
            params![today],
        )?;

        // 3. 重算效期窗口 + 预约侵占判废
        for (key, _) in &expired {
            recompute_windows_tx(&tx, *key, today, now)?;
            let mut expired_ids = expire_encroached_reservations_tx(&tx, *key, now)?;
            report.expired_reservations.append(&mut expired_ids);
        }

        if !report.is_noop() {
            let log = ActionLog::new(
                action_types::SWEEP_EXPIRATIONS,
                actor,
                Some(serde_json::json!({
                    "swept_units": report.swept_units,
                    "affected_buckets": report.affected_buckets,
                    "expired_reservations": report.expired_reservations,
                })),
                None,
                now,
            );
            action_log_repo::insert_tx(&tx, &log)?;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(report)
    }
}

// ==========================================
// 事务内辅助函数 (供 fulfillment_repo 复用)
// ==========================================

/// 行映射: inventory_buckets
pub(crate) fn map_bucket_row(row: &Row) -> rusqlite::Result<InventoryBucket> {
    let bt_str: String = row.get(0)?;
    let comp_str: String = row.get(1)?;
    Ok(InventoryBucket {
        blood_type: crate::domain::types::BloodType::from_db_str(&bt_str)
            .ok_or_else(|| enum_column_error(0, &bt_str))?,
        component: crate::domain::types::BloodComponent::from_db_str(&comp_str)
            .ok_or_else(|| enum_column_error(1, &comp_str))?,
        quantity_on_hand: row.get(2)?,
        expiring_in_3_days: row.get(3)?,
        expiring_in_7_days: row.get(4)?,
        expired_count: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// 查询单个库存桶 (可在事务内调用)
pub(crate) fn find_bucket_tx(
    conn: &Connection,
    key: BucketKey,
) -> rusqlite::Result<Option<InventoryBucket>> {
    conn.query_row(
        r#"
        SELECT blood_type, component, quantity_on_hand,
               expiring_in_3_days, expiring_in_7_days, expired_count, updated_at
        FROM inventory_buckets
        WHERE blood_type = ?1 AND component = ?2
        "#,
        params![key.blood_type.to_db_str(), key.component.to_db_str()],
        map_bucket_row,
    )
    .optional()
}

/// 计算可用量 (红线2 的唯一口径)
///
/// 可用量 = 在库量 - 未决预约占用 - 已过期但尚未清扫出库的单位
pub(crate) fn available_units_tx(
    conn: &Connection,
    key: BucketKey,
    today: NaiveDate,
) -> rusqlite::Result<i64> {
    conn.query_row(
        r#"
        SELECT
            COALESCE((SELECT quantity_on_hand FROM inventory_buckets
                      WHERE blood_type = ?1 AND component = ?2), 0)
          - COALESCE((SELECT SUM(units) FROM reservations
                      WHERE blood_type = ?1 AND component = ?2 AND status = 'ACTIVE'), 0)
          - COALESCE((SELECT SUM(units_remaining) FROM donation_lots
                      WHERE blood_type = ?1 AND component = ?2 AND expiry_date < ?3), 0)
        "#,
        params![key.blood_type.to_db_str(), key.component.to_db_str(), today],
        |row| row.get(0),
    )
}

/// 重算指定桶的 3/7 日效期窗口
pub(crate) fn recompute_windows_tx(
    conn: &Connection,
    key: BucketKey,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> rusqlite::Result<()> {
    let in_3 = today + Duration::days(3);
    let in_7 = today + Duration::days(7);
    conn.execute(
        r#"
        UPDATE inventory_buckets SET
            expiring_in_3_days = COALESCE((
                SELECT SUM(units_remaining) FROM donation_lots
                WHERE blood_type = ?1 AND component = ?2
                  AND expiry_date >= ?3 AND expiry_date <= ?4), 0),
            expiring_in_7_days = COALESCE((
                SELECT SUM(units_remaining) FROM donation_lots
                WHERE blood_type = ?1 AND component = ?2
                  AND expiry_date >= ?3 AND expiry_date <= ?5), 0),
            updated_at = ?6
        WHERE blood_type = ?1 AND component = ?2
        "#,
        params![
            key.blood_type.to_db_str(),
            key.component.to_db_str(),
            today,
            in_3,
            in_7,
            now,
        ],
    )?;
    Ok(())
}

/// 预约侵占判废: 在库量不足以覆盖未决预约时, 从旧到新判废
fn expire_encroached_reservations_tx(
    conn: &Connection,
    key: BucketKey,
    now: DateTime<Utc>,
) -> rusqlite::Result<Vec<String>> {
    let on_hand: i64 = conn.query_row(
        r#"
        SELECT COALESCE(quantity_on_hand, 0) FROM inventory_buckets
        WHERE blood_type = ?1 AND component = ?2
        "#,
        params![key.blood_type.to_db_str(), key.component.to_db_str()],
        |row| row.get(0),
    )?;

    let active: Vec<(String, i64)> = {
        let mut stmt = conn.prepare(
            r#"
            SELECT reservation_id, units FROM reservations
            WHERE blood_type = ?1 AND component = ?2 AND status = 'ACTIVE'
            ORDER BY created_at ASC, reservation_id ASC
            "#,
        )?;
        let rows = stmt.query_map(
            params![key.blood_type.to_db_str(), key.component.to_db_str()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    let mut total: i64 = active.iter().map(|(_, u)| u).sum();
    let mut expired_ids = Vec::new();
    for (reservation_id, units) in active {
        if total <= on_hand {
            break;
        }
        conn.execute(
            "UPDATE reservations SET status = 'EXPIRED', updated_at = ?2 WHERE reservation_id = ?1",
            params![reservation_id, now],
        )?;
        total -= units;
        expired_ids.push(reservation_id);
    }
    Ok(expired_ids)
}
