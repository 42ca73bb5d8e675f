// ==========================================
// 血库管理系统 - 献血者数据仓储
// ==========================================
// 红线: 献血者档案只停用 (active=0), 不物理删除
// ==========================================

use crate::domain::donor::Donor;
use crate::domain::types::BloodType;
use crate::repository::enum_column_error;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

/// 献血者仓储
/// 职责: donors 表的CRUD操作
pub struct DonorRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DonorRepository {
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

    /// 插入献血者档案
    pub fn insert(&self, donor: &Donor) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO donors (
                donor_id, name, age, gender, blood_type, phone, email, address,
                last_donation_date, total_donations, deferred, active,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                donor.donor_id,
                donor.name,
                donor.age,
                donor.gender,
                donor.blood_type.to_db_str(),
                donor.phone,
                donor.email,
                donor.address,
                donor.last_donation_date,
                donor.total_donations,
                donor.deferred,
                donor.active,
                donor.created_at,
                donor.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 按献血者ID查询
    pub fn find_by_id(&self, donor_id: &str) -> RepositoryResult<Option<Donor>> {
        let conn = self.get_conn()?;
        let donor = conn
            .query_row(
                &format!("{} WHERE donor_id = ?1", SELECT_DONOR),
                params![donor_id],
                map_donor_row,
            )
            .optional()?;
        Ok(donor)
    }

    /// 查询献血者列表
    ///
    /// # 参数
    /// - active_only: 仅返回在册 (未停用) 的献血者
    pub fn list(&self, active_only: bool) -> RepositoryResult<Vec<Donor>> {
        let conn = self.get_conn()?;
        let sql = if active_only {
            format!("{} WHERE active = 1 ORDER BY name ASC, donor_id ASC", SELECT_DONOR)
        } else {
            format!("{} ORDER BY name ASC, donor_id ASC", SELECT_DONOR)
        };
        let mut stmt = conn.prepare(&sql)?;
        let donors = stmt
            .query_map([], map_donor_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(donors)
    }

    /// 记录一次献血后的档案更新 (最近献血日期 + 累计次数)
    pub fn record_donation(
        &self,
        donor_id: &str,
        donation_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            r#"
            UPDATE donors
            SET last_donation_date = ?2, total_donations = total_donations + 1, updated_at = ?3
            WHERE donor_id = ?1
            "#,
            params![donor_id, donation_date, now],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Donor".to_string(),
                id: donor_id.to_string(),
            });
        }
        Ok(())
    }

    /// 设置医学暂缓标志
    pub fn set_deferred(&self, donor_id: &str, deferred: bool, now: DateTime<Utc>) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            "UPDATE donors SET deferred = ?2, updated_at = ?3 WHERE donor_id = ?1",
            params![donor_id, deferred, now],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Donor".to_string(),
                id: donor_id.to_string(),
            });
        }
        Ok(())
    }

    /// 停用献血者档案 (不物理删除)
    pub fn deactivate(&self, donor_id: &str, now: DateTime<Utc>) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            "UPDATE donors SET active = 0, updated_at = ?2 WHERE donor_id = ?1",
            params![donor_id, now],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Donor".to_string(),
                id: donor_id.to_string(),
            });
        }
        Ok(())
    }
}

const SELECT_DONOR: &str = r#"
    SELECT donor_id, name, age, gender, blood_type, phone, email, address,
           last_donation_date, total_donations, deferred, active,
           created_at, updated_at
    FROM donors
"#;

/// 行映射: donors
fn map_donor_row(row: &Row) -> rusqlite::Result<Donor> {
    let bt_str: String = row.get(4)?;
    Ok(Donor {
        donor_id: row.get(0)?,
        name: row.get(1)?,
        age: row.get(2)?,
        gender: row.get(3)?,
        blood_type: BloodType::from_db_str(&bt_str).ok_or_else(|| enum_column_error(4, &bt_str))?,
        phone: row.get(5)?,
        email: row.get(6)?,
        address: row.get(7)?,
        last_donation_date: row.get(8)?,
        total_donations: row.get(9)?,
        deferred: row.get(10)?,
        active: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}
