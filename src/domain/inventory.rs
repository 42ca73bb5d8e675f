// ==========================================
// 血库管理系统 - 库存领域模型
// ==========================================
// 红线: inventory_buckets 是在库量的唯一事实层;
//       可用量永远是派生值, 不落库 (在库量 - 未决预约 - 未清扫过期)
// ==========================================

use crate::domain::types::{BloodComponent, BloodType, ReservationStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// BucketKey - 库存桶主键 (血型, 成分)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    pub blood_type: BloodType,
    pub component: BloodComponent,
}

impl BucketKey {
    pub fn new(blood_type: BloodType, component: BloodComponent) -> Self {
        Self {
            blood_type,
            component,
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.blood_type, self.component)
    }
}

// ==========================================
// InventoryBucket - 库存桶
// ==========================================
// 聚合计数, 不是物理血袋; 对齐 inventory_buckets 表
// 口径:
// - quantity_on_hand: 在库未过期单位数
// - expiring_in_3_days / expiring_in_7_days: 效期报告窗口 (均 ⊆ quantity_on_hand)
// - expired_count: 已清扫出库的过期单位数 (信息量, 不参与可用量)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryBucket {
    pub blood_type: BloodType,
    pub component: BloodComponent,
    pub quantity_on_hand: i64,
    pub expiring_in_3_days: i64,
    pub expiring_in_7_days: i64,
    pub expired_count: i64,
    pub updated_at: DateTime<Utc>,
}

impl InventoryBucket {
    /// 空桶（未知 key 查询的默认返回, 查询永不失败）
    pub fn empty(key: BucketKey, now: DateTime<Utc>) -> Self {
        Self {
            blood_type: key.blood_type,
            component: key.component,
            quantity_on_hand: 0,
            expiring_in_3_days: 0,
            expiring_in_7_days: 0,
            expired_count: 0,
            updated_at: now,
        }
    }

    pub fn key(&self) -> BucketKey {
        BucketKey::new(self.blood_type, self.component)
    }
}

// ==========================================
// DonationLot - 献血批次
// ==========================================
// 用途: 效期窗口统计与发血时的先到期先出扣减依据
// 说明: 不是逐袋追溯 (逐袋追溯为扩展点, 本核心不建模)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationLot {
    pub lot_id: String,
    pub blood_type: BloodType,
    pub component: BloodComponent,
    pub units_remaining: i64,
    pub expiry_date: NaiveDate,
    pub donor_id: Option<String>,
    pub donated_at: DateTime<Utc>,
}

// ==========================================
// Reservation - 库存预约
// ==========================================
// 交叉配血与发血之间的时间窗内, 对可用量的临时占用;
// 防止同一份稀缺库存被两个请求同时许诺
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: String,
    pub request_id: String,
    pub blood_type: BloodType,
    pub component: BloodComponent,
    pub units: i64,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_bucket_is_all_zero() {
        let key = BucketKey::new(BloodType::ONeg, BloodComponent::PackedRbc);
        let bucket = InventoryBucket::empty(key, Utc::now());
        assert_eq!(bucket.quantity_on_hand, 0);
        assert_eq!(bucket.expiring_in_3_days, 0);
        assert_eq!(bucket.expiring_in_7_days, 0);
        assert_eq!(bucket.expired_count, 0);
        assert_eq!(bucket.key(), key);
    }

    #[test]
    fn test_bucket_key_display() {
        let key = BucketKey::new(BloodType::AbNeg, BloodComponent::Platelets);
        assert_eq!(key.to_string(), "AB-/PLATELETS");
    }
}
