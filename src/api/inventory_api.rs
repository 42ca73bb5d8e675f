// ==========================================
// 血库管理系统 - 库存API
// ==========================================
// 职责: 库存看板查询、直接入库 (调拨) 与过期清扫的对外封装
// 说明: availableUnits 为派生值 (在库量 - 未决预约 - 未清扫过期)
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::inventory::{BucketKey, InventoryBucket};
use crate::domain::types::{BloodComponent, BloodType};
use crate::engine::events::{InventoryEvent, InventoryEventType, OptionalEventPublisher};
use crate::engine::expiry::ExpirySweeper;
use crate::repository::inventory_repo::{InventoryRepository, SweepReport};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

// ==========================================
// BucketView - 库存桶视图
// ==========================================
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketView {
    pub blood_type: BloodType,
    pub component: BloodComponent,
    pub quantity_on_hand: i64,
    /// 派生可用量
    pub available_units: i64,
    pub expiring_in_3_days: i64,
    pub expiring_in_7_days: i64,
    pub expired_count: i64,
    pub updated_at: DateTime<Utc>,
}

impl BucketView {
    fn from_bucket(bucket: InventoryBucket, available_units: i64) -> Self {
        Self {
            blood_type: bucket.blood_type,
            component: bucket.component,
            quantity_on_hand: bucket.quantity_on_hand,
            available_units,
            expiring_in_3_days: bucket.expiring_in_3_days,
            expiring_in_7_days: bucket.expiring_in_7_days,
            expired_count: bucket.expired_count,
            updated_at: bucket.updated_at,
        }
    }
}

// ==========================================
// InventoryApi - 库存API
// ==========================================
pub struct InventoryApi {
    inventory_repo: Arc<InventoryRepository>,
    sweeper: Arc<ExpirySweeper>,
    events: OptionalEventPublisher,
}

impl InventoryApi {
    pub fn new(
        inventory_repo: Arc<InventoryRepository>,
        sweeper: Arc<ExpirySweeper>,
        events: OptionalEventPublisher,
    ) -> Self {
        Self {
            inventory_repo,
            sweeper,
            events,
        }
    }

    /// 查询单个库存桶 (未知 key 返回全零桶, 不报错)
    pub fn get_bucket(&self, blood_type: &str, component: &str) -> ApiResult<BucketView> {
        let key = parse_key(blood_type, component)?;
        let now = Utc::now();
        let bucket = self.inventory_repo.get_bucket(key, now)?;
        let available = self.inventory_repo.available_units(key, now)?;
        Ok(BucketView::from_bucket(bucket, available))
    }

    /// 全库存快照 (看板)
    pub fn snapshot(&self) -> ApiResult<Vec<BucketView>> {
        let now = Utc::now();
        let buckets = self.inventory_repo.snapshot_all()?;
        let mut views = Vec::with_capacity(buckets.len());
        for bucket in buckets {
            let available = self.inventory_repo.available_units(bucket.key(), now)?;
            views.push(BucketView::from_bucket(bucket, available));
        }
        Ok(views)
    }

    /// 直接入库 (调拨/外采, 不关联献血者)
    pub fn record_stock_entry(
        &self,
        blood_type: &str,
        component: &str,
        units: i64,
        expiry_date: NaiveDate,
        actor: &str,
    ) -> ApiResult<String> {
        let key = parse_key(blood_type, component)?;
        let lot = self
            .inventory_repo
            .record_donation(key, units, expiry_date, None, actor, Utc::now())?;

        // 事件只服务于看板刷新, 发布失败不影响主流程
        let event = InventoryEvent::for_bucket(
            InventoryEventType::DonationRecorded,
            Some("InventoryApi".to_string()),
            key,
        );
        if let Err(e) = self.events.publish(event) {
            warn!("库存事件发布失败: {}", e);
        }
        Ok(lot.lot_id)
    }

    /// 过期清扫 (幂等)
    pub fn sweep_expirations(&self, actor: &str) -> ApiResult<SweepReport> {
        Ok(self.sweeper.sweep(actor, Utc::now())?)
    }
}

fn parse_key(blood_type: &str, component: &str) -> ApiResult<BucketKey> {
    let bt = BloodType::from_db_str(blood_type)
        .ok_or_else(|| ApiError::InvalidInput(format!("未知血型: {}", blood_type)))?;
    let comp = BloodComponent::from_db_str(component)
        .ok_or_else(|| ApiError::InvalidInput(format!("未知血液成分: {}", component)))?;
    Ok(BucketKey::new(bt, comp))
}
