// ==========================================
// 血库管理系统 - 献血者API
// ==========================================
// 职责: 献血者档案管理与献血登记的对外封装
// 红线: 献血登记前必须通过合格性判定; 档案只停用不删除
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{action_types, ActionLog};
use crate::domain::donor::Donor;
use crate::domain::inventory::BucketKey;
use crate::domain::types::{BloodComponent, BloodType};
use crate::engine::eligibility::{DonorEligibilityEngine, EligibilityReport};
use crate::engine::events::{InventoryEvent, InventoryEventType, OptionalEventPublisher};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::donor_repo::DonorRepository;
use crate::repository::inventory_repo::InventoryRepository;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

// ==========================================
// DTO
// ==========================================

/// 献血者注册入参
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDonorDto {
    pub name: String,
    pub age: i32,
    pub gender: Option<String>,
    pub blood_type: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

// ==========================================
// DonorApi - 献血者API
// ==========================================
pub struct DonorApi {
    donor_repo: Arc<DonorRepository>,
    inventory_repo: Arc<InventoryRepository>,
    eligibility_engine: Arc<DonorEligibilityEngine>,
    action_log_repo: Arc<ActionLogRepository>,
    events: OptionalEventPublisher,
}

impl DonorApi {
    pub fn new(
        donor_repo: Arc<DonorRepository>,
        inventory_repo: Arc<InventoryRepository>,
        eligibility_engine: Arc<DonorEligibilityEngine>,
        action_log_repo: Arc<ActionLogRepository>,
        events: OptionalEventPublisher,
    ) -> Self {
        Self {
            donor_repo,
            inventory_repo,
            eligibility_engine,
            action_log_repo,
            events,
        }
    }

    /// 注册献血者档案
    ///
    /// # 校验
    /// - 姓名非空
    /// - 年龄 18~65 (法定献血年龄区间)
    pub fn register_donor(&self, dto: RegisterDonorDto, actor: &str) -> ApiResult<Donor> {
        if dto.name.trim().is_empty() {
            return Err(ApiError::InvalidInput("献血者姓名不能为空".to_string()));
        }
        if !(18..=65).contains(&dto.age) {
            return Err(ApiError::InvalidInput(format!(
                "献血者年龄必须在18~65之间: {}",
                dto.age
            )));
        }
        let blood_type = BloodType::from_db_str(&dto.blood_type)
            .ok_or_else(|| ApiError::InvalidInput(format!("未知血型: {}", dto.blood_type)))?;

        let now = Utc::now();
        let donor = Donor {
            donor_id: uuid::Uuid::new_v4().to_string(),
            name: dto.name.trim().to_string(),
            age: dto.age,
            gender: dto.gender,
            blood_type,
            phone: dto.phone,
            email: dto.email,
            address: dto.address,
            last_donation_date: None,
            total_donations: 0,
            deferred: false,
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.donor_repo.insert(&donor)?;

        self.log_action(
            action_types::REGISTER_DONOR,
            actor,
            serde_json::json!({
                "donor_id": donor.donor_id,
                "name": donor.name,
                "blood_type": donor.blood_type,
            }),
        );
        Ok(donor)
    }

    /// 查询单个献血者
    pub fn get_donor(&self, donor_id: &str) -> ApiResult<Donor> {
        self.donor_repo
            .find_by_id(donor_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Donor(id={})不存在", donor_id)))
    }

    /// 查询献血者列表
    pub fn list_donors(&self, active_only: bool) -> ApiResult<Vec<Donor>> {
        Ok(self.donor_repo.list(active_only)?)
    }

    /// 合格性判定 (派生值, 不落库)
    pub async fn check_eligibility(&self, donor_id: &str) -> ApiResult<EligibilityReport> {
        let donor = self.get_donor(donor_id)?;
        self.eligibility_engine
            .evaluate(&donor, Utc::now().date_naive())
            .await
            .map_err(|e| ApiError::InternalError(e.to_string()))
    }

    /// 献血登记: 合格性判定 → 批次入库 → 档案更新
    ///
    /// # 说明
    /// 批次入库 (含库存计数与留痕) 是事务化的主写入;
    /// 档案更新失败只告警不回滚, 库存以入库事务为准
    pub async fn record_donation(
        &self,
        donor_id: &str,
        component: &str,
        units: i64,
        expiry_date: NaiveDate,
        actor: &str,
    ) -> ApiResult<String> {
        let donor = self.get_donor(donor_id)?;
        let component = BloodComponent::from_db_str(component)
            .ok_or_else(|| ApiError::InvalidInput(format!("未知血液成分: {}", component)))?;

        let now = Utc::now();
        let today = now.date_naive();

        let report = self
            .eligibility_engine
            .evaluate(&donor, today)
            .await
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        if !report.eligible {
            return Err(ApiError::NotEligible {
                donor_id: donor.donor_id,
                reasons: report.reasons,
            });
        }

        let key = BucketKey::new(donor.blood_type, component);
        let lot = self.inventory_repo.record_donation(
            key,
            units,
            expiry_date,
            Some(&donor.donor_id),
            actor,
            now,
        )?;

        if let Err(e) = self.donor_repo.record_donation(&donor.donor_id, today, now) {
            warn!(donor_id = %donor.donor_id, "献血档案更新失败 (批次已入库): {}", e);
        }

        // 事件只服务于看板刷新, 发布失败不影响主流程
        let event = InventoryEvent::for_bucket(
            InventoryEventType::DonationRecorded,
            Some("DonorApi".to_string()),
            key,
        );
        if let Err(e) = self.events.publish(event) {
            warn!("库存事件发布失败: {}", e);
        }
        Ok(lot.lot_id)
    }

    /// 设置医学暂缓标志
    pub fn set_deferred(&self, donor_id: &str, deferred: bool, actor: &str) -> ApiResult<()> {
        self.donor_repo.set_deferred(donor_id, deferred, Utc::now())?;
        self.log_action(
            action_types::SET_DEFERRED,
            actor,
            serde_json::json!({ "donor_id": donor_id, "deferred": deferred }),
        );
        Ok(())
    }

    /// 停用献血者档案 (不物理删除)
    pub fn deactivate_donor(&self, donor_id: &str, actor: &str) -> ApiResult<()> {
        self.donor_repo.deactivate(donor_id, Utc::now())?;
        self.log_action(
            action_types::DEACTIVATE_DONOR,
            actor,
            serde_json::json!({ "donor_id": donor_id }),
        );
        Ok(())
    }

    /// 留痕失败只告警, 不影响主流程
    fn log_action(&self, action_type: &str, actor: &str, payload: serde_json::Value) {
        let log = ActionLog::new(action_type, actor, Some(payload), None, Utc::now());
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(action_type, "操作留痕写入失败: {}", e);
        }
    }
}
