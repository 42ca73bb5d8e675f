// ==========================================
// 血库管理系统 - 履约协调器
// ==========================================
// 职责: 输血请求全生命周期的编排 (提交/配血/发血/取消/升级提醒)
// 红线: 所有跨表写入委托给 fulfillment_repo 的事务路径,
//       协调器只做入参校验、排序与事件/提醒的外围编排
// ==========================================

use crate::config::engine_config_trait::EngineConfigReader;
use crate::domain::inventory::{BucketKey, Reservation};
use crate::domain::request::TransfusionRequest;
use crate::domain::types::{BloodComponent, BloodType, RequestStatus, Urgency};
use crate::engine::events::{
    InventoryEvent, InventoryEventType, NotificationSink, OptionalEventPublisher,
};
use crate::engine::priority::PrioritySorter;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::fulfillment_repo::FulfillmentRepository;
use crate::repository::request_repo::{RequestFilter, RequestRepository};
use chrono::{DateTime, Utc};
use std::error::Error;
use std::sync::Arc;
use tracing::{info, warn};

// ==========================================
// SubmitRequestInput - 提交请求入参
// ==========================================
#[derive(Debug, Clone)]
pub struct SubmitRequestInput {
    pub patient_id: String,
    pub blood_type: BloodType,
    pub component: BloodComponent,
    pub units_requested: i64,
    pub urgency: Urgency,
    pub indication: Option<String>,
}

// ==========================================
// FulfillmentCoordinator - 履约协调器
// ==========================================
pub struct FulfillmentCoordinator {
    fulfillment_repo: Arc<FulfillmentRepository>,
    request_repo: Arc<RequestRepository>,
    config: Arc<dyn EngineConfigReader>,
    notification_sink: Arc<dyn NotificationSink>,
    events: OptionalEventPublisher,
}

impl FulfillmentCoordinator {
    pub fn new(
        fulfillment_repo: Arc<FulfillmentRepository>,
        request_repo: Arc<RequestRepository>,
        config: Arc<dyn EngineConfigReader>,
        notification_sink: Arc<dyn NotificationSink>,
        events: OptionalEventPublisher,
    ) -> Self {
        Self {
            fulfillment_repo,
            request_repo,
            config,
            notification_sink,
            events,
        }
    }

    /// 提交输血请求 (初始状态 PENDING)
    ///
    /// # 校验
    /// - 患者ID非空
    /// - 请求单位数为正整数
    pub fn submit_request(
        &self,
        input: SubmitRequestInput,
        actor: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<TransfusionRequest> {
        if input.patient_id.trim().is_empty() {
            return Err(RepositoryError::ValidationError("患者ID不能为空".to_string()));
        }
        if input.units_requested <= 0 {
            return Err(RepositoryError::ValidationError(format!(
                "请求单位数必须为正: {}",
                input.units_requested
            )));
        }

        let request = TransfusionRequest {
            request_id: uuid::Uuid::new_v4().to_string(),
            patient_id: input.patient_id.trim().to_string(),
            blood_type: input.blood_type,
            component: input.component,
            units_requested: input.units_requested,
            urgency: input.urgency,
            indication: input.indication,
            status: RequestStatus::Pending,
            submitted_at: now,
            cross_matched_at: None,
            issued_at: None,
            cancelled_at: None,
            escalated_at: None,
            updated_at: now,
        };
        self.fulfillment_repo.submit_request(&request, actor)?;

        info!(
            request_id = %request.request_id,
            urgency = %request.urgency,
            "输血请求已提交: {} {} x{}",
            request.blood_type,
            request.component,
            request.units_requested
        );
        Ok(request)
    }

    /// 交叉配血 (PENDING → CROSS_MATCHED, 占用可用量)
    pub fn request_cross_match(
        &self,
        request_id: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<(TransfusionRequest, Reservation)> {
        let (request, reservation) =
            self.fulfillment_repo
                .reserve_and_cross_match(request_id, actor, now)?;

        self.publish_bucket_event(
            InventoryEventType::ReservationChanged,
            BucketKey::new(request.blood_type, request.component),
        );
        Ok((request, reservation))
    }

    /// 发血 (CROSS_MATCHED → ISSUED, 扣减在库量)
    pub fn issue_blood(
        &self,
        request_id: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<TransfusionRequest> {
        let request = self.fulfillment_repo.commit_and_issue(request_id, actor, now)?;

        self.publish_bucket_event(
            InventoryEventType::BloodIssued,
            BucketKey::new(request.blood_type, request.component),
        );
        Ok(request)
    }

    /// 取消请求 (→ CANCELLED, 释放预约占用)
    pub fn cancel_request(
        &self,
        request_id: &str,
        actor: &str,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<TransfusionRequest> {
        let request = self
            .fulfillment_repo
            .release_and_cancel(request_id, actor, reason, now)?;

        self.publish_bucket_event(
            InventoryEventType::ReservationChanged,
            BucketKey::new(request.blood_type, request.component),
        );
        Ok(request)
    }

    /// 待办队列 (PENDING, 紧急优先, 同级先到先处理)
    ///
    /// # 参数
    /// - key: 指定库存桶时只返回该 (血型, 成分) 的待办队列
    ///   (争抢同一桶库存的请求才在同一个处理顺序里); None 为全量
    pub fn list_pending(&self, key: Option<BucketKey>) -> RepositoryResult<Vec<TransfusionRequest>> {
        let mut pending = self.request_repo.list(RequestFilter {
            status: Some(RequestStatus::Pending),
            blood_type: key.map(|k| k.blood_type),
            component: key.map(|k| k.component),
            ..RequestFilter::default()
        })?;
        PrioritySorter::sort(&mut pending);
        Ok(pending)
    }

    /// 升级提醒巡检
    ///
    /// EMERGENCY 请求停留 PENDING 超过配置时限且未升级过的,
    /// 标记升级时间并呼叫通知渠道 (每个请求最多升级一次)
    ///
    /// # 返回
    /// - Vec<String>: 本次升级的请求ID列表
    pub async fn check_escalations(&self, now: DateTime<Utc>) -> Result<Vec<String>, Box<dyn Error>> {
        let sla_minutes = self.config.get_escalation_sla_minutes().await?;

        let pending = self.request_repo.list(RequestFilter {
            status: Some(RequestStatus::Pending),
            urgency: Some(Urgency::Emergency),
            ..RequestFilter::default()
        })?;

        let mut escalated = Vec::new();
        for request in pending {
            if request.escalated_at.is_some() {
                continue;
            }
            let waited_minutes = (now - request.submitted_at).num_minutes();
            if waited_minutes < sla_minutes {
                continue;
            }
            // 标记与通知解耦: 标记成功才通知, 避免重复呼叫
            if !self.request_repo.mark_escalated(&request.request_id, now)? {
                continue;
            }
            if let Err(e) = self.notification_sink.escalate(&request, waited_minutes) {
                warn!(request_id = %request.request_id, "升级提醒发送失败: {}", e);
            }
            escalated.push(request.request_id);
        }

        if !escalated.is_empty() {
            info!(count = escalated.len(), "紧急请求升级提醒已发出");
        }
        Ok(escalated)
    }

    /// 事件只服务于看板刷新, 发布失败不影响主流程
    fn publish_bucket_event(&self, event_type: InventoryEventType, key: BucketKey) {
        let event = InventoryEvent::for_bucket(event_type, Some("FulfillmentCoordinator".to_string()), key);
        if let Err(e) = self.events.publish(event) {
            warn!("库存事件发布失败: {}", e);
        }
    }
}
