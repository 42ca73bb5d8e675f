// ==========================================
// 血库管理系统 - 输血请求API
// ==========================================
// 职责: 请求生命周期操作的对外封装
// 说明: 入参中的枚举一律字符串解析, 非法值返回 INVALID_REQUEST;
//       DTO 字段为 camelCase (与前端口径一致)
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::ActionLog;
use crate::domain::inventory::BucketKey;
use crate::domain::request::TransfusionRequest;
use crate::domain::types::{BloodComponent, BloodType, RequestStatus, Urgency};
use crate::engine::fulfillment::{FulfillmentCoordinator, SubmitRequestInput};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::request_repo::{RequestFilter, RequestRepository};
use crate::repository::reservation_repo::ReservationRepository;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ==========================================
// DTO
// ==========================================

/// 提交请求入参
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequestDto {
    pub patient_id: String,
    pub blood_type: String,
    pub component: String,
    pub units_requested: i64,
    pub urgency: String,
    pub indication: Option<String>,
}

/// 请求视图 (crossMatched 为状态机派生值)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestView {
    pub request_id: String,
    pub patient_id: String,
    pub blood_type: BloodType,
    pub component: BloodComponent,
    pub units_requested: i64,
    pub urgency: Urgency,
    pub indication: Option<String>,
    pub status: RequestStatus,
    pub cross_matched: bool,
    pub submitted_at: DateTime<Utc>,
    pub cross_matched_at: Option<DateTime<Utc>>,
    pub issued_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub escalated_at: Option<DateTime<Utc>>,
}

impl From<TransfusionRequest> for RequestView {
    fn from(r: TransfusionRequest) -> Self {
        Self {
            cross_matched: r.cross_matched(),
            request_id: r.request_id,
            patient_id: r.patient_id,
            blood_type: r.blood_type,
            component: r.component,
            units_requested: r.units_requested,
            urgency: r.urgency,
            indication: r.indication,
            status: r.status,
            submitted_at: r.submitted_at,
            cross_matched_at: r.cross_matched_at,
            issued_at: r.issued_at,
            cancelled_at: r.cancelled_at,
            escalated_at: r.escalated_at,
        }
    }
}

// ==========================================
// RequestApi - 输血请求API
// ==========================================
pub struct RequestApi {
    coordinator: Arc<FulfillmentCoordinator>,
    request_repo: Arc<RequestRepository>,
    reservation_repo: Arc<ReservationRepository>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl RequestApi {
    pub fn new(
        coordinator: Arc<FulfillmentCoordinator>,
        request_repo: Arc<RequestRepository>,
        reservation_repo: Arc<ReservationRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            coordinator,
            request_repo,
            reservation_repo,
            action_log_repo,
        }
    }

    /// 提交输血请求
    pub fn submit_request(&self, dto: SubmitRequestDto, actor: &str) -> ApiResult<RequestView> {
        let input = SubmitRequestInput {
            patient_id: dto.patient_id,
            blood_type: parse_blood_type(&dto.blood_type)?,
            component: parse_component(&dto.component)?,
            units_requested: dto.units_requested,
            urgency: parse_urgency(&dto.urgency)?,
            indication: dto.indication,
        };
        let request = self.coordinator.submit_request(input, actor, Utc::now())?;
        Ok(request.into())
    }

    /// 交叉配血 (占用可用量)
    pub fn cross_match(&self, request_id: &str, actor: &str) -> ApiResult<RequestView> {
        let (request, _reservation) =
            self.coordinator
                .request_cross_match(request_id, actor, Utc::now())?;
        Ok(request.into())
    }

    /// 发血 (扣减在库量)
    pub fn issue(&self, request_id: &str, actor: &str) -> ApiResult<RequestView> {
        let request = self.coordinator.issue_blood(request_id, actor, Utc::now())?;
        Ok(request.into())
    }

    /// 取消请求 (释放预约占用)
    pub fn cancel(
        &self,
        request_id: &str,
        actor: &str,
        reason: Option<String>,
    ) -> ApiResult<RequestView> {
        let request = self
            .coordinator
            .cancel_request(request_id, actor, reason, Utc::now())?;
        Ok(request.into())
    }

    /// 查询单个请求
    pub fn get_request(&self, request_id: &str) -> ApiResult<RequestView> {
        let request = self
            .request_repo
            .find_by_id(request_id)?
            .ok_or_else(|| ApiError::NotFound(format!("TransfusionRequest(id={})不存在", request_id)))?;
        Ok(request.into())
    }

    /// 查询请求列表 (可按状态/紧急等级过滤)
    pub fn list_requests(
        &self,
        status: Option<&str>,
        urgency: Option<&str>,
    ) -> ApiResult<Vec<RequestView>> {
        let filter = RequestFilter {
            status: status.map(parse_status).transpose()?,
            urgency: urgency.map(parse_urgency).transpose()?,
            ..RequestFilter::default()
        };
        let requests = self.request_repo.list(filter)?;
        Ok(requests.into_iter().map(RequestView::from).collect())
    }

    /// 指定库存桶的待办队列 (紧急优先, 同级先到先处理)
    pub fn list_pending(&self, blood_type: &str, component: &str) -> ApiResult<Vec<RequestView>> {
        let key = BucketKey::new(parse_blood_type(blood_type)?, parse_component(component)?);
        let pending = self.coordinator.list_pending(Some(key))?;
        Ok(pending.into_iter().map(RequestView::from).collect())
    }

    /// 查询请求关联的预约
    pub fn list_reservations(&self, request_id: &str) -> ApiResult<Vec<crate::domain::inventory::Reservation>> {
        Ok(self.reservation_repo.find_by_request(request_id)?)
    }

    /// 升级提醒巡检 (返回本次升级的请求ID列表)
    pub async fn check_escalations(&self) -> ApiResult<Vec<String>> {
        self.coordinator
            .check_escalations(Utc::now())
            .await
            .map_err(|e| ApiError::InternalError(e.to_string()))
    }

    /// 最近操作日志 (可解释性)
    pub fn list_recent_actions(&self, limit: i64) -> ApiResult<Vec<ActionLog>> {
        Ok(self.action_log_repo.list_recent(limit)?)
    }
}

// ==========================================
// 入参解析
// ==========================================

fn parse_blood_type(s: &str) -> ApiResult<BloodType> {
    BloodType::from_db_str(s).ok_or_else(|| ApiError::InvalidInput(format!("未知血型: {}", s)))
}

fn parse_component(s: &str) -> ApiResult<BloodComponent> {
    BloodComponent::from_db_str(s)
        .ok_or_else(|| ApiError::InvalidInput(format!("未知血液成分: {}", s)))
}

fn parse_urgency(s: &str) -> ApiResult<Urgency> {
    Urgency::from_db_str(s).ok_or_else(|| ApiError::InvalidInput(format!("未知紧急等级: {}", s)))
}

fn parse_status(s: &str) -> ApiResult<RequestStatus> {
    RequestStatus::from_db_str(s)
        .ok_or_else(|| ApiError::InvalidInput(format!("未知请求状态: {}", s)))
}
