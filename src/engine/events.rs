// ==========================================
// 血库管理系统 - 引擎层事件发布
// ==========================================
// 职责: 定义库存事件发布与升级提醒 trait，实现依赖倒置
// 说明: Engine 层定义 trait，外围 (通知渠道/前端桥接) 实现适配器
// ==========================================

use crate::domain::inventory::BucketKey;
use crate::domain::request::TransfusionRequest;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 库存事件类型
// ==========================================

/// 库存事件触发类型
///
/// Engine 层定义的事件类型，用于通知下游系统 (看板刷新等)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEventType {
    /// 献血入库
    DonationRecorded,
    /// 预约占用变更 (交叉配血/释放)
    ReservationChanged,
    /// 发血出库
    BloodIssued,
    /// 过期清扫出库
    ExpirySwept,
}

impl InventoryEventType {
    /// 转换为字符串标识
    pub fn as_str(&self) -> &str {
        match self {
            InventoryEventType::DonationRecorded => "DonationRecorded",
            InventoryEventType::ReservationChanged => "ReservationChanged",
            InventoryEventType::BloodIssued => "BloodIssued",
            InventoryEventType::ExpirySwept => "ExpirySwept",
        }
    }
}

/// 库存事件
///
/// Engine 层发布的事件，包含事件类型与受影响的库存桶
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryEvent {
    /// 事件类型
    pub event_type: InventoryEventType,
    /// 事件来源描述
    pub source: Option<String>,
    /// 受影响的库存桶（None 表示全部）
    pub affected_buckets: Option<Vec<BucketKey>>,
}

impl InventoryEvent {
    /// 创建全量事件
    pub fn full_scope(event_type: InventoryEventType, source: Option<String>) -> Self {
        Self {
            event_type,
            source,
            affected_buckets: None,
        }
    }

    /// 创建单桶事件
    pub fn for_bucket(event_type: InventoryEventType, source: Option<String>, key: BucketKey) -> Self {
        Self {
            event_type,
            source,
            affected_buckets: Some(vec![key]),
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 库存事件发布者 Trait
///
/// Engine 层定义，外围实现
/// 通过 trait 实现依赖倒置，解除 Engine → 通知渠道 的直接依赖
pub trait InventoryEventPublisher: Send + Sync {
    /// 发布库存事件
    fn publish(&self, event: InventoryEvent) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
///
/// 用于不需要事件发布的场景（如单元测试）
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl InventoryEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: InventoryEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - event_type={}",
            event.event_type.as_str()
        );
        Ok(())
    }
}

/// 可选的事件发布者包装
///
/// 简化 Option<Arc<dyn InventoryEventPublisher>> 的使用
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn InventoryEventPublisher>>,
}

impl OptionalEventPublisher {
    /// 创建带发布者的实例
    pub fn with_publisher(publisher: Arc<dyn InventoryEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    /// 创建空实例（不发布事件）
    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件（如果有发布者）
    pub fn publish(&self, event: InventoryEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        match &self.inner {
            Some(publisher) => publisher.publish(event),
            None => {
                tracing::debug!(
                    "OptionalEventPublisher: 未配置发布者，跳过事件 - event_type={}",
                    event.event_type.as_str()
                );
                Ok(())
            }
        }
    }

    /// 检查是否配置了发布者
    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}

// ==========================================
// 升级提醒 Trait
// ==========================================

/// 升级提醒通知渠道 Trait
///
/// EMERGENCY 请求停留 PENDING 超时后, 引擎通过该渠道呼叫血库管理员
pub trait NotificationSink: Send + Sync {
    /// 发送升级提醒
    ///
    /// # 参数
    /// - request: 超时的紧急请求
    /// - waited_minutes: 已等待分钟数
    fn escalate(
        &self,
        request: &TransfusionRequest,
        waited_minutes: i64,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 空操作通知渠道
///
/// 仅记录日志, 用于未接入寻呼/短信渠道的部署与测试
#[derive(Debug, Clone, Default)]
pub struct NoOpNotificationSink;

impl NotificationSink for NoOpNotificationSink {
    fn escalate(
        &self,
        request: &TransfusionRequest,
        waited_minutes: i64,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::warn!(
            request_id = %request.request_id,
            patient_id = %request.patient_id,
            waited_minutes,
            "紧急请求超时未配血, 升级提醒 (NoOp 渠道, 仅日志)"
        );
        Ok(())
    }
}
