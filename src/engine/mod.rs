// ==========================================
// 血库管理系统 - 引擎层模块
// ==========================================
// 职责: 业务规则 (状态机/优先级/合格性/过期清扫/履约协调)
// 红线: 引擎不直接写 SQL, 跨表写入一律走仓储事务
// ==========================================

pub mod eligibility;
pub mod events;
pub mod expiry;
pub mod fulfillment;
pub mod lifecycle;
pub mod priority;

pub use eligibility::{DonorEligibilityEngine, EligibilityReport};
pub use events::{
    InventoryEvent, InventoryEventPublisher, InventoryEventType, NoOpEventPublisher,
    NoOpNotificationSink, NotificationSink, OptionalEventPublisher,
};
pub use expiry::ExpirySweeper;
pub use fulfillment::{FulfillmentCoordinator, SubmitRequestInput};
pub use lifecycle::RequestLifecycle;
pub use priority::PrioritySorter;
