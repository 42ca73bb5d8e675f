// ==========================================
// 血库管理系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 输血请求履约引擎 (人工触发交叉配血/发血, 引擎守护红线)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    BloodComponent, BloodType, RequestStatus, ReservationStatus, Urgency,
};

// 领域实体
pub use domain::{
    ActionLog, DonationLot, Donor, InventoryBucket, Reservation, TransfusionRequest,
};

// 引擎
pub use engine::{
    DonorEligibilityEngine, ExpirySweeper, FulfillmentCoordinator, PrioritySorter,
    RequestLifecycle,
};

// 事件
pub use engine::events::{
    InventoryEvent, InventoryEventPublisher, InventoryEventType, NoOpEventPublisher,
    NoOpNotificationSink, NotificationSink,
};

// API
pub use api::{DonorApi, InventoryApi, RequestApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "血库管理系统";

// 数据库版本
pub const DB_VERSION: &str = "v0.1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
