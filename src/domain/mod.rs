// ==========================================
// 血库管理系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod donor;
pub mod inventory;
pub mod request;
pub mod types;

// 重导出核心类型
pub use action_log::ActionLog;
pub use donor::Donor;
pub use inventory::{BucketKey, DonationLot, InventoryBucket, Reservation};
pub use request::TransfusionRequest;
pub use types::{BloodComponent, BloodType, RequestStatus, ReservationStatus, Urgency};
