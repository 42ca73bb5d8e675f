// ==========================================
// 血库管理系统 - API层模块
// ==========================================
// 职责: 面向调用方的薄封装 (入参解析/错误码/DTO)
// 红线: API 层不含业务判断, 全部委托引擎与仓储
// ==========================================

pub mod donor_api;
pub mod error;
pub mod inventory_api;
pub mod request_api;

pub use donor_api::{DonorApi, RegisterDonorDto};
pub use error::{ApiError, ApiResult};
pub use inventory_api::{BucketView, InventoryApi};
pub use request_api::{RequestApi, RequestView, SubmitRequestDto};
