// ==========================================
// 血库管理系统 - 配置模块
// ==========================================

pub mod config_manager;
pub mod engine_config_trait;

pub use config_manager::{config_keys, ConfigManager};
pub use engine_config_trait::EngineConfigReader;
