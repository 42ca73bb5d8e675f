// ==========================================
// 血库管理系统 - 应用层模块
// ==========================================

pub mod state;

pub use state::{get_default_db_path, AppState};
