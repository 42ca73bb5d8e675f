// ==========================================
// 血库管理系统 - 服务入口
// ==========================================
// 职责: 初始化日志/数据库/应用状态, 周期执行过期清扫与升级巡检
// ==========================================

use blood_bank_engine::app::{get_default_db_path, AppState};
use std::time::Duration;
use tracing::{error, info};

/// 巡检周期 (秒): 过期清扫 + 紧急请求升级提醒
const PATROL_INTERVAL_SECS: u64 = 60;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    blood_bank_engine::logging::init();

    let db_path = std::env::args()
        .nth(1)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(get_default_db_path);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db_path = db_path.to_string_lossy().to_string();

    info!(
        "{} v{} 启动, 数据库: {}",
        blood_bank_engine::APP_NAME,
        blood_bank_engine::VERSION,
        db_path
    );

    let state = AppState::new(db_path, None, None).map_err(|e| -> Box<dyn std::error::Error> {
        format!("应用初始化失败: {}", e).into()
    })?;

    let mut interval = tokio::time::interval(Duration::from_secs(PATROL_INTERVAL_SECS));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match state.inventory_api.sweep_expirations("scheduler") {
                    Ok(report) if !report.is_noop() => {
                        info!(
                            swept_units = report.swept_units,
                            expired_reservations = report.expired_reservations.len(),
                            "定时过期清扫完成"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => error!("定时过期清扫失败: {}", e),
                }
                if let Err(e) = state.request_api.check_escalations().await {
                    error!("升级巡检失败: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("收到退出信号, 服务停止");
                break;
            }
        }
    }
    Ok(())
}
