// ==========================================
// 血库管理系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 所有仓储共享同一个 Arc<Mutex<Connection>>,
//       保证事务与可用量判定在同一连接上串行执行
// ==========================================

use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::api::{DonorApi, InventoryApi, RequestApi};
use crate::config::config_manager::ConfigManager;
use crate::config::engine_config_trait::EngineConfigReader;
use crate::engine::eligibility::DonorEligibilityEngine;
use crate::engine::events::{
    InventoryEventPublisher, NoOpNotificationSink, NotificationSink, OptionalEventPublisher,
};
use crate::engine::expiry::ExpirySweeper;
use crate::engine::fulfillment::FulfillmentCoordinator;
use crate::repository::{
    action_log_repo::ActionLogRepository, donor_repo::DonorRepository,
    fulfillment_repo::FulfillmentRepository, inventory_repo::InventoryRepository,
    request_repo::RequestRepository, reservation_repo::ReservationRepository,
};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 输血请求API
    pub request_api: Arc<RequestApi>,

    /// 库存API
    pub inventory_api: Arc<InventoryApi>,

    /// 献血者API
    pub donor_api: Arc<DonorApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    /// - event_publisher: 库存事件发布器 (None 表示不发布)
    /// - notification_sink: 升级提醒通知渠道 (None 使用 NoOp, 仅日志)
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开共享连接并初始化 schema（幂等）
    /// 2. 初始化所有Repository
    /// 3. 初始化所有Engine
    /// 4. 创建所有API实例
    pub fn new(
        db_path: String,
        event_publisher: Option<Arc<dyn InventoryEventPublisher>>,
        notification_sink: Option<Arc<dyn NotificationSink>>,
    ) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        // 创建数据库连接（共享连接）
        let conn = crate::db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        crate::db::init_schema(&conn).map_err(|e| format!("schema 初始化失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        Self::from_connection(db_path, conn, event_publisher, notification_sink)
    }

    /// 从已有共享连接装配 (测试用内存库也走这条路径)
    pub fn from_connection(
        db_path: String,
        conn: Arc<Mutex<Connection>>,
        event_publisher: Option<Arc<dyn InventoryEventPublisher>>,
        notification_sink: Option<Arc<dyn NotificationSink>>,
    ) -> Result<Self, String> {
        // ==========================================
        // 初始化Repository层
        // ==========================================
        let inventory_repo = Arc::new(InventoryRepository::from_connection(conn.clone()));
        let request_repo = Arc::new(RequestRepository::from_connection(conn.clone()));
        let reservation_repo = Arc::new(ReservationRepository::from_connection(conn.clone()));
        let donor_repo = Arc::new(DonorRepository::from_connection(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::from_connection(conn.clone()));
        let fulfillment_repo = Arc::new(FulfillmentRepository::from_connection(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn)
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let config_reader: Arc<dyn EngineConfigReader> = config_manager.clone();
        let sink: Arc<dyn NotificationSink> =
            notification_sink.unwrap_or_else(|| Arc::new(NoOpNotificationSink));
        let make_events = || match &event_publisher {
            Some(publisher) => OptionalEventPublisher::with_publisher(publisher.clone()),
            None => OptionalEventPublisher::none(),
        };

        let eligibility_engine = Arc::new(DonorEligibilityEngine::new(config_reader.clone()));
        let sweeper = Arc::new(ExpirySweeper::new(inventory_repo.clone(), make_events()));
        let coordinator = Arc::new(FulfillmentCoordinator::new(
            fulfillment_repo,
            request_repo.clone(),
            config_reader,
            sink,
            make_events(),
        ));

        // ==========================================
        // 创建API实例
        // ==========================================
        let request_api = Arc::new(RequestApi::new(
            coordinator,
            request_repo,
            reservation_repo,
            action_log_repo.clone(),
        ));
        let inventory_api = Arc::new(InventoryApi::new(
            inventory_repo.clone(),
            sweeper,
            make_events(),
        ));
        let donor_api = Arc::new(DonorApi::new(
            donor_repo,
            inventory_repo,
            eligibility_engine,
            action_log_repo.clone(),
            make_events(),
        ));

        tracing::info!("AppState 初始化完成");

        Ok(Self {
            db_path,
            request_api,
            inventory_api,
            donor_api,
            config_manager,
            action_log_repo,
        })
    }
}

/// 默认数据库路径: <数据目录>/blood-bank-engine/blood_bank.db
pub fn get_default_db_path() -> PathBuf {
    let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("blood-bank-engine").join("blood_bank.db")
}
