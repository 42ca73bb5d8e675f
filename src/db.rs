// ==========================================
// 血库管理系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免“部分模块外键开启/部分不开启”
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供幂等的建表入口（库/测试/二进制共用同一份 schema）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
///
/// 说明：
/// - 版本号用于提示/告警（不做自动迁移），避免静默在旧库上运行导致隐性错误。
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化数据库 schema（幂等）
///
/// 表清单:
/// - inventory_buckets: 库存桶 (血型, 成分) 聚合计数
/// - donation_lots: 献血批次（效期窗口统计与先到期先出的依据）
/// - transfusion_requests: 输血请求
/// - reservations: 库存预约（交叉配血 → 发血 之间的占用）
/// - donors: 献血者档案（只停用, 不删除）
/// - config_scope / config_kv: 配置存储
/// - action_log: 操作日志（可解释性）
/// - schema_version: schema 版本标记
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id TEXT PRIMARY KEY,
            scope_type TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(scope_type, scope_key)
        );

        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
        VALUES ('global', 'GLOBAL', 'global');

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS inventory_buckets (
            blood_type TEXT NOT NULL,
            component TEXT NOT NULL,
            quantity_on_hand INTEGER NOT NULL DEFAULT 0,
            expiring_in_3_days INTEGER NOT NULL DEFAULT 0,
            expiring_in_7_days INTEGER NOT NULL DEFAULT 0,
            expired_count INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (blood_type, component)
        );

        CREATE TABLE IF NOT EXISTS donation_lots (
            lot_id TEXT PRIMARY KEY,
            blood_type TEXT NOT NULL,
            component TEXT NOT NULL,
            units_remaining INTEGER NOT NULL,
            expiry_date TEXT NOT NULL,
            donor_id TEXT,
            donated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_donation_lots_key
            ON donation_lots (blood_type, component, expiry_date);

        CREATE TABLE IF NOT EXISTS transfusion_requests (
            request_id TEXT PRIMARY KEY,
            patient_id TEXT NOT NULL,
            blood_type TEXT NOT NULL,
            component TEXT NOT NULL,
            units_requested INTEGER NOT NULL,
            urgency TEXT NOT NULL,
            status TEXT NOT NULL,
            indication TEXT,
            submitted_at TEXT NOT NULL,
            cross_matched_at TEXT,
            issued_at TEXT,
            cancelled_at TEXT,
            escalated_at TEXT,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_requests_key_status
            ON transfusion_requests (blood_type, component, status);

        CREATE TABLE IF NOT EXISTS reservations (
            reservation_id TEXT PRIMARY KEY,
            request_id TEXT NOT NULL REFERENCES transfusion_requests(request_id),
            blood_type TEXT NOT NULL,
            component TEXT NOT NULL,
            units INTEGER NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_reservations_key_status
            ON reservations (blood_type, component, status);

        CREATE TABLE IF NOT EXISTS donors (
            donor_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            age INTEGER NOT NULL,
            gender TEXT,
            blood_type TEXT NOT NULL,
            phone TEXT,
            email TEXT,
            address TEXT,
            last_donation_date TEXT,
            total_donations INTEGER NOT NULL DEFAULT 0,
            deferred INTEGER NOT NULL DEFAULT 0,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS action_log (
            action_id TEXT PRIMARY KEY,
            action_type TEXT NOT NULL,
            action_ts TEXT NOT NULL,
            actor TEXT NOT NULL,
            payload_json TEXT,
            detail TEXT
        );

        INSERT OR IGNORE INTO schema_version (version) VALUES (1);
        "#,
    )?;

    Ok(())
}
