// ==========================================
// 血库管理系统 - 引擎配置读取 Trait
// ==========================================
// 职责: 定义引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

// ==========================================
// EngineConfigReader Trait
// ==========================================
// 用途: 合格性判定与升级提醒所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait EngineConfigReader: Send + Sync {
    /// 获取紧急请求升级时限（分钟）
    ///
    /// # 返回
    /// - i64: EMERGENCY 请求停留 PENDING 超过该时限则升级提醒
    ///
    /// # 默认值
    /// - 30
    async fn get_escalation_sla_minutes(&self) -> Result<i64, Box<dyn Error>>;

    /// 获取献血间隔期（天）
    ///
    /// # 返回
    /// - i64: 距上次献血不足该天数则不合格
    ///
    /// # 默认值
    /// - 56
    async fn get_donation_cooldown_days(&self) -> Result<i64, Box<dyn Error>>;
}
