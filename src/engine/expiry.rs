// ==========================================
// 血库管理系统 - 过期清扫引擎
// ==========================================
// 职责: 编排过期清扫 (仓储事务) 并发布库存事件
// 说明: 清扫本身幂等, 可由定时任务或人工触发
// ==========================================

use crate::engine::events::{InventoryEvent, InventoryEventType, OptionalEventPublisher};
use crate::repository::inventory_repo::{InventoryRepository, SweepReport};
use crate::repository::RepositoryResult;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// 过期清扫引擎
pub struct ExpirySweeper {
    inventory_repo: Arc<InventoryRepository>,
    events: OptionalEventPublisher,
}

impl ExpirySweeper {
    pub fn new(inventory_repo: Arc<InventoryRepository>, events: OptionalEventPublisher) -> Self {
        Self {
            inventory_repo,
            events,
        }
    }

    /// 执行一次过期清扫
    ///
    /// # 参数
    /// - actor: 触发者 (定时任务填 "scheduler")
    /// - now: 清扫基准时间
    pub fn sweep(&self, actor: &str, now: DateTime<Utc>) -> RepositoryResult<SweepReport> {
        let report = self.inventory_repo.sweep_expirations(actor, now)?;

        if report.is_noop() {
            return Ok(report);
        }

        info!(
            swept_units = report.swept_units,
            affected_buckets = report.affected_buckets.len(),
            expired_reservations = report.expired_reservations.len(),
            "过期清扫完成"
        );

        let event = InventoryEvent {
            event_type: InventoryEventType::ExpirySwept,
            source: Some("ExpirySweeper".to_string()),
            affected_buckets: Some(report.affected_buckets.clone()),
        };
        if let Err(e) = self.events.publish(event) {
            // 事件只服务于看板刷新, 发布失败不回滚清扫
            warn!("清扫事件发布失败: {}", e);
        }

        Ok(report)
    }
}
