// ==========================================
// 血库管理系统 - 献血者合格性引擎
// ==========================================
// 口径: 合格 = 在册 且 非医学暂缓 且 距上次献血已满间隔期
// 说明: 合格性是派生值, 不落库; 间隔期天数来自配置
// ==========================================

use crate::config::engine_config_trait::EngineConfigReader;
use crate::domain::donor::Donor;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// EligibilityReport - 合格性判定结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityReport {
    pub eligible: bool,
    /// 不合格原因 (可解释性; 合格时为空)
    pub reasons: Vec<String>,
    /// 间隔期未满时的最早可献血日期
    pub next_eligible_date: Option<NaiveDate>,
}

// ==========================================
// DonorEligibilityEngine - 合格性引擎
// ==========================================
pub struct DonorEligibilityEngine {
    config: Arc<dyn EngineConfigReader>,
}

impl DonorEligibilityEngine {
    pub fn new(config: Arc<dyn EngineConfigReader>) -> Self {
        Self { config }
    }

    /// 判定献血者当前是否合格
    ///
    /// # 参数
    /// - donor: 献血者档案
    /// - today: 判定基准日期
    ///
    /// # 返回
    /// - EligibilityReport: 判定结果与不合格原因
    pub async fn evaluate(
        &self,
        donor: &Donor,
        today: NaiveDate,
    ) -> Result<EligibilityReport, Box<dyn Error>> {
        let cooldown_days = self.config.get_donation_cooldown_days().await?;

        let mut reasons = Vec::new();
        let mut next_eligible_date = None;

        if !donor.active {
            reasons.push("档案已停用".to_string());
        }
        if donor.deferred {
            reasons.push("医学暂缓中".to_string());
        }
        if let Some(last) = donor.last_donation_date {
            let next_date = last + Duration::days(cooldown_days);
            if today < next_date {
                reasons.push(format!(
                    "距上次献血 ({}) 未满间隔期 {} 天",
                    last, cooldown_days
                ));
                next_eligible_date = Some(next_date);
            }
        }

        Ok(EligibilityReport {
            eligible: reasons.is_empty(),
            reasons,
            next_eligible_date,
        })
    }
}
