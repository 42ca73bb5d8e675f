// ==========================================
// 血库管理系统 - 献血者领域模型
// ==========================================
// 红线: 献血者档案只停用 (active=false), 不物理删除
// 说明: 合格性 (eligible) 是派生值, 由 DonorEligibilityEngine 按
//       间隔期规则计算, 不落库
// ==========================================

use crate::domain::types::BloodType;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Donor - 献血者档案
// ==========================================
// 对齐: donors 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Donor {
    // ===== 主键 =====
    pub donor_id: String,

    // ===== 基础信息 =====
    pub name: String,
    pub age: i32,
    pub gender: Option<String>,
    pub blood_type: BloodType,

    // ===== 联系方式 =====
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,

    // ===== 献血履历 =====
    pub last_donation_date: Option<NaiveDate>,
    pub total_donations: i64,

    // ===== 管理标志 =====
    pub deferred: bool, // 医学暂缓标志（暂缓者一律不合格）
    pub active: bool,   // 停用后不再接收献血

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
