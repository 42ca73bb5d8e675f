// ==========================================
// 血库管理系统 - 领域类型定义
// ==========================================
// 红线1: 未交叉配血禁止发血 (状态机硬约束, 不是界面置灰)
// 红线2: 库存不可透支 (可用量 = 在库量 - 未决预约 - 未清扫过期)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 血型 (Blood Type)
// ==========================================
// ABO + Rh 八种表型, 不做配型推导 (相容性判定由检验科完成)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BloodType {
    #[serde(rename = "A+")]
    APos,
    #[serde(rename = "A-")]
    ANeg,
    #[serde(rename = "B+")]
    BPos,
    #[serde(rename = "B-")]
    BNeg,
    #[serde(rename = "AB+")]
    AbPos,
    #[serde(rename = "AB-")]
    AbNeg,
    #[serde(rename = "O+")]
    OPos,
    #[serde(rename = "O-")]
    ONeg,
}

impl fmt::Display for BloodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl BloodType {
    /// 从字符串解析血型
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "A+" => Some(BloodType::APos),
            "A-" => Some(BloodType::ANeg),
            "B+" => Some(BloodType::BPos),
            "B-" => Some(BloodType::BNeg),
            "AB+" => Some(BloodType::AbPos),
            "AB-" => Some(BloodType::AbNeg),
            "O+" => Some(BloodType::OPos),
            "O-" => Some(BloodType::ONeg),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            BloodType::APos => "A+",
            BloodType::ANeg => "A-",
            BloodType::BPos => "B+",
            BloodType::BNeg => "B-",
            BloodType::AbPos => "AB+",
            BloodType::AbNeg => "AB-",
            BloodType::OPos => "O+",
            BloodType::ONeg => "O-",
        }
    }

    /// 全部已知血型（注册/请求入参校验用）
    pub const ALL: [BloodType; 8] = [
        BloodType::APos,
        BloodType::ANeg,
        BloodType::BPos,
        BloodType::BNeg,
        BloodType::AbPos,
        BloodType::AbNeg,
        BloodType::OPos,
        BloodType::ONeg,
    ];
}

// ==========================================
// 血液成分 (Blood Component)
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BloodComponent {
    WholeBlood,      // 全血
    PackedRbc,       // 悬浮红细胞
    Platelets,       // 血小板
    Ffp,             // 新鲜冰冻血浆
    Cryoprecipitate, // 冷沉淀
}

impl fmt::Display for BloodComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl BloodComponent {
    /// 从字符串解析血液成分
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "WHOLE_BLOOD" => Some(BloodComponent::WholeBlood),
            "PACKED_RBC" => Some(BloodComponent::PackedRbc),
            "PLATELETS" => Some(BloodComponent::Platelets),
            "FFP" => Some(BloodComponent::Ffp),
            "CRYOPRECIPITATE" => Some(BloodComponent::Cryoprecipitate),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            BloodComponent::WholeBlood => "WHOLE_BLOOD",
            BloodComponent::PackedRbc => "PACKED_RBC",
            BloodComponent::Platelets => "PLATELETS",
            BloodComponent::Ffp => "FFP",
            BloodComponent::Cryoprecipitate => "CRYOPRECIPITATE",
        }
    }
}

// ==========================================
// 紧急等级 (Urgency)
// ==========================================
// 等级制, 不是评分制; 排序语义: ROUTINE < URGENT < EMERGENCY
// 只影响人工处理顺序, 不做自动分配
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Urgency {
    Routine,   // 常规
    Urgent,    // 加急
    Emergency, // 紧急抢救
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl Urgency {
    /// 从字符串解析紧急等级
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ROUTINE" => Some(Urgency::Routine),
            "URGENT" => Some(Urgency::Urgent),
            "EMERGENCY" => Some(Urgency::Emergency),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            Urgency::Routine => "ROUTINE",
            Urgency::Urgent => "URGENT",
            Urgency::Emergency => "EMERGENCY",
        }
    }
}

// ==========================================
// 请求状态 (Request Status)
// ==========================================
// 状态机: PENDING → CROSS_MATCHED → ISSUED
//                 ↘ CANCELLED    ↙
// 终态: ISSUED / CANCELLED (终态后禁止任何变更)
// 说明: 前端时代的 crossMatched 布尔值已并入本枚举, 消除双写发散
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,      // 待配血
    CrossMatched, // 已交叉配血
    Issued,       // 已发血
    Cancelled,    // 已取消
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl RequestStatus {
    /// 从字符串解析请求状态
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Some(RequestStatus::Pending),
            "CROSS_MATCHED" => Some(RequestStatus::CrossMatched),
            "ISSUED" => Some(RequestStatus::Issued),
            "CANCELLED" => Some(RequestStatus::Cancelled),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::CrossMatched => "CROSS_MATCHED",
            RequestStatus::Issued => "ISSUED",
            RequestStatus::Cancelled => "CANCELLED",
        }
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Issued | RequestStatus::Cancelled)
    }

    /// 是否已完成交叉配血（兼容前端 crossMatched 布尔口径）
    pub fn is_cross_matched(&self) -> bool {
        matches!(self, RequestStatus::CrossMatched | RequestStatus::Issued)
    }

    /// 状态机迁移表（唯一口径, 引擎与仓储事务共用）
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (RequestStatus::Pending, RequestStatus::CrossMatched)
                | (RequestStatus::Pending, RequestStatus::Cancelled)
                | (RequestStatus::CrossMatched, RequestStatus::Issued)
                | (RequestStatus::CrossMatched, RequestStatus::Cancelled)
        )
    }
}

// ==========================================
// 预约状态 (Reservation Status)
// ==========================================
// ACTIVE: 占用可用量; COMMITTED: 已随发血扣减在库量;
// RELEASED: 取消时归还可用量; EXPIRED: 被效期清扫判废, 后续发血必须失败
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Active,    // 未决占用
    Committed, // 已提交扣减
    Released,  // 已释放
    Expired,   // 被过期清扫判废
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl ReservationStatus {
    /// 从字符串解析预约状态
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ACTIVE" => Some(ReservationStatus::Active),
            "COMMITTED" => Some(ReservationStatus::Committed),
            "RELEASED" => Some(ReservationStatus::Released),
            "EXPIRED" => Some(ReservationStatus::Expired),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ReservationStatus::Active => "ACTIVE",
            ReservationStatus::Committed => "COMMITTED",
            ReservationStatus::Released => "RELEASED",
            ReservationStatus::Expired => "EXPIRED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blood_type_roundtrip() {
        for bt in BloodType::ALL {
            assert_eq!(BloodType::from_db_str(bt.to_db_str()), Some(bt));
        }
        assert_eq!(BloodType::from_db_str("ab+"), Some(BloodType::AbPos));
        assert_eq!(BloodType::from_db_str("X+"), None);
    }

    #[test]
    fn test_urgency_ordering() {
        // 排序语义: 紧急抢救 > 加急 > 常规
        assert!(Urgency::Emergency > Urgency::Urgent);
        assert!(Urgency::Urgent > Urgency::Routine);
    }

    #[test]
    fn test_request_status_terminal() {
        assert!(!RequestStatus::Pending.is_terminal());
        assert!(!RequestStatus::CrossMatched.is_terminal());
        assert!(RequestStatus::Issued.is_terminal());
        assert!(RequestStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_transition_table() {
        use RequestStatus::*;
        assert!(Pending.can_transition_to(CrossMatched));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(CrossMatched.can_transition_to(Issued));
        assert!(CrossMatched.can_transition_to(Cancelled));
        // 红线1: 未交叉配血禁止发血
        assert!(!Pending.can_transition_to(Issued));
        // 红线3: 终态不可变更
        for next in [Pending, CrossMatched, Issued, Cancelled] {
            assert!(!Issued.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn test_cross_matched_view() {
        assert!(!RequestStatus::Pending.is_cross_matched());
        assert!(RequestStatus::CrossMatched.is_cross_matched());
        assert!(RequestStatus::Issued.is_cross_matched());
        assert!(!RequestStatus::Cancelled.is_cross_matched());
    }
}
