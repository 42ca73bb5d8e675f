// ==========================================
// 紧急请求升级提醒测试
// ==========================================
// 覆盖: 超时升级、每请求最多升级一次、非紧急/未超时不升级
// ==========================================


use blood_bank_engine::config::config_manager::{config_keys, ConfigManager};
use blood_bank_engine::domain::request::TransfusionRequest;
use blood_bank_engine::domain::types::{BloodComponent, BloodType, Urgency};
use blood_bank_engine::engine::events::NotificationSink;
use chrono::{Duration, Utc};
use std::error::Error;
use std::sync::{Arc, Mutex};
use test_helpers::{build_coordinator_with_sink, create_test_db, submit_request};

/// 收集升级呼叫的测试渠道
#[derive(Default)]
struct CollectingSink {
    calls: Mutex<Vec<(String, i64)>>,
}

impl NotificationSink for CollectingSink {
    fn escalate(
        &self,
        request: &TransfusionRequest,
        waited_minutes: i64,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.calls
            .lock()
            .unwrap()
            .push((request.request_id.clone(), waited_minutes));
        Ok(())
    }
}

#[tokio::test]
async fn test_emergency_over_sla_escalates_once() {
    let (_tmp, conn) = create_test_db().unwrap();
    let sink = Arc::new(CollectingSink::default());
    let coordinator = build_coordinator_with_sink(conn, sink.clone());
    let now = Utc::now();

    // 默认 SLA 30 分钟, 40 分钟前提交
    let request = submit_request(
        &coordinator,
        BloodType::ONeg,
        BloodComponent::PackedRbc,
        2,
        Urgency::Emergency,
        now - Duration::minutes(40),
    )
    .unwrap();

    let escalated = coordinator.check_escalations(now).await.unwrap();
    assert_eq!(escalated, vec![request.request_id.clone()]);
    {
        let calls = sink.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, request.request_id);
        assert!(calls[0].1 >= 40);
    }

    // 再次巡检不重复呼叫
    let escalated = coordinator.check_escalations(now + Duration::minutes(10)).await.unwrap();
    assert!(escalated.is_empty());
    assert_eq!(sink.calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_within_sla_or_non_emergency_not_escalated() {
    let (_tmp, conn) = create_test_db().unwrap();
    let sink = Arc::new(CollectingSink::default());
    let coordinator = build_coordinator_with_sink(conn, sink.clone());
    let now = Utc::now();

    // 紧急但未超时
    submit_request(
        &coordinator,
        BloodType::APos,
        BloodComponent::PackedRbc,
        1,
        Urgency::Emergency,
        now - Duration::minutes(10),
    )
    .unwrap();
    // 超时但非紧急
    submit_request(
        &coordinator,
        BloodType::APos,
        BloodComponent::PackedRbc,
        1,
        Urgency::Urgent,
        now - Duration::hours(5),
    )
    .unwrap();

    let escalated = coordinator.check_escalations(now).await.unwrap();
    assert!(escalated.is_empty());
    assert!(sink.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_sla_minutes_configurable() {
    let (_tmp, conn) = create_test_db().unwrap();
    let sink = Arc::new(CollectingSink::default());
    let coordinator = build_coordinator_with_sink(conn.clone(), sink.clone());
    let config = ConfigManager::from_connection(conn).unwrap();
    config
        .set_global_config_value(config_keys::ESCALATION_SLA_MINUTES, "5")
        .unwrap();

    let now = Utc::now();
    submit_request(
        &coordinator,
        BloodType::BNeg,
        BloodComponent::Platelets,
        1,
        Urgency::Emergency,
        now - Duration::minutes(6),
    )
    .unwrap();

    let escalated = coordinator.check_escalations(now).await.unwrap();
    assert_eq!(escalated.len(), 1);
}

#[tokio::test]
async fn test_issued_emergency_not_escalated() {
    let (_tmp, conn) = create_test_db().unwrap();
    let sink = Arc::new(CollectingSink::default());
    let coordinator = build_coordinator_with_sink(conn.clone(), sink.clone());
    let past = Utc::now() - Duration::hours(2);
    let now = Utc::now();

    test_helpers::seed_stock(conn, BloodType::OPos, BloodComponent::PackedRbc, 5, 30, past).unwrap();
    let request = submit_request(
        &coordinator,
        BloodType::OPos,
        BloodComponent::PackedRbc,
        2,
        Urgency::Emergency,
        past,
    )
    .unwrap();
    coordinator
        .request_cross_match(&request.request_id, "tech", past)
        .unwrap();
    coordinator
        .issue_blood(&request.request_id, "tech", past)
        .unwrap();

    // 已发血的请求不在 PENDING 队列, 不升级
    let escalated = coordinator.check_escalations(now).await.unwrap();
    assert!(escalated.is_empty());
}
