// ==========================================
// 献血者档案与献血登记测试
// ==========================================
// 覆盖: 注册校验、合格性判定 (间隔期/暂缓/停用)、
//       献血入库联动、档案停用
// ==========================================


use blood_bank_engine::api::donor_api::{DonorApi, RegisterDonorDto};
use blood_bank_engine::api::error::ApiError;
use blood_bank_engine::config::config_manager::{config_keys, ConfigManager};
use blood_bank_engine::config::engine_config_trait::EngineConfigReader;
use blood_bank_engine::domain::inventory::BucketKey;
use blood_bank_engine::domain::types::{BloodComponent, BloodType};
use blood_bank_engine::engine::eligibility::DonorEligibilityEngine;
use blood_bank_engine::engine::events::{InventoryEventType, OptionalEventPublisher};
use blood_bank_engine::repository::action_log_repo::ActionLogRepository;
use blood_bank_engine::repository::donor_repo::DonorRepository;
use blood_bank_engine::repository::inventory_repo::InventoryRepository;
use chrono::{Duration, Utc};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use test_helpers::{create_test_db, CollectingPublisher};

fn build_donor_api(conn: Arc<Mutex<Connection>>) -> (DonorApi, Arc<ConfigManager>) {
    build_donor_api_with_events(conn, OptionalEventPublisher::none())
}

fn build_donor_api_with_events(
    conn: Arc<Mutex<Connection>>,
    events: OptionalEventPublisher,
) -> (DonorApi, Arc<ConfigManager>) {
    let config = Arc::new(ConfigManager::from_connection(conn.clone()).unwrap());
    let reader: Arc<dyn EngineConfigReader> = config.clone();
    let api = DonorApi::new(
        Arc::new(DonorRepository::from_connection(conn.clone())),
        Arc::new(InventoryRepository::from_connection(conn.clone())),
        Arc::new(DonorEligibilityEngine::new(reader)),
        Arc::new(ActionLogRepository::from_connection(conn)),
        events,
    );
    (api, config)
}

fn dto(name: &str, age: i32, blood_type: &str) -> RegisterDonorDto {
    RegisterDonorDto {
        name: name.to_string(),
        age,
        gender: Some("男".to_string()),
        blood_type: blood_type.to_string(),
        phone: Some("13800000000".to_string()),
        email: None,
        address: None,
    }
}

#[test]
fn test_register_donor_validation() {
    let (_tmp, conn) = create_test_db().unwrap();
    let (api, _) = build_donor_api(conn);

    let err = api.register_donor(dto("", 30, "A+"), "admin").unwrap_err();
    assert_eq!(err.code(), "INVALID_REQUEST");

    let err = api.register_donor(dto("张三", 17, "A+"), "admin").unwrap_err();
    assert_eq!(err.code(), "INVALID_REQUEST");

    let err = api.register_donor(dto("张三", 30, "X+"), "admin").unwrap_err();
    assert_eq!(err.code(), "INVALID_REQUEST");

    let donor = api.register_donor(dto("张三", 30, "A+"), "admin").unwrap();
    assert_eq!(donor.blood_type, BloodType::APos);
    assert!(donor.active);
    assert!(!donor.deferred);
    assert_eq!(donor.total_donations, 0);
}

#[tokio::test]
async fn test_donation_flow_and_cooldown() {
    let (_tmp, conn) = create_test_db().unwrap();
    let (api, _) = build_donor_api(conn.clone());
    let inventory = InventoryRepository::from_connection(conn);

    let donor = api.register_donor(dto("李四", 28, "O-"), "admin").unwrap();
    let expiry = Utc::now().date_naive() + Duration::days(35);

    // 首次献血: 合格, 批次入库并更新档案
    let lot_id = api
        .record_donation(&donor.donor_id, "WHOLE_BLOOD", 1, expiry, "admin")
        .await
        .unwrap();
    assert!(!lot_id.is_empty());

    let key = BucketKey::new(BloodType::ONeg, BloodComponent::WholeBlood);
    let bucket = inventory.get_bucket(key, Utc::now()).unwrap();
    assert_eq!(bucket.quantity_on_hand, 1);

    let donor = api.get_donor(&donor.donor_id).unwrap();
    assert_eq!(donor.total_donations, 1);
    assert_eq!(donor.last_donation_date, Some(Utc::now().date_naive()));

    // 间隔期内再次献血被拒绝
    let err = api
        .record_donation(&donor.donor_id, "WHOLE_BLOOD", 1, expiry, "admin")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_ELIGIBLE");
    match err {
        ApiError::NotEligible { reasons, .. } => assert!(!reasons.is_empty()),
        other => panic!("expected NotEligible, got {:?}", other),
    }

    let report = api.check_eligibility(&donor.donor_id).await.unwrap();
    assert!(!report.eligible);
    assert_eq!(
        report.next_eligible_date,
        Some(Utc::now().date_naive() + Duration::days(56))
    );
}

#[tokio::test]
async fn test_cooldown_days_configurable() {
    let (_tmp, conn) = create_test_db().unwrap();
    let (api, config) = build_donor_api(conn);

    // 间隔期缩短为 0 天时, 同日可再次献血
    config
        .set_global_config_value(config_keys::DONATION_COOLDOWN_DAYS, "0")
        .unwrap();

    let donor = api.register_donor(dto("王五", 40, "B+"), "admin").unwrap();
    let expiry = Utc::now().date_naive() + Duration::days(35);
    api.record_donation(&donor.donor_id, "PACKED_RBC", 1, expiry, "admin")
        .await
        .unwrap();
    api.record_donation(&donor.donor_id, "PACKED_RBC", 1, expiry, "admin")
        .await
        .unwrap();

    let donor = api.get_donor(&donor.donor_id).unwrap();
    assert_eq!(donor.total_donations, 2);
}

#[tokio::test]
async fn test_deferred_donor_rejected() {
    let (_tmp, conn) = create_test_db().unwrap();
    let (api, _) = build_donor_api(conn);

    let donor = api.register_donor(dto("赵六", 35, "AB+"), "admin").unwrap();
    api.set_deferred(&donor.donor_id, true, "admin").unwrap();

    let err = api
        .record_donation(
            &donor.donor_id,
            "PLATELETS",
            1,
            Utc::now().date_naive() + Duration::days(5),
            "admin",
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_ELIGIBLE");

    // 解除暂缓后恢复合格
    api.set_deferred(&donor.donor_id, false, "admin").unwrap();
    let report = api.check_eligibility(&donor.donor_id).await.unwrap();
    assert!(report.eligible);
}

#[tokio::test]
async fn test_deactivated_donor_kept_but_ineligible() {
    let (_tmp, conn) = create_test_db().unwrap();
    let (api, _) = build_donor_api(conn);

    let donor = api.register_donor(dto("孙七", 50, "O+"), "admin").unwrap();
    api.deactivate_donor(&donor.donor_id, "admin").unwrap();

    // 档案保留 (只停用不删除)
    let stored = api.get_donor(&donor.donor_id).unwrap();
    assert!(!stored.active);
    assert!(api.list_donors(true).unwrap().is_empty());
    assert_eq!(api.list_donors(false).unwrap().len(), 1);

    let report = api.check_eligibility(&donor.donor_id).await.unwrap();
    assert!(!report.eligible);
}

#[test]
fn test_unknown_donor_not_found() {
    let (_tmp, conn) = create_test_db().unwrap();
    let (api, _) = build_donor_api(conn);
    let err = api.get_donor("missing").unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

#[tokio::test]
async fn test_donation_publishes_inventory_event() {
    let (_tmp, conn) = create_test_db().unwrap();
    let publisher = Arc::new(CollectingPublisher::default());
    let (api, _) = build_donor_api_with_events(
        conn,
        OptionalEventPublisher::with_publisher(publisher.clone()),
    );

    let donor = api.register_donor(dto("周八", 32, "B-"), "admin").unwrap();
    api.record_donation(
        &donor.donor_id,
        "WHOLE_BLOOD",
        1,
        Utc::now().date_naive() + Duration::days(35),
        "admin",
    )
    .await
    .unwrap();

    // 入库后发布单桶 DonationRecorded 事件 (看板刷新)
    let events = publisher.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, InventoryEventType::DonationRecorded);
    let key = BucketKey::new(BloodType::BNeg, BloodComponent::WholeBlood);
    assert_eq!(events[0].affected_buckets.as_deref(), Some(&[key][..]));
}
