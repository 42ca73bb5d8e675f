// ==========================================
// 过期清扫测试
// ==========================================
// 覆盖: 清扫出库、幂等性、预约侵占判废、判废预约发血失败
// ==========================================


use blood_bank_engine::domain::inventory::BucketKey;
use blood_bank_engine::domain::types::{
    BloodComponent, BloodType, RequestStatus, ReservationStatus, Urgency,
};
use blood_bank_engine::repository::error::RepositoryError;
use chrono::{Duration, Utc};
use test_helpers::{build_coordinator, build_repos, create_test_db, seed_stock, submit_request};

#[test]
fn test_sweep_moves_expired_units_out() {
    let (_tmp, conn) = create_test_db().unwrap();
    let repos = build_repos(conn.clone());
    let now = Utc::now();
    let past = now - Duration::days(10);
    let key = BucketKey::new(BloodType::BPos, BloodComponent::PackedRbc);

    // 10天前入库: 一批效期5天 (今日已过期), 一批效期60天
    seed_stock(conn.clone(), BloodType::BPos, BloodComponent::PackedRbc, 4, 5, past).unwrap();
    seed_stock(conn, BloodType::BPos, BloodComponent::PackedRbc, 6, 60, past).unwrap();

    let report = repos.inventory.sweep_expirations("scheduler", now).unwrap();
    assert_eq!(report.swept_units, 4);
    assert_eq!(report.affected_buckets, vec![key]);
    assert!(report.expired_reservations.is_empty());

    let bucket = repos.inventory.get_bucket(key, now).unwrap();
    assert_eq!(bucket.quantity_on_hand, 6);
    assert_eq!(bucket.expired_count, 4);
    assert_eq!(repos.inventory.available_units(key, now).unwrap(), 6);
}

#[test]
fn test_sweep_is_idempotent() {
    let (_tmp, conn) = create_test_db().unwrap();
    let repos = build_repos(conn.clone());
    let now = Utc::now();
    let past = now - Duration::days(10);
    let key = BucketKey::new(BloodType::OPos, BloodComponent::Platelets);

    seed_stock(conn, BloodType::OPos, BloodComponent::Platelets, 3, 2, past).unwrap();

    let first = repos.inventory.sweep_expirations("scheduler", now).unwrap();
    assert_eq!(first.swept_units, 3);

    // 重复清扫不二次扣减
    let second = repos.inventory.sweep_expirations("scheduler", now).unwrap();
    assert!(second.is_noop());

    let bucket = repos.inventory.get_bucket(key, now).unwrap();
    assert_eq!(bucket.quantity_on_hand, 0);
    assert_eq!(bucket.expired_count, 3);
}

#[test]
fn test_sweep_expires_encroached_reservation_and_issue_fails() {
    let (_tmp, conn) = create_test_db().unwrap();
    let coordinator = build_coordinator(conn.clone());
    let repos = build_repos(conn.clone());
    let past = Utc::now() - Duration::days(10);
    let now = Utc::now();
    let key = BucketKey::new(BloodType::ONeg, BloodComponent::PackedRbc);

    // 10天前: 5单位效期2天 + 5单位效期60天, 配血预约 8 单位
    seed_stock(conn.clone(), BloodType::ONeg, BloodComponent::PackedRbc, 5, 2, past).unwrap();
    seed_stock(conn, BloodType::ONeg, BloodComponent::PackedRbc, 5, 60, past).unwrap();

    let request = submit_request(
        &coordinator,
        BloodType::ONeg,
        BloodComponent::PackedRbc,
        8,
        Urgency::Emergency,
        past,
    )
    .unwrap();
    coordinator
        .request_cross_match(&request.request_id, "tech", past)
        .unwrap();

    // 今日清扫: 5 单位出库, 剩余 5 < 预约 8 → 预约判废
    let report = repos.inventory.sweep_expirations("scheduler", now).unwrap();
    assert_eq!(report.swept_units, 5);
    assert_eq!(report.expired_reservations.len(), 1);

    let reservations = repos.reservations.find_by_request(&request.request_id).unwrap();
    assert_eq!(reservations[0].status, ReservationStatus::Expired);

    // 判废后发血必须以明确原因失败
    let err = coordinator
        .issue_blood(&request.request_id, "tech", now)
        .unwrap_err();
    assert!(matches!(err, RepositoryError::ReservedUnitExpired { .. }));

    // 请求可取消收尾, 不再占用可用量
    coordinator
        .cancel_request(&request.request_id, "doctor", Some("库存过期".to_string()), now)
        .unwrap();
    assert_eq!(repos.inventory.available_units(key, now).unwrap(), 5);
}

#[test]
fn test_sweep_keeps_covered_reservation_active() {
    let (_tmp, conn) = create_test_db().unwrap();
    let coordinator = build_coordinator(conn.clone());
    let repos = build_repos(conn.clone());
    let past = Utc::now() - Duration::days(10);
    let now = Utc::now();

    // 过期 3 单位后剩余 7, 预约 6 仍可覆盖, 不判废
    seed_stock(conn.clone(), BloodType::APos, BloodComponent::PackedRbc, 3, 2, past).unwrap();
    seed_stock(conn, BloodType::APos, BloodComponent::PackedRbc, 7, 60, past).unwrap();

    let request = submit_request(
        &coordinator,
        BloodType::APos,
        BloodComponent::PackedRbc,
        6,
        Urgency::Urgent,
        past,
    )
    .unwrap();
    coordinator
        .request_cross_match(&request.request_id, "tech", past)
        .unwrap();

    let report = repos.inventory.sweep_expirations("scheduler", now).unwrap();
    assert_eq!(report.swept_units, 3);
    assert!(report.expired_reservations.is_empty());

    // 发血仍可完成
    coordinator
        .issue_blood(&request.request_id, "tech", now)
        .unwrap();
    let stored = repos.requests.find_by_id(&request.request_id).unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Issued);
}
