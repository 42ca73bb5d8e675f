// ==========================================
// 履约全流程测试
// ==========================================
// 覆盖: 提交 → 配血 → 发血 的台账变化、库存不可透支、
//       取消释放预约、操作留痕
// ==========================================


use blood_bank_engine::domain::inventory::BucketKey;
use blood_bank_engine::domain::types::{
    BloodComponent, BloodType, RequestStatus, ReservationStatus, Urgency,
};
use blood_bank_engine::repository::action_log_repo::ActionLogRepository;
use blood_bank_engine::repository::error::RepositoryError;
use chrono::Utc;
use test_helpers::{build_coordinator, build_repos, create_test_db, seed_stock, submit_request};

#[test]
fn test_full_fulfillment_flow() {
    let (_tmp, conn) = create_test_db().unwrap();
    let coordinator = build_coordinator(conn.clone());
    let repos = build_repos(conn.clone());
    let now = Utc::now();
    let key = BucketKey::new(BloodType::ONeg, BloodComponent::PackedRbc);

    seed_stock(conn, BloodType::ONeg, BloodComponent::PackedRbc, 10, 30, now).unwrap();

    let request = submit_request(
        &coordinator,
        BloodType::ONeg,
        BloodComponent::PackedRbc,
        4,
        Urgency::Emergency,
        now,
    )
    .unwrap();
    assert_eq!(request.status, RequestStatus::Pending);

    // 配血: 占用可用量, 不动在库量
    let (request, reservation) = coordinator
        .request_cross_match(&request.request_id, "tech", now)
        .unwrap();
    assert_eq!(request.status, RequestStatus::CrossMatched);
    assert_eq!(reservation.units, 4);
    assert_eq!(reservation.status, ReservationStatus::Active);
    assert_eq!(repos.inventory.get_bucket(key, now).unwrap().quantity_on_hand, 10);
    assert_eq!(repos.inventory.available_units(key, now).unwrap(), 6);

    // 发血: 扣减在库量, 预约提交
    let request = coordinator
        .issue_blood(&request.request_id, "tech", now)
        .unwrap();
    assert_eq!(request.status, RequestStatus::Issued);
    assert_eq!(repos.inventory.get_bucket(key, now).unwrap().quantity_on_hand, 6);
    assert_eq!(repos.inventory.available_units(key, now).unwrap(), 6);

    let reservations = repos.reservations.find_by_request(&request.request_id).unwrap();
    assert_eq!(reservations.len(), 1);
    assert_eq!(reservations[0].status, ReservationStatus::Committed);
}

#[test]
fn test_cross_match_rejects_overdraft() {
    let (_tmp, conn) = create_test_db().unwrap();
    let coordinator = build_coordinator(conn.clone());
    let now = Utc::now();
    seed_stock(conn.clone(), BloodType::AbPos, BloodComponent::Platelets, 10, 30, now).unwrap();

    let first = submit_request(
        &coordinator,
        BloodType::AbPos,
        BloodComponent::Platelets,
        6,
        Urgency::Urgent,
        now,
    )
    .unwrap();
    coordinator
        .request_cross_match(&first.request_id, "tech", now)
        .unwrap();

    // 剩余可用 4, 请求 7 必须失败且报告可用量
    let second = submit_request(
        &coordinator,
        BloodType::AbPos,
        BloodComponent::Platelets,
        7,
        Urgency::Urgent,
        now,
    )
    .unwrap();
    let err = coordinator
        .request_cross_match(&second.request_id, "tech", now)
        .unwrap_err();
    match err {
        RepositoryError::InsufficientStock {
            requested,
            available,
            ..
        } => {
            assert_eq!(requested, 7);
            assert_eq!(available, 4);
        }
        other => panic!("expected InsufficientStock, got {:?}", other),
    }

    // 失败不留半写状态: 第二个请求仍为 PENDING, 无预约
    let repos = build_repos(conn);
    let stored = repos.requests.find_by_id(&second.request_id).unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Pending);
    assert!(repos
        .reservations
        .find_by_request(&second.request_id)
        .unwrap()
        .is_empty());
}

#[test]
fn test_cancel_releases_reservation() {
    let (_tmp, conn) = create_test_db().unwrap();
    let coordinator = build_coordinator(conn.clone());
    let repos = build_repos(conn.clone());
    let now = Utc::now();
    let key = BucketKey::new(BloodType::APos, BloodComponent::Ffp);

    seed_stock(conn, BloodType::APos, BloodComponent::Ffp, 8, 30, now).unwrap();

    let request = submit_request(
        &coordinator,
        BloodType::APos,
        BloodComponent::Ffp,
        5,
        Urgency::Routine,
        now,
    )
    .unwrap();
    coordinator
        .request_cross_match(&request.request_id, "tech", now)
        .unwrap();
    assert_eq!(repos.inventory.available_units(key, now).unwrap(), 3);

    // 取消归还可用量 (预约泄漏防护)
    let request = coordinator
        .cancel_request(&request.request_id, "doctor", Some("患者转院".to_string()), now)
        .unwrap();
    assert_eq!(request.status, RequestStatus::Cancelled);
    assert_eq!(repos.inventory.available_units(key, now).unwrap(), 8);

    let reservations = repos.reservations.find_by_request(&request.request_id).unwrap();
    assert_eq!(reservations[0].status, ReservationStatus::Released);
}

#[test]
fn test_failed_cross_match_leaves_no_reservation() {
    let (_tmp, conn) = create_test_db().unwrap();
    let coordinator = build_coordinator(conn.clone());
    let repos = build_repos(conn.clone());
    let now = Utc::now();

    // 空库存直接配血
    let request = submit_request(
        &coordinator,
        BloodType::ONeg,
        BloodComponent::Cryoprecipitate,
        1,
        Urgency::Emergency,
        now,
    )
    .unwrap();
    coordinator
        .request_cross_match(&request.request_id, "tech", now)
        .unwrap_err();

    let stored = repos.requests.find_by_id(&request.request_id).unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Pending);
    assert!(repos
        .reservations
        .find_by_request(&request.request_id)
        .unwrap()
        .is_empty());
}

#[test]
fn test_every_mutation_is_logged() {
    let (_tmp, conn) = create_test_db().unwrap();
    let coordinator = build_coordinator(conn.clone());
    let log_repo = ActionLogRepository::from_connection(conn.clone());
    let now = Utc::now();
    seed_stock(conn, BloodType::OPos, BloodComponent::PackedRbc, 10, 30, now).unwrap();

    let request = submit_request(
        &coordinator,
        BloodType::OPos,
        BloodComponent::PackedRbc,
        2,
        Urgency::Urgent,
        now,
    )
    .unwrap();
    coordinator
        .request_cross_match(&request.request_id, "tech", now)
        .unwrap();
    coordinator
        .issue_blood(&request.request_id, "tech", now)
        .unwrap();

    // 入库/提交/配血/发血各留一条痕
    let logs = log_repo.list_recent(10).unwrap();
    let types: Vec<&str> = logs.iter().map(|l| l.action_type.as_str()).collect();
    assert!(types.contains(&"RECORD_DONATION"));
    assert!(types.contains(&"SUBMIT_REQUEST"));
    assert!(types.contains(&"CROSS_MATCH"));
    assert!(types.contains(&"ISSUE_BLOOD"));
}
