//! File claim arbitration: concurrent races, TTL take-over, and owner
//! checks across sessions.

mod common;

use std::sync::Arc;

use stigmergy::adapters::sqlite::SqliteClaimRepository;
use stigmergy::domain::models::ClaimStatus;
use stigmergy::services::ClaimService;

async fn service() -> ClaimService {
    ClaimService::new(Arc::new(SqliteClaimRepository::new(common::pool().await)))
}

#[tokio::test]
async fn concurrent_claims_have_exactly_one_winner() {
    let claims = service().await;

    let (first, second) = tokio::join!(
        claims.claim("src/x.py", "p", "S1", None),
        claims.claim("src/x.py", "p", "S2", None),
    );
    let first = first.unwrap();
    let second = second.unwrap();

    let winners = [&first, &second]
        .iter()
        .filter(|status| !status.is_held())
        .count();
    assert_eq!(winners, 1, "exactly one session may win the race");

    // The loser learns the winner's identity.
    let loser = if first.is_held() { &first } else { &second };
    match loser {
        ClaimStatus::Held { by } => assert!(by == "S1" || by == "S2"),
        ClaimStatus::Free => panic!("one claim must be denied"),
    }
}

#[tokio::test]
async fn winner_visible_to_concurrent_check() {
    let claims = service().await;

    let granted = claims.claim("src/x.py", "p", "S1", None).await.unwrap();
    assert_eq!(granted, ClaimStatus::Free);

    let seen = claims.check("src/x.py", "p", "S2").await.unwrap();
    assert_eq!(seen, ClaimStatus::Held { by: "S1".into() });
}

#[tokio::test]
async fn expired_claim_taken_over_and_check_reports_new_owner() {
    let claims = service().await;

    // S1 claims with a TTL that elapses immediately.
    claims.claim("src/x.py", "p", "S1", Some(0)).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

    // Without a release, S2's fresh claim succeeds by take-over.
    let taken = claims.claim("src/x.py", "p", "S2", None).await.unwrap();
    assert_eq!(taken, ClaimStatus::Free);

    let seen = claims.check("src/x.py", "p", "S1").await.unwrap();
    assert_eq!(seen, ClaimStatus::Held { by: "S2".into() });
}

#[tokio::test]
async fn release_by_non_owner_leaves_claim_intact() {
    let claims = service().await;
    claims.claim("src/x.py", "p", "S1", None).await.unwrap();

    assert!(!claims.release("src/x.py", "p", "S2").await.unwrap());
    assert_eq!(
        claims.check("src/x.py", "p", "S2").await.unwrap(),
        ClaimStatus::Held { by: "S1".into() }
    );

    assert!(claims.release("src/x.py", "p", "S1").await.unwrap());
    assert_eq!(
        claims.check("src/x.py", "p", "S2").await.unwrap(),
        ClaimStatus::Free
    );
}

#[tokio::test]
async fn claim_status_wire_shape() {
    let claims = service().await;
    claims.claim("src/x.py", "p", "S1", None).await.unwrap();

    let held = claims.check("src/x.py", "p", "S2").await.unwrap().to_json();
    assert_eq!(held["claimed"], serde_json::json!(true));
    assert_eq!(held["by"], serde_json::json!("S1"));

    let free = claims.check("other.py", "p", "S2").await.unwrap().to_json();
    assert_eq!(free, serde_json::json!({ "claimed": false }));
}
