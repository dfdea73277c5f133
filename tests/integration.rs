//! End-to-end flow through the coordinator

mod common;

use common::*;
use minibank::common::{Amount, Record, Status};

#[tokio::test]
async fn test_account_lifecycle() {
    let dir = tempfile::TempDir::new().unwrap();
    let p0 = spawn_worker(dir.path(), "p0_r0", &[]).await;
    let p1a = spawn_worker(dir.path(), "p1_r0", &[]).await;
    let p1b = spawn_worker(dir.path(), "p1_r1", &[]).await;
    let coord = spawn_coordinator(
        dir.path(),
        vec![vec![p0.endpoint(1)], vec![p1a.endpoint(2), p1b.endpoint(3)]],
    )
    .await;
    let mut client = client(coord).await;

    let created = client.create(7, "100".parse().unwrap()).await.unwrap();
    assert_eq!(status_of(&created), "OK");
    assert!(created.get("tx_id").unwrap().starts_with("tx_"));
    assert_eq!(balance_on(&p1a, 7).as_deref(), Some("100.00"));
    assert_eq!(balance_on(&p1b, 7).as_deref(), Some("100.00"));

    let balance = client.balance(7).await.unwrap();
    assert_eq!(balance.encode(), r#"{"status":"OK","account":7,"balance":100.00}"#);

    // no replica holds account 9: only the debit happens
    let moved = client.transfer(7, 9, "30".parse().unwrap()).await.unwrap();
    assert_eq!(status_of(&moved), "OK");
    assert_eq!(balance_on(&p1a, 7).as_deref(), Some("70.00"));
    assert_eq!(balance_on(&p1b, 7).as_deref(), Some("70.00"));
    assert_eq!(balance_on(&p1a, 9), None);
    assert_eq!(balance_on(&p0, 9), None);

    let overdraft = client.transfer(7, 9, "130".parse().unwrap()).await.unwrap();
    assert_eq!(status_of(&overdraft), "ERROR");
    assert_eq!(overdraft.get("error"), Some("ValidationFailed"));
    assert!(overdraft.get("tx_id").is_some());
    assert_eq!(balance_on(&p1a, 7).as_deref(), Some("70.00"));
    assert_eq!(p1a.service.ledger().staged_count(), 0);
    assert_eq!(p1b.service.ledger().staged_count(), 0);

    // both replicas of partition 1 write audit rows to the shared store
    let history = client.history(7).await.unwrap();
    let rows = history.list("data").unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0].get("kind"), Some("Debit"));
    assert_eq!(rows[0].get("amount"), Some("-30.00"));
    assert_eq!(rows[1].get("kind"), Some("Debit"));
    assert_eq!(rows[3].get("kind"), Some("Create"));

    let duplicate = client.create(7, Amount::ZERO).await.unwrap();
    assert_eq!(duplicate.get("error"), Some("ValidationFailed"));

    let deleted = client.delete(7).await.unwrap();
    assert_eq!(status_of(&deleted), "OK");
    let gone = client.balance(7).await.unwrap();
    assert_eq!(gone.get("error"), Some("NotFound"));

    let missing = client.delete(7).await.unwrap();
    assert_eq!(missing.get("error"), Some("ValidationFailed"));
}

#[tokio::test]
async fn test_protocol_errors_keep_connection_open() {
    let dir = tempfile::TempDir::new().unwrap();
    let w = spawn_worker(dir.path(), "w", &[(1, "5.00")]).await;
    let coord = spawn_coordinator(dir.path(), vec![vec![w.endpoint(1)]]).await;
    let mut client = client(coord).await;

    let unknown = client.send(&Record::request("FOO")).await.unwrap();
    assert_eq!(
        unknown.encode(),
        r#"{"status":"ERROR","error":"UnknownRequestType"}"#
    );

    let no_operand = client
        .send(&Record::request("TRANSFERIR_CUENTA").with("from", 1))
        .await
        .unwrap();
    assert_eq!(no_operand.get("error"), Some("ValidationFailed"));

    let fractional = client
        .send(
            &Record::request("CREAR_CUENTA")
                .with("account", 2)
                .with("initial", "1.005"),
        )
        .await
        .unwrap();
    assert_eq!(fractional.get("error"), Some("ValidationFailed"));

    // same connection still answers
    let ok = client.balance(1).await.unwrap();
    assert_eq!(ok.response_status(), Some(Status::Ok));
    assert_eq!(ok.get("balance"), Some("5.00"));
}

#[tokio::test]
async fn test_loan_status_through_coordinator() {
    use minibank::common::audit::{AccountHolder, LoanRecord, HOLDERS_FILE, LOANS_FILE};
    use minibank::common::FileAuditStore;

    let dir = tempfile::TempDir::new().unwrap();
    let store = FileAuditStore::open(dir.path().join("audit")).unwrap();
    store
        .append_rows(HOLDERS_FILE, &[AccountHolder { account: 1, client: 10 }])
        .unwrap();
    store
        .append_rows(
            LOANS_FILE,
            &[LoanRecord {
                loan_id: 77,
                client: 10,
                total: Amount::from_cents(200_000),
                outstanding: Amount::from_cents(150_000),
                state: "ACTIVE".into(),
                requested_at: "2024-05-20".into(),
            }],
        )
        .unwrap();

    let w = spawn_worker(dir.path(), "w", &[(1, "5.00")]).await;
    let coord = spawn_coordinator(dir.path(), vec![vec![w.endpoint(1)]]).await;
    let mut client = client(coord).await;

    let loans = client.loans(1).await.unwrap();
    let rows = loans.list("data").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("loan_id"), Some("77"));
    assert_eq!(rows[0].get("outstanding"), Some("1500.00"));

    let nobody = client.loans(2).await.unwrap();
    assert_eq!(nobody.get("error"), Some("NotFound"));
}
