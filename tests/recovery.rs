//! Worker restarts: committed state survives, staged state does not

mod common;

use common::*;
use minibank::common::{OpDescriptor, Record};

#[tokio::test]
async fn test_committed_balances_survive_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut w = spawn_worker(dir.path(), "p0", &[(2, "50.00"), (4, "0.00")]).await;
    {
        let coord = spawn_coordinator(dir.path(), vec![vec![w.endpoint(1)]]).await;
        let mut client = client(coord).await;
        let moved = client.transfer(2, 4, "20".parse().unwrap()).await.unwrap();
        assert_eq!(status_of(&moved), "OK");
        let created = client.create(6, "3.10".parse().unwrap()).await.unwrap();
        assert_eq!(status_of(&created), "OK");
        let deleted = client.delete(4).await.unwrap();
        assert_eq!(status_of(&deleted), "OK");
    }
    w.stop().await;

    let restarted = start_worker(dir.path(), w.snapshot.clone()).await;
    assert_eq!(balance_on(&restarted, 2).as_deref(), Some("30.00"));
    assert_eq!(balance_on(&restarted, 4), None);
    assert_eq!(balance_on(&restarted, 6).as_deref(), Some("3.10"));

    let text = std::fs::read_to_string(&w.snapshot).unwrap();
    assert_eq!(text, "2,30.00\n6,3.10\n");
}

#[tokio::test]
async fn test_prepared_without_commit_changes_nothing() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut w = spawn_worker(dir.path(), "p0", &[(2, "50.00")]).await;

    for i in 0..5 {
        let desc = OpDescriptor::Transfer {
            from: 2,
            to: 4,
            amount: "10".parse().unwrap(),
        };
        let resp = w.service.handle(&desc.to_prepare(&format!("tx_{}", i)));
        assert_eq!(status_of(&resp), "READY");
    }
    assert_eq!(w.service.ledger().staged_count(), 5);
    assert_eq!(balance_on(&w, 2).as_deref(), Some("50.00"));

    // an abort for one of them leaves the rest staged
    let aborted = w
        .service
        .handle(&Record::request("ABORT").with("tx_id", "tx_0"));
    assert_eq!(status_of(&aborted), "ABORTED");
    assert_eq!(w.service.ledger().staged_count(), 4);

    w.stop().await;
    let restarted = start_worker(dir.path(), w.snapshot.clone()).await;
    assert_eq!(restarted.service.ledger().staged_count(), 0);
    assert_eq!(balance_on(&restarted, 2).as_deref(), Some("50.00"));
    assert_eq!(balance_on(&restarted, 4), None);

    // a commit for a transaction staged before the restart is unknown now
    let late = restarted
        .service
        .handle(&Record::request("COMMIT").with("tx_id", "tx_1"));
    assert_eq!(late.get("error"), Some("NotFound"));
}
