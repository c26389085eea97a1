use axum::http::StatusCode;
use axum_test::TestServer;
use ledger_core::{Difficulty, LedgerConfig, MiningCoordinator};
use ledger_node::{router, AppState};
use serde_json::{json, Value};

fn server() -> TestServer {
    let coordinator = MiningCoordinator::from_config(LedgerConfig {
        difficulty: Difficulty::ZeroBits(4),
        ..LedgerConfig::default()
    });
    TestServer::new(router(AppState::new(coordinator))).expect("test server")
}

#[tokio::test]
async fn liveness_probes() {
    let server = server();
    for path in ["/ping", "/health", "/healthz"] {
        let response = server.get(path).await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let json: Value = response.json();
        assert_eq!(json["status"], "ok");
    }
}

#[tokio::test]
async fn submit_mine_and_query() {
    let server = server();

    let response = server
        .post("/transactions")
        .json(&json!({ "from": "alice", "to": "bob", "amount": 5.0 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let json: Value = response.json();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["tx"]["from"], "alice");
    assert_eq!(json["tx"]["amount"], 5.0);
    let tx_id = json["tx"]["id"].as_str().expect("id").to_string();

    let json: Value = server.get("/mempool").await.json();
    assert_eq!(json["count"], 1);
    assert_eq!(json["pending"][0]["id"], tx_id.as_str());

    let json: Value = server.get("/balance/bob").await.json();
    assert_eq!(json["address"], "bob");
    assert_eq!(json["balance"], 5.0);

    let response = server.post("/mine").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let json: Value = response.json();
    assert_eq!(json["status"], "mined");
    assert_eq!(json["block"]["index"], 1);
    let txs = json["block"]["transactions"].as_array().expect("transactions");
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0]["from"], "network");
    assert_eq!(txs[0]["to"], "miner-reward");
    assert_eq!(txs[1]["id"], tx_id.as_str());

    let json: Value = server.get("/mempool").await.json();
    assert_eq!(json["count"], 0);

    let json: Value = server.get("/chain").await.json();
    assert_eq!(json["length"], 2);
    assert_eq!(json["chain"][1]["previous_hash"], json["chain"][0]["hash"]);

    let json: Value = server.get("/chain/head").await.json();
    assert_eq!(json["height"], 1);

    let json: Value = server.get("/chain/validate").await.json();
    assert_eq!(json["valid"], true);

    let json: Value = server.get("/balance/alice").await.json();
    assert_eq!(json["balance"], -5.0);
}

#[tokio::test]
async fn mine_accepts_params() {
    let server = server();
    for i in 0..3 {
        server
            .post("/transactions")
            .json(&json!({ "from": "alice", "to": format!("u{i}"), "amount": 1.0 }))
            .await;
    }
    let response = server
        .post("/mine")
        .json(&json!({ "max_txs": 2, "miner": "carol" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let json: Value = response.json();
    let txs = json["block"]["transactions"].as_array().expect("transactions");
    assert_eq!(txs.len(), 3);
    assert_eq!(txs[0]["to"], "carol");

    let json: Value = server.get("/mempool").await.json();
    assert_eq!(json["count"], 1);

    let json: Value = server.get("/balance/carol").await.json();
    assert_eq!(json["balance"], 1.0);
}

#[tokio::test]
async fn rejects_invalid_transactions() {
    let server = server();

    let response = server
        .post("/transactions")
        .json(&json!({ "from": "alice", "to": "bob", "amount": -1.0 }))
        .expect_failure()
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let json: Value = response.json();
    assert!(json["error"].as_str().unwrap().contains("amount"));

    let response = server
        .post("/transactions")
        .json(&json!({ "from": "", "to": "bob", "amount": 1.0 }))
        .expect_failure()
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = server
        .post("/transactions")
        .json(&json!({ "from": "alice", "to": "bob" }))
        .expect_failure()
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = server
        .post("/transactions")
        .json(&json!({ "from": "network", "to": "bob", "amount": 1.0 }))
        .expect_failure()
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let json: Value = server.get("/mempool").await.json();
    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn mine_rejects_malformed_body() {
    let server = server();
    let response = server
        .post("/mine")
        .text("{not json")
        .expect_failure()
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let json: Value = server.get("/chain").await.json();
    assert_eq!(json["length"], 1);
}

#[tokio::test]
async fn mine_rejects_null_and_mistyped_bodies() {
    let server = server();
    for body in ["null", r#"{"max_txs":"two"}"#] {
        let response = server.post("/mine").text(body).expect_failure().await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn cancelled_mining_is_service_unavailable() {
    let coordinator = MiningCoordinator::from_config(LedgerConfig {
        difficulty: Difficulty::ZeroBits(4),
        ..LedgerConfig::default()
    });
    let shutdown = coordinator.shutdown_token();
    let server = TestServer::new(router(AppState::new(coordinator))).expect("test server");

    server
        .post("/transactions")
        .json(&json!({ "from": "alice", "to": "bob", "amount": 5.0 }))
        .await;
    shutdown.cancel();

    let response = server.post("/mine").expect_failure().await;
    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    let json: Value = response.json();
    assert!(json["error"].as_str().is_some());

    let json: Value = server.get("/mempool").await.json();
    assert_eq!(json["count"], 1);
    let json: Value = server.get("/chain").await.json();
    assert_eq!(json["length"], 1);
}

#[tokio::test]
async fn unknown_address_has_zero_balance() {
    let json: Value = server().get("/balance/nobody").await.json();
    assert_eq!(json["balance"], 0.0);
}
