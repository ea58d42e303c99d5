//! OKX REST adapter against a local HTTP server.

mod support;

use derivlink::adapter::OkxClient;
use derivlink::domain::{MarginMode, OrderRequest, OrderSide, Platform, PositionSide};
use derivlink::error::Error;
use derivlink::infrastructure::sign::hmac_sha256_base64;
use derivlink::port::ExchangeClient;
use derivlink::testkit::config::{account, services};
use derivlink::testkit::http::MockHttpServer;
use rust_decimal_macros::dec;

use support::fixtures::okx_basics;
use support::json_body;

async fn okx() -> (MockHttpServer, OkxClient) {
    let server = MockHttpServer::start().await.expect("bind mock server");
    okx_basics(&server);
    let client =
        OkxClient::new(&account(Platform::Okx, &server.url()), services()).expect("build client");
    (server, client)
}

#[tokio::test]
async fn base_quantity_becomes_whole_contracts() {
    let (server, client) = okx().await;
    server.ok(
        "POST",
        "/api/v5/trade/order",
        r#"{"code":"0","msg":"","data":[{"ordId":"312269865356374016","clOrdId":"abc","sCode":"0","sMsg":""}]}"#,
    );

    let request = OrderRequest::market("BTCUSDT", OrderSide::Buy, dec!(0.0033));
    let order = client.create_order(&request).await.expect("accepted");
    assert_eq!(order.order_id, "312269865356374016");
    assert_eq!(order.client_id, "abc");
    assert_eq!(order.quantity, dec!(0.01));
    assert_eq!(order.symbol, "BTCUSDT");

    let sent = &server.requests_to("/api/v5/trade/order")[0];
    let body = json_body(&sent.body);
    assert_eq!(body["instId"], "BTC-USDT-SWAP");
    assert_eq!(body["sz"], "1");
    assert_eq!(body["side"], "buy");
    assert_eq!(body["posSide"], "long");
    assert_eq!(body["tdMode"], "isolated");
    assert_eq!(body["ordType"], "market");
    assert!(body.get("reduceOnly").is_none());
}

#[tokio::test]
async fn request_signature_covers_path_query_and_body() {
    let (server, client) = okx().await;
    server.ok(
        "GET",
        "/api/v5/account/balance",
        r#"{"code":"0","msg":"","data":[{"totalEq":"1500","details":[
            {"ccy":"USDT","eq":"1500","availEq":"1200","frozenBal":"300","upl":"-4"}]}]}"#,
    );

    let balance = client.get_balance().await.expect("balance");
    assert_eq!(balance.total_balance, dec!(1500));
    assert_eq!(balance.available_balance, dec!(1200));

    let sent = &server.requests_to("/api/v5/account/balance")[0];
    let timestamp = sent.header("OK-ACCESS-TIMESTAMP").expect("timestamp header");
    let prehash = format!("{timestamp}GET/api/v5/account/balance?{}", sent.query);
    assert_eq!(
        sent.header("OK-ACCESS-SIGN"),
        Some(hmac_sha256_base64("test-secret", &prehash).as_str())
    );
    assert_eq!(sent.header("OK-ACCESS-KEY"), Some("test-key"));
    assert_eq!(sent.header("OK-ACCESS-PASSPHRASE"), Some("test-passphrase"));
    assert!(sent.header("x-simulated-trading").is_none());
}

#[tokio::test]
async fn item_error_on_success_status_is_surfaced() {
    let (server, client) = okx().await;
    server.ok(
        "POST",
        "/api/v5/trade/order",
        r#"{"code":"1","msg":"All operations failed","data":[{"ordId":"","clOrdId":"",
            "sCode":"51008","sMsg":"Order failed. Insufficient USDT margin in account"}]}"#,
    );

    let request = OrderRequest::market("BTCUSDT", OrderSide::Sell, dec!(0.05));
    let err = client.create_order(&request).await.expect_err("rejected");
    let api = err.api().expect("venue error");
    assert_eq!(api.code, "51008");
    assert_eq!(api.status, 200);
    assert!(api.message.contains("Insufficient"));
    assert_eq!(server.requests_to("/api/v5/trade/order").len(), 1);
}

#[tokio::test]
async fn full_close_uses_native_endpoint() {
    let (server, client) = okx().await;
    server.ok(
        "GET",
        "/api/v5/account/positions",
        r#"{"code":"0","msg":"","data":[{"instId":"BTC-USDT-SWAP","posSide":"long","pos":"3",
            "avgPx":"50000","markPx":"50100","upl":"3","lever":"10","mgnMode":"isolated",
            "margin":"15","liqPx":"45000"}]}"#,
    );
    server.ok(
        "POST",
        "/api/v5/trade/close-position",
        r#"{"code":"0","msg":"","data":[{"instId":"BTC-USDT-SWAP","posSide":"long","clOrdId":"cl-1"}]}"#,
    );

    let order = client
        .close_position("BTCUSDT", PositionSide::Long, dec!(0))
        .await
        .expect("closed");
    assert_eq!(order.quantity, dec!(0.03));
    assert_eq!(order.side, OrderSide::Sell);
    assert_eq!(order.client_id, "cl-1");

    let body = json_body(&server.requests_to("/api/v5/trade/close-position")[0].body);
    assert_eq!(body["posSide"], "long");
    assert_eq!(body["mgnMode"], "isolated");
    assert!(server.requests_to("/api/v5/trade/order").is_empty());
}

#[tokio::test]
async fn expired_timestamp_code_triggers_one_resync() {
    let (server, client) = okx().await;
    server.ok(
        "GET",
        "/api/v5/account/balance",
        r#"{"code":"50102","msg":"Timestamp request expired","data":[]}"#,
    );
    server.ok(
        "GET",
        "/api/v5/account/balance",
        r#"{"code":"0","msg":"","data":[{"totalEq":"1","details":[{"ccy":"USDT","eq":"1","availEq":"1"}]}]}"#,
    );

    let balance = client.get_balance().await.expect("retried");
    assert_eq!(balance.total_balance, dec!(1));
    assert_eq!(server.requests_to("/api/v5/public/time").len(), 2);
}

#[tokio::test]
async fn expired_timestamp_after_resync_is_fatal() {
    let (server, client) = okx().await;
    server.ok(
        "GET",
        "/api/v5/account/balance",
        r#"{"code":"50102","msg":"Timestamp request expired","data":[]}"#,
    );

    let err = client.get_balance().await.expect_err("still expired");
    assert!(err.is_timestamp_expired());
    assert!(err.is_fatal());
    assert_eq!(err.api().map(|api| api.code.as_str()), Some("50102"));
    assert_eq!(server.requests_to("/api/v5/account/balance").len(), 2);
}

#[tokio::test]
async fn symbol_info_is_in_base_units() {
    let (_server, client) = okx().await;

    let info = client.get_symbol_info("BTC/USDT").await.expect("instrument");
    assert_eq!(info.symbol, "BTCUSDT");
    assert_eq!(info.contract_size, dec!(0.01));
    assert_eq!(info.step_size, dec!(0.01));
    assert_eq!(info.min_qty, dec!(0.01));
    assert_eq!(info.max_leverage, 100);
}

#[tokio::test]
async fn leverage_is_set_on_both_position_sides() {
    let (server, client) = okx().await;
    server.ok(
        "POST",
        "/api/v5/account/set-leverage",
        r#"{"code":"0","msg":"","data":[{"instId":"BTC-USDT-SWAP","lever":"20","mgnMode":"isolated"}]}"#,
    );

    client.set_leverage("BTCUSDT", 20).await.expect("leverage set");

    let sent = server.requests_to("/api/v5/account/set-leverage");
    assert_eq!(sent.len(), 2);
    let sides: Vec<String> = sent
        .iter()
        .map(|r| json_body(&r.body)["posSide"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(sides, ["long", "short"]);
    let first = json_body(&sent[0].body);
    assert_eq!(first["instId"], "BTC-USDT-SWAP");
    assert_eq!(first["mgnMode"], "isolated");
    assert_eq!(first["lever"], "20");
}

#[tokio::test]
async fn cross_margin_is_rejected_locally() {
    let (server, client) = okx().await;

    client
        .set_margin_type("BTCUSDT", MarginMode::Isolated)
        .await
        .expect("isolated is the only mode");
    let err = client
        .set_margin_type("BTCUSDT", MarginMode::Crossed)
        .await
        .expect_err("cross rejected");
    assert!(matches!(err, Error::Validation(_)));
    assert!(server.requests().is_empty());
}
