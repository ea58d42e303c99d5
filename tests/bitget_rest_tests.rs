//! Bitget REST adapter against a local HTTP server.

mod support;

use std::time::{Duration, Instant};

use derivlink::adapter::BitgetClient;
use derivlink::domain::{Platform, PositionSide};
use derivlink::infrastructure::sign::hmac_sha256_base64;
use derivlink::port::ExchangeClient;
use derivlink::testkit::config::{account, services};
use derivlink::testkit::http::MockHttpServer;
use rust_decimal_macros::dec;

use support::fixtures::bitget_time;
use support::json_body;

const ACCOUNTS: &str = "/api/v2/mix/account/accounts";

async fn bitget() -> (MockHttpServer, BitgetClient) {
    let server = MockHttpServer::start().await.expect("bind mock server");
    bitget_time(&server);
    let client = BitgetClient::new(&account(Platform::Bitget, &server.url()), services())
        .expect("build client");
    (server, client)
}

#[tokio::test]
async fn non_success_code_on_ok_status_is_an_error() {
    let (server, client) = bitget().await;
    server.ok(
        "GET",
        ACCOUNTS,
        r#"{"code":"40034","msg":"Parameter productType does not exist","data":null}"#,
    );

    let err = client.get_balance().await.expect_err("body-level failure");
    let api = err.api().expect("venue error");
    assert_eq!(api.code, "40034");
    assert_eq!(api.status, 200);
    assert!(!err.is_timestamp_expired());
    assert_eq!(server.requests_to(ACCOUNTS).len(), 1);
}

#[tokio::test]
async fn balance_is_signed_and_mapped() {
    let (server, client) = bitget().await;
    server.ok(
        "GET",
        ACCOUNTS,
        r#"{"code":"00000","msg":"success","data":[{"marginCoin":"USDT","accountEquity":"900",
            "available":"600","locked":"300","unrealizedPL":"12"}]}"#,
    );

    let balance = client.get_balance().await.expect("balance");
    assert_eq!(balance.total_balance, dec!(900));
    assert_eq!(balance.available_balance, dec!(600));
    assert_eq!(balance.frozen_balance, dec!(300));
    assert_eq!(balance.unrealized_pnl, dec!(12));

    let sent = &server.requests_to(ACCOUNTS)[0];
    let timestamp = sent.header("ACCESS-TIMESTAMP").expect("timestamp header");
    let prehash = format!("{timestamp}GET{ACCOUNTS}?{}", sent.query);
    assert_eq!(
        sent.header("ACCESS-SIGN"),
        Some(hmac_sha256_base64("test-secret", &prehash).as_str())
    );
    assert_eq!(sent.header("ACCESS-PASSPHRASE"), Some("test-passphrase"));
    assert_eq!(sent.query_values("productType"), ["USDT-FUTURES"]);
}

#[tokio::test]
async fn expired_timestamp_resyncs_once_then_surfaces() {
    let (server, client) = bitget().await;
    server.ok(
        "GET",
        ACCOUNTS,
        r#"{"code":"40008","msg":"Request timestamp expired","data":null}"#,
    );

    let err = client.get_balance().await.expect_err("still expired");
    assert!(err.is_timestamp_expired());
    assert!(err.is_fatal());
    assert_eq!(server.requests_to(ACCOUNTS).len(), 2);
    assert_eq!(server.requests_to("/api/v2/public/time").len(), 2);
}

const PLACE_ORDER: &str = "/api/v2/mix/order/place-order";
const CLOSE_POSITIONS: &str = "/api/v2/mix/order/close-positions";

fn contracts(server: &MockHttpServer) {
    server.ok(
        "GET",
        "/api/v2/mix/market/contracts",
        r#"{"code":"00000","msg":"success","data":[{"symbol":"BTCUSDT","baseCoin":"BTC",
            "quoteCoin":"USDT","pricePlace":"1","priceEndStep":"1","volumePlace":"3",
            "minTradeNum":"0.001","maxLever":"125","sizeMultiplier":"0.001","minTradeUSDT":"5"}]}"#,
    );
}

fn short_position(server: &MockHttpServer) {
    server.ok(
        "GET",
        "/api/v2/mix/position/single-position",
        r#"{"code":"00000","msg":"success","data":[{"symbol":"BTCUSDT","holdSide":"short",
            "total":"0.02","available":"0.02","openPriceAvg":"50000","markPrice":"49900",
            "unrealizedPL":"2","leverage":"10","marginMode":"isolated","marginSize":"100"}]}"#,
    );
}

#[tokio::test]
async fn partial_close_is_a_reduce_only_order_with_hold_side() {
    let (server, client) = bitget().await;
    contracts(&server);
    server.ok(
        "POST",
        PLACE_ORDER,
        r#"{"code":"00000","msg":"success","data":{"orderId":"1001","clientOid":"c1"}}"#,
    );

    let order = client
        .close_position("BTC/USDT", PositionSide::Short, dec!(0.0155))
        .await
        .expect("close accepted");
    assert_eq!(order.order_id, "1001");

    let sent = json_body(&server.requests_to(PLACE_ORDER)[0].body);
    assert_eq!(sent["symbol"], "BTCUSDT");
    assert_eq!(sent["side"], "sell");
    assert_eq!(sent["tradeSide"], "close");
    assert_eq!(sent["holdSide"], "short");
    assert_eq!(sent["size"], "0.015");
    assert_eq!(sent["marginMode"], "isolated");
    assert!(server.requests_to(CLOSE_POSITIONS).is_empty());
}

#[tokio::test]
async fn full_close_prefers_flash_close() {
    let (server, client) = bitget().await;
    short_position(&server);
    server.ok(
        "POST",
        CLOSE_POSITIONS,
        r#"{"code":"00000","msg":"success","data":{"successList":[{"orderId":"77","clientOid":""}],
            "failureList":[]}}"#,
    );

    let order = client
        .close_position("BTCUSDT", PositionSide::Short, dec!(0))
        .await
        .expect("flash close accepted");
    assert_eq!(order.order_id, "77");
    assert_eq!(order.quantity, dec!(0.02));

    let sent = json_body(&server.requests_to(CLOSE_POSITIONS)[0].body);
    assert_eq!(sent["holdSide"], "short");
    assert!(server.requests_to(PLACE_ORDER).is_empty());
}

#[tokio::test]
async fn rejected_flash_close_falls_back_to_reduce_only() {
    let (server, client) = bitget().await;
    contracts(&server);
    short_position(&server);
    server.ok(
        "POST",
        CLOSE_POSITIONS,
        r#"{"code":"22002","msg":"No position to close","data":null}"#,
    );
    server.ok(
        "POST",
        PLACE_ORDER,
        r#"{"code":"00000","msg":"success","data":{"orderId":"1002","clientOid":"c2"}}"#,
    );

    let order = client
        .close_position("BTCUSDT", PositionSide::Short, dec!(0))
        .await
        .expect("fallback accepted");
    assert_eq!(order.order_id, "1002");

    let sent = json_body(&server.requests_to(PLACE_ORDER)[0].body);
    assert_eq!(sent["size"], "0.02");
    assert_eq!(sent["tradeSide"], "close");
}

#[tokio::test]
async fn every_request_waits_for_its_slot() {
    let (server, client) = bitget().await;
    server.ok(
        "GET",
        ACCOUNTS,
        r#"{"code":"00000","msg":"success","data":[{"marginCoin":"USDT","accountEquity":"1",
            "available":"1","locked":"0","unrealizedPL":"0"}]}"#,
    );
    client.server_time().await.expect("server time");

    let start = Instant::now();
    for _ in 0..3 {
        client.get_balance().await.expect("balance");
    }
    assert!(start.elapsed() >= Duration::from_millis(300));
    assert_eq!(server.requests_to(ACCOUNTS).len(), 3);
}
