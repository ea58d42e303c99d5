//! Gate REST adapter against a local HTTP server.

mod support;

use derivlink::adapter::GateClient;
use derivlink::domain::{OrderRequest, OrderSide, Platform, PositionSide};
use derivlink::infrastructure::sign::{hmac_sha512_hex, sha512_hex};
use derivlink::port::ExchangeClient;
use derivlink::testkit::config::{account, services};
use derivlink::testkit::http::MockHttpServer;
use rust_decimal_macros::dec;

use support::fixtures::gate_basics;
use support::json_body;

const ORDERS: &str = "/api/v4/futures/usdt/orders";

fn placed(size: i64, reduce_only: bool) -> String {
    format!(
        r#"{{"id":58828,"text":"t-abc","contract":"BTC_USDT","size":{size},"left":{size},
            "price":"0","fill_price":"0","status":"open","is_reduce_only":{reduce_only},
            "tif":"ioc","create_time":1700000000.123}}"#
    )
}

async fn gate() -> (MockHttpServer, GateClient) {
    let server = MockHttpServer::start().await.expect("bind mock server");
    gate_basics(&server);
    let client =
        GateClient::new(&account(Platform::Gate, &server.url()), services()).expect("build client");
    (server, client)
}

#[tokio::test]
async fn base_quantity_becomes_signed_contract_size() {
    let (server, client) = gate().await;
    server.ok("POST", ORDERS, placed(-100, false));

    let request = OrderRequest::market("BTC/USDT", OrderSide::Sell, dec!(0.01));
    let order = client.create_order(&request).await.expect("accepted");
    assert_eq!(order.order_id, "58828");
    assert_eq!(order.quantity, dec!(0.01));
    assert_eq!(order.side, OrderSide::Sell);
    assert_eq!(order.position_side, Some(PositionSide::Short));
    assert_eq!(order.create_time, 1_700_000_000_123);

    let sent = &server.requests_to(ORDERS)[0];
    let body = json_body(&sent.body);
    assert_eq!(body["contract"], "BTC_USDT");
    assert_eq!(body["size"], -100);
    assert_eq!(body["price"], "0");
    assert_eq!(body["tif"], "ioc");
    assert_eq!(body["reduce_only"], false);
    assert!(body["text"].as_str().unwrap().starts_with("t-"));
}

#[tokio::test]
async fn first_order_switches_account_to_dual_mode() {
    let (server, client) = gate().await;
    server.ok("POST", ORDERS, placed(100, false));

    let request = OrderRequest::market("BTCUSDT", OrderSide::Buy, dec!(0.01));
    client.create_order(&request).await.expect("first");
    client.create_order(&request).await.expect("second");

    let switches = server.requests_to("/api/v4/futures/usdt/dual_mode");
    assert_eq!(switches.len(), 1);
    assert_eq!(switches[0].query_values("dual_mode"), ["true"]);
}

#[tokio::test]
async fn rejected_dual_mode_switch_does_not_block_orders() {
    let (server, client) = gate().await;
    server.respond(
        "POST",
        "/api/v4/futures/usdt/dual_mode",
        400,
        r#"{"label":"POSITION_NOT_EMPTY","message":"position not empty"}"#,
    );
    server.ok("POST", ORDERS, placed(100, false));

    let request = OrderRequest::market("BTCUSDT", OrderSide::Buy, dec!(0.01));
    assert!(client.create_order(&request).await.is_ok());
}

#[tokio::test]
async fn labelled_error_is_surfaced_with_label() {
    let (server, client) = gate().await;
    server.respond(
        "POST",
        ORDERS,
        400,
        r#"{"label":"INSUFFICIENT_AVAILABLE","message":"balance not enough"}"#,
    );

    let request = OrderRequest::market("BTCUSDT", OrderSide::Buy, dec!(0.01));
    let err = client.create_order(&request).await.expect_err("rejected");
    let api = err.api().expect("venue error");
    assert_eq!(api.code, "INSUFFICIENT_AVAILABLE");
    assert!(api.message.starts_with("INSUFFICIENT_AVAILABLE"));
    assert_eq!(server.requests_to(ORDERS).len(), 1);
}

#[tokio::test]
async fn request_signature_covers_body_digest() {
    let (server, client) = gate().await;
    server.ok("POST", ORDERS, placed(100, false));

    let request = OrderRequest::market("BTCUSDT", OrderSide::Buy, dec!(0.01));
    client.create_order(&request).await.expect("accepted");

    let sent = &server.requests_to(ORDERS)[0];
    let timestamp = sent.header("Timestamp").expect("timestamp header");
    let prehash = format!("POST\n{ORDERS}\n\n{}\n{timestamp}", sha512_hex(&sent.body));
    assert_eq!(
        sent.header("SIGN"),
        Some(hmac_sha512_hex("test-secret", &prehash).as_str())
    );
    assert_eq!(sent.header("KEY"), Some("test-key"));
}

#[tokio::test]
async fn full_close_uses_auto_size() {
    let (server, client) = gate().await;
    server.ok(
        "GET",
        "/api/v4/futures/usdt/positions",
        r#"[{"contract":"BTC_USDT","size":-300,"mode":"dual_short","entry_price":"50000",
            "mark_price":"49900","unrealised_pnl":"3","leverage":"10","margin":"15",
            "liq_price":"55000"}]"#,
    );
    server.ok("POST", ORDERS, placed(0, true));

    let order = client
        .close_position("BTCUSDT", PositionSide::Short, dec!(0))
        .await
        .expect("closed");
    assert_eq!(order.position_side, Some(PositionSide::Short));
    assert_eq!(order.quantity, dec!(0.03));

    let body = json_body(&server.requests_to(ORDERS)[0].body);
    assert_eq!(body["auto_size"], "close_short");
    assert_eq!(body["size"], 0);
    assert_eq!(body["reduce_only"], true);
}

#[tokio::test]
async fn balance_includes_unrealised_pnl() {
    let (server, client) = gate().await;
    server.ok(
        "GET",
        "/api/v4/futures/usdt/accounts",
        r#"{"total":"1000","available":"700","unrealised_pnl":"25","position_margin":"250",
            "order_margin":"50","currency":"USDT"}"#,
    );

    let balance = client.get_balance().await.expect("balance");
    assert_eq!(balance.total_balance, dec!(1025));
    assert_eq!(balance.available_balance, dec!(700));
    assert_eq!(balance.frozen_balance, dec!(300));
    assert_eq!(balance.currency, "USDT");
}
