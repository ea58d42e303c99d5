//! Account registry and client cache driven through a local venue.

mod support;

use std::sync::Arc;

use derivlink::app::ExchangeManager;
use derivlink::domain::Platform;
use derivlink::error::Error;
use derivlink::testkit::config::{account, services};
use derivlink::testkit::http::MockHttpServer;
use rust_decimal_macros::dec;

use support::fixtures::binance_basics;

const BALANCE: &str = r#"[{"asset":"USDT","balance":"250","availableBalance":"200","crossUnPnl":"0"}]"#;

async fn linked(id: &str) -> (MockHttpServer, ExchangeManager) {
    let server = MockHttpServer::start().await.expect("bind mock server");
    binance_basics(&server);
    let manager = ExchangeManager::new(services());
    let mut config = account(Platform::Binance, &server.url());
    config.id = id.to_string();
    manager.register(config);
    (server, manager)
}

#[tokio::test]
async fn connection_test_reports_balance() {
    let (server, manager) = linked("desk").await;
    server.ok("GET", "/fapi/v2/balance", BALANCE);

    let balance = manager.test_connection("desk").await.expect("healthy");
    assert_eq!(balance.total_balance, dec!(250));
    assert_eq!(balance.available_balance, dec!(200));
    assert_eq!(manager.cached_count(), 1);
}

#[tokio::test]
async fn rejected_key_is_reported_as_fatal() {
    let (server, manager) = linked("desk").await;
    server.respond(
        "GET",
        "/fapi/v2/balance",
        401,
        r#"{"code":-2015,"msg":"Invalid API-key, IP, or permissions for action."}"#,
    );

    let err = manager.test_connection("desk").await.expect_err("rejected");
    assert!(err.is_fatal());
    assert_eq!(server.requests_to("/fapi/v2/balance").len(), 1);
}

#[tokio::test]
async fn clients_are_reused_until_unregistered() {
    let (server, manager) = linked("desk").await;
    server.ok("GET", "/fapi/v2/balance", BALANCE);

    let first = manager.get_exchange("desk").expect("client");
    manager.test_connection("desk").await.expect("healthy");
    let second = manager.get_exchange("desk").expect("client");
    assert!(Arc::ptr_eq(&first, &second));

    assert!(manager.unregister("desk"));
    assert_eq!(manager.cached_count(), 0);
    assert!(matches!(
        manager.test_connection("desk").await,
        Err(Error::Validation(_))
    ));
}

#[tokio::test]
async fn accounts_on_one_venue_share_the_clock() {
    let server = MockHttpServer::start().await.expect("bind mock server");
    binance_basics(&server);
    server.ok("GET", "/fapi/v2/balance", BALANCE);

    let manager = ExchangeManager::new(services());
    for id in ["alpha", "beta"] {
        let mut config = account(Platform::Binance, &server.url());
        config.id = id.to_string();
        manager.register(config);
    }
    assert_eq!(manager.account_ids(), ["alpha", "beta"]);

    manager.test_connection("alpha").await.expect("alpha healthy");
    manager.test_connection("beta").await.expect("beta healthy");
    assert_eq!(server.requests_to("/fapi/v2/balance").len(), 2);
    // Same key on both accounts, so the offset is synced once.
    assert_eq!(server.requests_to("/fapi/v1/time").len(), 1);
}

#[tokio::test]
async fn private_stream_matches_account_platform() {
    let (_server, manager) = linked("desk").await;
    let stream = manager.private_stream("desk").expect("stream");
    assert_eq!(stream.platform(), Platform::Binance);
    assert!(!stream.is_running());
}
