//! Reconnecting sockets, public market feeds and private sessions against a
//! local WebSocket server.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use derivlink::adapter::{BinanceMarketProtocol, OkxPrivateStream};
use derivlink::config::ConnectionConfig;
use derivlink::domain::{Platform, PrivateEvent, PrivateEventKind};
use derivlink::infrastructure::{ConnectionManager, ConnectionState, Heartbeat, PublicMarketStream};
use derivlink::port::PrivateStream;
use derivlink::testkit::config::{account, fast_connection, services};
use derivlink::testkit::ws::MockWsServer;
use parking_lot::Mutex;
use rust_decimal_macros::dec;

use support::eventually;

const WAIT: Duration = Duration::from_secs(5);

fn contains_all(frames: &[String], wanted: &[&str]) -> bool {
    wanted.iter().all(|w| frames.iter().any(|f| f == w))
}

#[tokio::test]
async fn saved_subscriptions_are_replayed_after_reconnect() {
    let server = MockWsServer::start().await.expect("bind ws server");
    let connection =
        ConnectionManager::new("replay", server.url(), fast_connection(), Heartbeat::Ping);

    let connected = Arc::new(AtomicUsize::new(0));
    let disconnected = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connected);
    connection.on_connected(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let counter = Arc::clone(&disconnected);
    connection.on_disconnected(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    connection.connect().await.expect("connect");
    for i in 0..3 {
        connection
            .subscribe(format!("key-{i}"), format!("sub-{i}"))
            .await
            .expect("subscribe");
    }
    let wanted = ["sub-0", "sub-1", "sub-2"];
    assert!(server.wait_for(WAIT, |frames| contains_all(frames, &wanted)).await);

    server.clear_received();
    server.drop_clients();

    assert!(server.wait_for_accepted(2, WAIT).await);
    assert!(server.wait_for(WAIT, |frames| contains_all(frames, &wanted)).await);
    assert!(eventually(WAIT, || connected.load(Ordering::SeqCst) == 2).await);
    assert_eq!(disconnected.load(Ordering::SeqCst), 1);
    assert_eq!(connection.subscription_count(), 3);
    assert!(connection.is_connected());

    connection.disconnect().await;
    assert_eq!(connection.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn removed_subscription_is_not_replayed() {
    let server = MockWsServer::start().await.expect("bind ws server");
    let connection =
        ConnectionManager::new("remove", server.url(), fast_connection(), Heartbeat::Ping);
    connection.connect().await.expect("connect");

    connection.subscribe("keep", "sub-keep").await.expect("subscribe");
    connection.subscribe("drop", "sub-drop").await.expect("subscribe");
    assert!(connection.remove_subscription("drop"));
    assert!(server.wait_for(WAIT, |frames| frames.len() == 2).await);

    server.clear_received();
    server.drop_clients();
    assert!(server.wait_for_accepted(2, WAIT).await);
    assert!(server.wait_for(WAIT, |frames| frames.iter().any(|f| f == "sub-keep")).await);
    assert!(!server.received().iter().any(|f| f == "sub-drop"));

    connection.disconnect().await;
}

#[tokio::test]
async fn gives_up_after_max_reconnects() {
    let server = MockWsServer::start().await.expect("bind ws server");
    let connection =
        ConnectionManager::new("terminal", server.url(), fast_connection(), Heartbeat::Ping);

    let terminal = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&terminal);
    connection.on_terminal_failure(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    connection.connect().await.expect("connect");
    drop(server);

    assert!(eventually(WAIT, || terminal.load(Ordering::SeqCst) == 1).await);
    assert_eq!(connection.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn unanswered_ping_reconnects_after_pong_timeout() {
    let server = MockWsServer::start().await.expect("bind ws server");
    let config = ConnectionConfig {
        ping_interval_ms: 1000,
        pong_timeout_ms: 100,
        ..fast_connection()
    };
    let connection =
        ConnectionManager::new("silent", server.url(), config, Heartbeat::Text("ping".into()));

    let reasons = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reasons);
    connection.on_disconnected(move |reason| sink.lock().push(reason.to_string()));

    let start = Instant::now();
    connection.connect().await.expect("connect");

    // One ping interval plus the pong timeout, well before a second ping.
    assert!(server.wait_for_accepted(2, Duration::from_millis(1700)).await);
    assert!(start.elapsed() >= Duration::from_millis(1000));
    assert_eq!(reasons.lock().as_slice(), ["pong timeout"]);
    assert!(server.received().iter().any(|frame| frame == "ping"));

    connection.disconnect().await;
}

#[tokio::test]
async fn messages_reach_the_handler_in_order() {
    let server = MockWsServer::start().await.expect("bind ws server");
    let connection =
        ConnectionManager::new("order", server.url(), fast_connection(), Heartbeat::Ping);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    connection.on_message(move |_, text| sink.lock().push(text));
    connection.connect().await.expect("connect");
    assert!(server.wait_for_accepted(1, WAIT).await);

    for i in 0..20 {
        server.broadcast(i.to_string());
    }
    assert!(eventually(WAIT, || seen.lock().len() == 20).await);
    let expected: Vec<String> = (0..20).map(|i| i.to_string()).collect();
    assert_eq!(*seen.lock(), expected);

    connection.disconnect().await;
}

#[tokio::test]
async fn public_stream_merges_ticker_and_mark_price() {
    let server = MockWsServer::start().await.expect("bind ws server");
    let stream = PublicMarketStream::new(
        Arc::new(BinanceMarketProtocol::with_url(server.url())),
        fast_connection(),
    );
    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ticks);
    stream.set_on_ticker(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    stream.subscribe_ticker("BTC/USDT").await.expect("subscribe ticker");
    stream.subscribe_kline("BTCUSDT", "1m").await.expect("subscribe kline");
    assert_eq!(stream.connection_count().await, 1);
    assert!(
        server
            .wait_for(WAIT, |frames| {
                ["btcusdt@ticker", "btcusdt@markPrice@1s", "btcusdt@kline_1m"]
                    .iter()
                    .all(|s| frames.iter().any(|f| f.contains(s)))
            })
            .await
    );

    server.broadcast(r#"{"e":"markPriceUpdate","E":1,"s":"BTCUSDT","p":"50001","i":"50002"}"#);
    server.broadcast(
        r#"{"e":"24hrTicker","E":2,"s":"BTCUSDT","c":"50000.5","P":"1.2","h":"51000",
            "l":"49000","v":"100","q":"5000000"}"#,
    );
    server.broadcast(
        r#"{"e":"kline","E":3,"s":"BTCUSDT","k":{"t":60000,"T":119999,"i":"1m",
            "o":"1","c":"2","h":"3","l":"0.5","v":"10"}}"#,
    );

    assert!(eventually(WAIT, || stream.klines("BTCUSDT", "1m", 10).len() == 1).await);
    let ticker = stream.ticker("BTC-USDT-SWAP").expect("cached ticker");
    assert_eq!(ticker.last_price, dec!(50000.5));
    assert_eq!(ticker.mark_price, dec!(50001));
    assert_eq!(ticker.index_price, dec!(50002));
    assert_eq!(ticks.load(Ordering::SeqCst), 1);

    stream.unsubscribe_ticker("BTCUSDT").await;
    assert_eq!(stream.connection_count().await, 1);
    stream.unsubscribe_kline("BTCUSDT", "1m").await;
    assert_eq!(stream.connection_count().await, 0);
    assert!(stream.ticker("BTCUSDT").is_none());
}

#[tokio::test]
async fn private_session_logs_in_again_after_reconnect() {
    let server = MockWsServer::start().await.expect("bind ws server");
    server.set_responder(|text| {
        text.contains(r#""op":"login""#)
            .then(|| r#"{"event":"login","code":"0","msg":"","connId":"c1"}"#.to_string())
    });

    let account = account(Platform::Okx, "http://127.0.0.1:9").with_private_ws_url(server.url());
    let stream = OkxPrivateStream::for_account(&account, &services());
    let events: Arc<Mutex<Vec<PrivateEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    stream.set_on_event(Arc::new(move |event| sink.lock().push(event)));

    stream.start().await.expect("start");
    assert!(stream.is_running());

    let logins = |frames: &[String]| frames.iter().filter(|f| f.contains(r#""op":"login""#)).count();
    let subscribes =
        |frames: &[String]| frames.iter().filter(|f| f.contains(r#""op":"subscribe""#)).count();
    assert!(server.wait_for(WAIT, |frames| subscribes(frames) == 1).await);
    assert_eq!(logins(&server.received()), 1);

    server.broadcast(
        r#"{"arg":{"channel":"orders","instType":"SWAP","uid":"1"},
            "data":[{"instId":"BTC-USDT-SWAP","ordId":"1","state":"filled"}]}"#,
    );
    assert!(eventually(WAIT, || events.lock().len() == 1).await);
    {
        let events = events.lock();
        assert_eq!(events[0].kind, PrivateEventKind::Order);
        assert_eq!(events[0].symbol, "BTCUSDT");
        assert_eq!(events[0].platform, Platform::Okx);
        assert!(events[0].raw.contains(r#""ordId":"1""#));
    }

    server.drop_clients();
    assert!(server.wait_for_accepted(2, WAIT).await);
    assert!(server.wait_for(WAIT, |frames| subscribes(frames) == 2).await);
    assert_eq!(logins(&server.received()), 2);

    stream.stop().await;
    assert!(!stream.is_running());
}

#[tokio::test]
async fn private_stream_stops_running_once_reconnects_are_exhausted() {
    let server = MockWsServer::start().await.expect("bind ws server");
    let account = account(Platform::Okx, "http://127.0.0.1:9").with_private_ws_url(server.url());
    let stream = OkxPrivateStream::for_account(&account, &services());

    stream.start().await.expect("start");
    assert!(server.wait_for_accepted(1, WAIT).await);
    assert!(stream.is_running());

    drop(server);
    assert!(eventually(WAIT, || !stream.is_running()).await);

    stream.stop().await;
}
