//! Canned venue responses.

use derivlink::testkit::http::MockHttpServer;

use super::now_ms;

pub fn binance_basics(server: &MockHttpServer) {
    server.ok("GET", "/fapi/v1/time", format!(r#"{{"serverTime":{}}}"#, now_ms()));
    server.ok("POST", "/fapi/v1/positionSide/dual", r#"{"code":200,"msg":"success"}"#);
    server.ok("POST", "/fapi/v1/marginType", r#"{"code":200,"msg":"success"}"#);
    server.ok(
        "GET",
        "/fapi/v1/exchangeInfo",
        r#"{"symbols":[{"symbol":"BTCUSDT","baseAsset":"BTC","quoteAsset":"USDT",
            "pricePrecision":1,"quantityPrecision":3,"filters":[
            {"filterType":"PRICE_FILTER","tickSize":"0.10","minPrice":"0.1"},
            {"filterType":"LOT_SIZE","stepSize":"0.001","minQty":"0.001","maxQty":"1000"},
            {"filterType":"MIN_NOTIONAL","notional":"100"}]}]}"#,
    );
}

pub fn binance_order_ack() -> &'static str {
    r#"{"orderId":987654321,"clientOrderId":"c1","symbol":"BTCUSDT","side":"SELL",
        "positionSide":"LONG","type":"MARKET","price":"0","origQty":"0.010","executedQty":"0",
        "avgPrice":"0","status":"NEW","updateTime":1700000000000}"#
}

pub fn okx_basics(server: &MockHttpServer) {
    server.ok(
        "GET",
        "/api/v5/public/time",
        format!(r#"{{"code":"0","msg":"","data":[{{"ts":"{}"}}]}}"#, now_ms()),
    );
    server.ok(
        "GET",
        "/api/v5/public/instruments",
        r#"{"code":"0","msg":"","data":[{"instId":"BTC-USDT-SWAP","ctVal":"0.01",
            "ctValCcy":"BTC","settleCcy":"USDT","lotSz":"1","minSz":"1","tickSz":"0.1",
            "lever":"100","state":"live"}]}"#,
    );
}

pub fn gate_basics(server: &MockHttpServer) {
    server.ok(
        "GET",
        "/api/v4/spot/time",
        format!(r#"{{"server_time":{}}}"#, now_ms()),
    );
    server.ok(
        "GET",
        "/api/v4/futures/usdt/contracts",
        r#"[{"name":"BTC_USDT","quanto_multiplier":"0.0001","order_size_min":1,
            "order_size_round":1,"order_price_round":"0.1","leverage_max":"125"}]"#,
    );
    server.ok("POST", "/api/v4/futures/usdt/dual_mode", r#"{"in_dual_mode":true}"#);
}

pub fn bitget_time(server: &MockHttpServer) {
    server.ok(
        "GET",
        "/api/v2/public/time",
        format!(
            r#"{{"code":"00000","msg":"success","data":{{"serverTime":"{}"}}}}"#,
            now_ms()
        ),
    );
}
