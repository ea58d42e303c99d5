//! Loading configuration files with environment-supplied secrets.
//!
//! Each test uses its own account id so environment overrides never leak
//! between tests running in parallel.

use std::io::Write;

use derivlink::config::Config;
use derivlink::domain::Platform;
use derivlink::error::{ConfigError, Error};
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(content.as_bytes()).expect("write config");
    file
}

#[test]
fn file_with_every_section_loads() {
    let file = write_config(
        r#"
        [logging]
        level = "debug"
        format = "json"

        [retry]
        max_retries = 5

        [connection]
        ping_interval_ms = 10000
        max_reconnects = 7

        [[accounts]]
        id = "load-main"
        platform = "gate"
        api_key = "k"
        secret_key = "s"
        rest_url = "http://127.0.0.1:8080"

        [accounts.proxy]
        host = "10.0.0.1"
        port = 1080

        [watch]
        platform = "binance"
        symbols = ["BTCUSDT", "ETH/USDT"]
        intervals = ["1m"]
        "#,
    );

    let config = Config::load(file.path()).expect("valid config");
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.retry.max_retries, 5);
    assert_eq!(config.connection.max_reconnects, 7);
    let account = config.account("load-main").expect("account");
    assert_eq!(account.platform, Platform::Gate);
    assert_eq!(account.rest_url.as_deref(), Some("http://127.0.0.1:8080"));
    assert!(account.proxy.is_some());
    assert_eq!(config.watch.platform, Some(Platform::Binance));
    assert_eq!(config.watch.symbols.len(), 2);
}

#[test]
fn environment_supplies_missing_secrets() {
    std::env::set_var("DERIVLINK_ENV_OKX_API_KEY", "from-env-key");
    std::env::set_var("DERIVLINK_ENV_OKX_SECRET_KEY", "from-env-secret");
    std::env::set_var("DERIVLINK_ENV_OKX_PASSPHRASE", "from-env-pass");

    let file = write_config(
        r#"
        [[accounts]]
        id = "env-okx"
        platform = "okx"
        "#,
    );
    let config = Config::load(file.path()).expect("secrets from environment");
    let account = config.account("env-okx").expect("account");
    assert_eq!(account.api_key, "from-env-key");
    assert_eq!(account.secret_key, "from-env-secret");
    assert_eq!(account.passphrase, "from-env-pass");
}

#[test]
fn missing_passphrase_is_rejected() {
    let file = write_config(
        r#"
        [[accounts]]
        id = "nopass-bitget"
        platform = "bitget"
        api_key = "k"
        secret_key = "s"
        "#,
    );
    assert!(matches!(
        Config::load(file.path()),
        Err(Error::Config(ConfigError::MissingField {
            field: "passphrase"
        }))
    ));
}

#[test]
fn unknown_platform_is_a_parse_error() {
    let file = write_config(
        r#"
        [[accounts]]
        id = "bad-platform"
        platform = "kraken"
        api_key = "k"
        secret_key = "s"
        "#,
    );
    assert!(matches!(
        Config::load(file.path()),
        Err(Error::Config(ConfigError::Parse(_)))
    ));
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    assert!(matches!(
        Config::load(dir.path().join("absent.toml")),
        Err(Error::Config(ConfigError::ReadFile(_)))
    ));
}

#[test]
fn zero_buffer_is_rejected() {
    let file = write_config(
        r#"
        [connection]
        buffer_size = 0
        "#,
    );
    assert!(matches!(
        Config::load(file.path()),
        Err(Error::Config(ConfigError::InvalidValue {
            field: "connection.buffer_size",
            ..
        }))
    ));
}
