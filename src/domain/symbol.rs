//! Canonical symbols and per-instrument trading rules.
//!
//! The canonical form is the concatenated, uppercase pair (`BTCUSDT`). Every
//! venue-native spelling (`BTC-USDT-SWAP`, `BTC_USDT`, `BTC/USDT`) normalizes to
//! it, and [`SymbolFormat::to_venue`] maps it back deterministically.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::{OrderSide, Platform};

const QUOTES: [&str; 5] = ["USDT", "USDC", "BUSD", "USD", "DAI"];
const CONTRACT_SUFFIXES: [&str; 3] = ["SWAP", "PERP", "UMCBL"];

/// Stateless symbol translation between canonical and venue forms.
pub struct SymbolFormat;

impl SymbolFormat {
    /// Canonical form: uppercase, contract suffixes and separators removed.
    #[must_use]
    pub fn normalize(symbol: &str) -> String {
        let mut s = symbol.trim().to_uppercase();
        for suffix in CONTRACT_SUFFIXES {
            for sep in ['-', '_'] {
                let tagged = format!("{sep}{suffix}");
                if let Some(stripped) = s.strip_suffix(&tagged) {
                    s = stripped.to_string();
                }
            }
        }
        s.retain(|c| !matches!(c, '/' | '-' | '_' | ' ' | ':'));
        for suffix in CONTRACT_SUFFIXES {
            if s.len() > suffix.len() + 3 {
                if let Some(stripped) = s.strip_suffix(suffix) {
                    s = stripped.to_string();
                }
            }
        }
        s
    }

    /// Split a symbol into `(base, quote)`.
    ///
    /// Known quote assets are matched first; otherwise the last four characters
    /// are treated as the quote.
    #[must_use]
    pub fn parse(symbol: &str) -> (String, String) {
        let normalized = Self::normalize(symbol);
        for quote in QUOTES {
            if let Some(base) = normalized.strip_suffix(quote) {
                if !base.is_empty() {
                    return (base.to_string(), quote.to_string());
                }
            }
        }
        if normalized.len() > 4 {
            let split = normalized.len() - 4;
            return (normalized[..split].to_string(), normalized[split..].to_string());
        }
        (normalized, String::new())
    }

    /// Venue-native instrument name.
    #[must_use]
    pub fn to_venue(platform: Platform, symbol: &str) -> String {
        match platform {
            Platform::Binance | Platform::Bitget => Self::normalize(symbol),
            Platform::Okx => Self::join(symbol, "-", "-SWAP"),
            Platform::Gate => Self::join(symbol, "_", ""),
        }
    }

    /// Canonical symbol from a venue-native instrument name.
    #[must_use]
    pub fn from_venue(symbol: &str) -> String {
        Self::normalize(symbol)
    }

    fn join(symbol: &str, sep: &str, suffix: &str) -> String {
        let normalized = Self::normalize(symbol);
        for quote in ["USDT", "USDC"] {
            if let Some(base) = normalized.strip_suffix(quote) {
                if !base.is_empty() {
                    return format!("{base}{sep}{quote}{suffix}");
                }
            }
        }
        normalized
    }
}

/// Trading rules for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    pub base_coin: String,
    pub quote_coin: String,
    pub price_precision: u32,
    pub qty_precision: u32,
    /// Price increment; zero when unknown.
    pub tick_size: Decimal,
    /// Base-quantity increment; zero when unknown.
    pub step_size: Decimal,
    /// Minimum base quantity.
    pub min_qty: Decimal,
    pub max_leverage: u32,
    /// Base-asset quantity per venue contract (1 for base-denominated venues).
    pub contract_size: Decimal,
    pub min_notional: Decimal,
}

impl SymbolInfo {
    #[must_use]
    pub fn new(symbol: &str) -> Self {
        let (base_coin, quote_coin) = SymbolFormat::parse(symbol);
        Self {
            symbol: SymbolFormat::normalize(symbol),
            base_coin,
            quote_coin,
            price_precision: 0,
            qty_precision: 0,
            tick_size: Decimal::ZERO,
            step_size: Decimal::ZERO,
            min_qty: Decimal::ZERO,
            max_leverage: 0,
            contract_size: Decimal::ONE,
            min_notional: Decimal::ZERO,
        }
    }

    /// Round a base quantity to the step.
    ///
    /// Opening orders round up and are lifted to at least `min_qty` so the
    /// requested exposure is never undershot; reduce-only orders round down so
    /// they never exceed the position.
    #[must_use]
    pub fn round_quantity(&self, qty: Decimal, reduce_only: bool) -> Decimal {
        let strategy = if reduce_only {
            RoundingStrategy::ToZero
        } else {
            RoundingStrategy::AwayFromZero
        };
        let mut rounded = round_to_step(qty, self.step_size, strategy);
        if !reduce_only && self.min_qty > Decimal::ZERO && rounded < self.min_qty {
            rounded = self.min_qty;
        }
        rounded.normalize()
    }

    /// Round a limit price to the tick: BUY rounds down, SELL rounds up.
    #[must_use]
    pub fn round_price(&self, price: Decimal, side: OrderSide) -> Decimal {
        let strategy = match side {
            OrderSide::Buy => RoundingStrategy::ToZero,
            OrderSide::Sell => RoundingStrategy::AwayFromZero,
        };
        round_to_step(price, self.tick_size, strategy).normalize()
    }
}

/// Round `value` to a multiple of `step`. A non-positive step leaves it as is.
#[must_use]
pub fn round_to_step(value: Decimal, step: Decimal, strategy: RoundingStrategy) -> Decimal {
    if step <= Decimal::ZERO {
        return value;
    }
    (value / step).round_dp_with_strategy(0, strategy) * step
}

/// Number of decimal places in a step such as `0.001` (3).
#[must_use]
pub fn decimals_of(step: Decimal) -> u32 {
    step.normalize().scale()
}
