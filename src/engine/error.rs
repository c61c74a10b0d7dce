use thiserror::Error;

/// Failures the engine can raise while deciding orders for one symbol.
///
/// All of these are local to the symbol being processed: the sweep loop
/// logs and alerts, then moves on to the next symbol. Nothing here halts
/// the process.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Market price was zero or negative; no sizing or banding is possible.
    #[error("invalid market quote for {code}: {price}")]
    InvalidQuote { code: String, price: f64 },

    /// No trailing std dev row exists for the symbol and lookback range.
    #[error("no trailing std dev for {code} over {range} days")]
    MissingVolatility { code: String, range: u32 },

    /// The volatility adjustment collapsed to zero or below; a zero-width
    /// band has no meaning and the clamp loops would never terminate.
    #[error("non-positive band adjustment for {code}: {adj_pct}")]
    InvalidVolatility { code: String, adj_pct: f64 },

    /// A sell rests at or below an unclosed buy. The history cannot be
    /// paired chronologically, so the engine refuses to guess an anchor.
    #[error(
        "inconsistent execution history for {code}: sell at {sell_price} \
         rests at or below open buy at {buy_price}"
    )]
    InconsistentHistory {
        code: String,
        sell_price: f64,
        buy_price: f64,
    },

    /// The broker rejected a place/cancel command (non-zero error code).
    #[error("broker {op} failed for {code} (error {error_code}): {message}")]
    Broker {
        op: &'static str,
        code: String,
        error_code: i32,
        message: String,
    },
}
