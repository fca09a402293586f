//! Realized volatility from a close-price series.

/// Trading days used to annualize daily volatility
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Log returns `ln(c[i] / c[i-1])` of consecutive closes
pub fn log_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .map(|pair| (pair[1] / pair[0]).ln())
        .collect()
}

/// Annualized historical volatility of a close-price series
///
/// Sample standard deviation (N−1) of log returns, scaled by √252.
/// Returns 0 when there are fewer than two closes. Exactly two closes
/// also return 0: the plain N−1 formula would divide by zero there and
/// yield NaN, which this deliberately does not follow.
/// Non-positive closes yield non-finite log returns which propagate into
/// the result; callers validate prices upstream.
pub fn historical_volatility(closes: &[f64]) -> f64 {
    if closes.len() < 2 {
        return 0.0;
    }

    let returns = log_returns(closes);
    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);

    variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt()
}
