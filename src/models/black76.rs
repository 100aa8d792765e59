use crate::models::{OptionType, PricingError, PricingInputs, PricingRequest};
use statrs::distribution::{ContinuousCDF, Normal};

/// Black-76 price of a European option on a future.
///
/// d1 = (ln(F/K) + sigma^2/2 * T) / (sigma * sqrt(T))
/// d2 = d1 - sigma * sqrt(T)
/// call = e^(-rT) * (F * Phi(d1) - K * Phi(d2))
/// put  = e^(-rT) * (K * Phi(-d2) - F * Phi(-d1))
///
/// Pure function of an already validated request: every input is finite and
/// strictly positive, so ln, sqrt and the division are always in domain.
/// d1 and d2 are formed as ln(F/K)/(sigma*sqrt(T)) +/- sigma*sqrt(T)/2 so
/// sigma^2*T is never materialised and huge volatilities stay finite.
#[inline]
pub fn price(req: &PricingRequest) -> f64 {
    let f = req.future_price();
    let k = req.strike();
    let t = req.time_to_maturity();
    let sigma = req.volatility();

    let sigma_sqrt_t = sigma * t.sqrt();
    let moneyness = (f / k).ln() / sigma_sqrt_t;
    let d1 = moneyness + 0.5 * sigma_sqrt_t;
    let d2 = moneyness - 0.5 * sigma_sqrt_t;
    let discount = (-req.risk_free_rate() * t).exp();

    let undiscounted = match req.option_type() {
        OptionType::Call => f * norm_cdf(d1) - k * norm_cdf(d2),
        OptionType::Put => k * norm_cdf(-d2) - f * norm_cdf(-d1),
    };

    // Cancellation can leave a few ulps below zero far out of the money
    (discount * undiscounted).max(0.0)
}

/// Validated entry point for typed callers.
pub fn price_option(
    future_price: f64,
    strike: f64,
    time_to_maturity: f64,
    risk_free_rate: f64,
    volatility: f64,
    option_type: OptionType,
) -> Result<f64, PricingError> {
    let req = PricingRequest::new(
        future_price,
        strike,
        time_to_maturity,
        risk_free_rate,
        volatility,
        option_type,
    )?;
    Ok(price(&req))
}

/// Validated entry point for untyped callers (HTTP bodies, stored records).
pub fn price_inputs(inputs: &PricingInputs) -> Result<f64, PricingError> {
    let req = inputs.validate()?;
    let value = price(&req);
    tracing::debug!(option_type = %req.option_type(), price = value, "black-76 priced");
    Ok(value)
}

/// Standard normal CDF (erfc based, ~1e-15 absolute error).
#[inline]
pub fn norm_cdf(x: f64) -> f64 {
    Normal::standard().cdf(x)
}
