pub mod black76;

use serde_json::Value;
use std::str::FromStr;

pub const FUTURE_PRICE: &str = "future_price";
pub const STRIKE: &str = "strike";
pub const TIME_TO_MATURITY: &str = "time_to_maturity";
pub const RISK_FREE_RATE: &str = "risk_free_rate";
pub const VOLATILITY: &str = "volatility";
pub const OPTION_TYPE: &str = "option_type";

/// Pricing validation failures. Flat and mutually exclusive; the first
/// violated check wins (missing, kind, option type, positivity).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PricingError {
    #[error("missing value for {field}")]
    MissingValue { field: &'static str },

    #[error("{field} must be {expected}")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
    },

    #[error("option type must be 'call' or 'put', got '{0}'")]
    InvalidOptionType(String),

    #[error("{field} must be greater than 0, got {value}")]
    NonPositiveValue { field: &'static str, value: f64 },
}

impl PricingError {
    pub fn kind(&self) -> &'static str {
        match self {
            PricingError::MissingValue { .. } => "missing_value",
            PricingError::TypeMismatch { .. } => "type_mismatch",
            PricingError::InvalidOptionType(_) => "invalid_option_type",
            PricingError::NonPositiveValue { .. } => "non_positive_value",
        }
    }
}

// ── Option type ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl FromStr for OptionType {
    type Err = PricingError;

    /// Case-insensitive; surrounding whitespace is not stripped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("call") {
            Ok(Self::Call)
        } else if s.eq_ignore_ascii_case("put") {
            Ok(Self::Put)
        } else {
            Err(PricingError::InvalidOptionType(s.to_string()))
        }
    }
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "call"),
            Self::Put => write!(f, "put"),
        }
    }
}

// ── Validated request ──

/// A fully validated Black-76 input set. Fields are private: the only ways
/// to obtain one run the checks, so the formula never sees bad inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingRequest {
    future_price: f64,
    strike: f64,
    time_to_maturity: f64,
    risk_free_rate: f64,
    volatility: f64,
    option_type: OptionType,
}

impl PricingRequest {
    pub fn new(
        future_price: f64,
        strike: f64,
        time_to_maturity: f64,
        risk_free_rate: f64,
        volatility: f64,
        option_type: OptionType,
    ) -> Result<Self, PricingError> {
        let numerics = [
            (FUTURE_PRICE, future_price),
            (STRIKE, strike),
            (TIME_TO_MATURITY, time_to_maturity),
            (RISK_FREE_RATE, risk_free_rate),
            (VOLATILITY, volatility),
        ];

        for (field, value) in numerics {
            if !value.is_finite() {
                return Err(PricingError::TypeMismatch { field, expected: "a real number" });
            }
        }

        for (field, value) in numerics {
            if value <= 0.0 {
                return Err(PricingError::NonPositiveValue { field, value });
            }
        }

        Ok(Self {
            future_price,
            strike,
            time_to_maturity,
            risk_free_rate,
            volatility,
            option_type,
        })
    }

    #[inline]
    pub fn future_price(&self) -> f64 {
        self.future_price
    }

    #[inline]
    pub fn strike(&self) -> f64 {
        self.strike
    }

    #[inline]
    pub fn time_to_maturity(&self) -> f64 {
        self.time_to_maturity
    }

    #[inline]
    pub fn risk_free_rate(&self) -> f64 {
        self.risk_free_rate
    }

    #[inline]
    pub fn volatility(&self) -> f64 {
        self.volatility
    }

    #[inline]
    pub fn option_type(&self) -> OptionType {
        self.option_type
    }
}

// ── Raw inputs (the untyped boundary) ──

/// Caller-supplied values before validation. Absent and `null` both land
/// as `None`; anything else is kept verbatim so kind errors can be reported.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct PricingInputs {
    #[serde(default, alias = "underlying_price")]
    pub future_price: Option<Value>,
    #[serde(default)]
    pub strike: Option<Value>,
    #[serde(default, alias = "maturity")]
    pub time_to_maturity: Option<Value>,
    #[serde(default)]
    pub risk_free_rate: Option<Value>,
    #[serde(default)]
    pub volatility: Option<Value>,
    #[serde(default)]
    pub option_type: Option<Value>,
}

impl PricingInputs {
    /// Convenience for callers holding plain numbers and a textual type.
    pub fn from_parts(
        future_price: f64,
        strike: f64,
        time_to_maturity: f64,
        risk_free_rate: f64,
        volatility: f64,
        option_type: &str,
    ) -> Self {
        Self {
            future_price: Some(Value::from(future_price)),
            strike: Some(Value::from(strike)),
            time_to_maturity: Some(Value::from(time_to_maturity)),
            risk_free_rate: Some(Value::from(risk_free_rate)),
            volatility: Some(Value::from(volatility)),
            option_type: Some(Value::from(option_type)),
        }
    }

    fn numeric_fields(&self) -> [(&'static str, Option<&Value>); 5] {
        [
            (FUTURE_PRICE, self.future_price.as_ref()),
            (STRIKE, self.strike.as_ref()),
            (TIME_TO_MATURITY, self.time_to_maturity.as_ref()),
            (RISK_FREE_RATE, self.risk_free_rate.as_ref()),
            (VOLATILITY, self.volatility.as_ref()),
        ]
    }

    /// Runs the checks in fixed order and stops at the first failure:
    /// 1. every field present, 2. numerics are real numbers and the type is
    /// text, 3. the type names call or put, 4. numerics are strictly positive.
    pub fn validate(&self) -> Result<PricingRequest, PricingError> {
        // 1. Presence
        for (field, value) in self.numeric_fields() {
            if value.is_none() {
                return Err(PricingError::MissingValue { field });
            }
        }
        if self.option_type.is_none() {
            return Err(PricingError::MissingValue { field: OPTION_TYPE });
        }

        // 2. Kinds
        let mut numbers = [0.0_f64; 5];
        for (slot, (field, value)) in numbers.iter_mut().zip(self.numeric_fields()) {
            *slot = as_real(field, value)?;
        }
        let option_type = match &self.option_type {
            Some(Value::String(s)) => s.as_str(),
            Some(_) => {
                return Err(PricingError::TypeMismatch {
                    field: OPTION_TYPE,
                    expected: "a string",
                })
            }
            None => return Err(PricingError::MissingValue { field: OPTION_TYPE }),
        };

        // 3. Option type
        let option_type: OptionType = option_type.parse()?;

        // 4. Positivity
        let [future_price, strike, time_to_maturity, risk_free_rate, volatility] = numbers;
        PricingRequest::new(
            future_price,
            strike,
            time_to_maturity,
            risk_free_rate,
            volatility,
            option_type,
        )
    }
}

fn as_real(field: &'static str, value: Option<&Value>) -> Result<f64, PricingError> {
    match value {
        None | Some(Value::Null) => Err(PricingError::MissingValue { field }),
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or(PricingError::TypeMismatch { field, expected: "a real number" }),
        Some(_) => Err(PricingError::TypeMismatch { field, expected: "a real number" }),
    }
}
