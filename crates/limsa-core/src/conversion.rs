//! Annual-to-cycle rate conversion.
//!
//! Source literature reports annual rates; the simulation steps in cycles
//! (quarters by default). [`RateConversion::Linear`] divides by the number of
//! cycles per year, which is only a good approximation while rates are small.
//! [`RateConversion::Compounding`] is the exact form `1 - (1 - r)^(1/n)` for
//! rates that behave like annual probabilities.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Quarterly cycles, the reference policy
pub const QUARTERLY: u32 = 4;

/// Annual rates above this are poorly served by linear scaling
pub const DEFAULT_LARGE_RATE_THRESHOLD: f64 = 0.25;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RateError {
    #[error("rate {0} is not a finite number")]
    NonFinite(f64),
    #[error("rate {0} is negative")]
    Negative(f64),
    #[error("rate {rate} is outside the domain of {conversion} conversion")]
    OutOfDomain { rate: f64, conversion: RateConversion },
    #[error("a year must contain at least one cycle")]
    ZeroCycles,
}

/// Policy turning an annual rate into a per-cycle probability
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RateConversion {
    /// `r / n`
    Linear { cycles_per_year: u32 },
    /// `1 - (1 - r)^(1/n)`, requires `r <= 1`
    Compounding { cycles_per_year: u32 },
}

impl Default for RateConversion {
    fn default() -> Self {
        Self::Linear {
            cycles_per_year: QUARTERLY,
        }
    }
}

impl fmt::Display for RateConversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear { cycles_per_year } => write!(f, "linear/{}", cycles_per_year),
            Self::Compounding { cycles_per_year } => write!(f, "compounding/{}", cycles_per_year),
        }
    }
}

impl RateConversion {
    pub fn linear(cycles_per_year: u32) -> Self {
        Self::Linear { cycles_per_year }
    }

    pub fn compounding(cycles_per_year: u32) -> Self {
        Self::Compounding { cycles_per_year }
    }

    pub fn cycles_per_year(&self) -> u32 {
        match self {
            Self::Linear { cycles_per_year } | Self::Compounding { cycles_per_year } => {
                *cycles_per_year
            }
        }
    }

    pub fn is_linear(&self) -> bool {
        matches!(self, Self::Linear { .. })
    }

    /// Convert an annual rate to a per-cycle rate
    pub fn convert(&self, annual_rate: f64) -> Result<f64, RateError> {
        let cycles = self.checked_cycles()?;
        check_rate(annual_rate)?;
        match self {
            Self::Linear { .. } => Ok(annual_rate / cycles),
            Self::Compounding { .. } => {
                if annual_rate > 1.0 {
                    return Err(RateError::OutOfDomain {
                        rate: annual_rate,
                        conversion: *self,
                    });
                }
                Ok(1.0 - (1.0 - annual_rate).powf(1.0 / cycles))
            }
        }
    }

    /// Inverse of [`convert`](Self::convert)
    pub fn deconvert(&self, cycle_rate: f64) -> Result<f64, RateError> {
        let cycles = self.checked_cycles()?;
        check_rate(cycle_rate)?;
        match self {
            Self::Linear { .. } => Ok(cycle_rate * cycles),
            Self::Compounding { .. } => {
                if cycle_rate > 1.0 {
                    return Err(RateError::OutOfDomain {
                        rate: cycle_rate,
                        conversion: *self,
                    });
                }
                Ok(1.0 - (1.0 - cycle_rate).powf(cycles))
            }
        }
    }

    fn checked_cycles(&self) -> Result<f64, RateError> {
        match self.cycles_per_year() {
            0 => Err(RateError::ZeroCycles),
            n => Ok(f64::from(n)),
        }
    }
}

fn check_rate(rate: f64) -> Result<(), RateError> {
    if !rate.is_finite() {
        return Err(RateError::NonFinite(rate));
    }
    if rate < 0.0 {
        return Err(RateError::Negative(rate));
    }
    Ok(())
}
