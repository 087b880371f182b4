//! Error types for model construction
//!
//! Every variant here is fatal to the rebuild that raised it. Structural
//! problems that are only advisory are reported as
//! [`ValidationIssue`](crate::validation::ValidationIssue)s instead.

use thiserror::Error;

use crate::conversion::RateError;
use crate::math_expression::MathExpressionError;
use crate::store::StoreError;

/// Result type alias for model construction
pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("chain '{0}' already exists")]
    DuplicateChain(String),

    #[error("state '{state}' already exists in chain '{chain}'")]
    DuplicateState { chain: String, state: String },

    #[error("raw input {field} '{value}' is already taken")]
    DuplicateRawInput { field: &'static str, value: String },

    #[error("raw input slug '{0}' is reserved for a formula constant")]
    ReservedSlug(String),

    #[error("chain '{0}' not found")]
    ChainNotFound(String),

    #[error("state '{state}' not found in chain '{chain}'")]
    StateNotFound { chain: String, state: String },

    #[error("raw input '{0}' not found")]
    RawInputNotFound(String),

    #[error("reference '{0}' not found")]
    ReferenceNotFound(String),

    /// An edge or interaction whose endpoints are not all in the required chain
    #[error("cross-chain edge: {from} -> {to} must both belong to chain '{chain}'")]
    CrossChainEdge {
        chain: String,
        from: String,
        to: String,
    },

    #[error("invalid rate for {context}: {source}")]
    InvalidRate {
        context: String,
        #[source]
        source: RateError,
    },

    #[error("formula error in {context}: {source}")]
    Formula {
        context: String,
        #[source]
        source: MathExpressionError,
    },

    /// Storage collaborator rejected a write or query; never retried
    #[error("save failed: {0}")]
    SaveFailed(#[from] StoreError),
}

impl ModelError {
    pub fn state_not_found(chain: impl Into<String>, state: impl Into<String>) -> Self {
        Self::StateNotFound {
            chain: chain.into(),
            state: state.into(),
        }
    }

    pub fn invalid_rate(context: impl Into<String>, source: RateError) -> Self {
        Self::InvalidRate {
            context: context.into(),
            source,
        }
    }

    /// Unknown slugs become [`ModelError::RawInputNotFound`]
    pub fn formula(context: impl Into<String>, source: MathExpressionError) -> Self {
        match source {
            MathExpressionError::VariableNotFound(slug) => Self::RawInputNotFound(slug),
            source => Self::Formula {
                context: context.into(),
                source,
            },
        }
    }
}
