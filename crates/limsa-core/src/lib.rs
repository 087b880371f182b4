//! Definition and validation of multi-chain Markov models.
//!
//! A model is a set of chains (disease, resistance, treatment, ...), each a
//! directed graph of states whose edges carry per-cycle transition
//! probabilities. Probabilities are either derived from calibrated raw inputs
//! (static) or left for the simulation engine to resolve (dynamic).
//! Interactions let occupancy in one chain adjust an edge in another.

pub mod builder;
pub mod chain_graph;
pub mod conversion;
pub mod error;
pub mod export;
pub mod math_expression;
pub mod render;
pub mod store;
pub mod types;
pub mod validation;

pub use builder::ModelBuilder;
pub use chain_graph::ChainGraph;
pub use conversion::{RateConversion, RateError, DEFAULT_LARGE_RATE_THRESHOLD, QUARTERLY};
pub use error::{ModelError, Result};
pub use export::{
    export_inputs, serialize_chain, GraphDocument, GraphEdge, GraphNode, InteractionDocument,
    ModelExport,
};
pub use math_expression::{
    DerivedValue, InputContext, MathExpression, MathExpressionError, RateExpression,
    RESERVED_SLUGS,
};
pub use render::{DotRenderer, GraphRenderer};
pub use store::{MemoryStore, ModelSnapshot, ModelStore, StoreError, StoreResult, Tables};
pub use types::*;
pub use validation::{
    validate, validate_with, IssueKind, ValidationConfig, ValidationIssue, ValidationReport,
};
