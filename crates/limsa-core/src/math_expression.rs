//! # Derived-rate formulas
//!
//! Many transition rates are products or partitions of calibrated raw inputs,
//! e.g. `rate_slow_annual * (1.0 - prop_infectious)`. Formulas are evaluated
//! against an [`InputContext`] in which every raw input slug is a variable
//! bound to one point of its range (`low`, `value` or `high`).
//!
//! Every evaluation returns a [`DerivedValue`] that keeps the formula text and
//! the slugs it read, so a stored rate can always be traced back to its inputs.
//!
//! ## Special Variables
//! - `pi` - Mathematical constant π
//! - `e` - Mathematical constant e
//!
//! ## Supported Operators
//! - Arithmetic: `+`, `-`, `*`, `/`, `%`, `^` or `**` (power)
//! - Functions: `exp`, `ln`, `log`, `sqrt`, `pow`, `abs`, `min`, `max`, ...
//!
//! Integer literals follow integer arithmetic (`1/4` is `0`); write `1.0/4.0`.
//!
//! ## Example
//! ```rust
//! use limsa_core::{InputBound, InputBounds, InputContext, MathExpression};
//!
//! let mut context = InputContext::new();
//! context.set_input("rate_slow_annual".to_string(), InputBounds::new(0.00013, 0.0001, 0.0003));
//! context.set_input("prop_infectious".to_string(), InputBounds::new(0.65, 0.5, 0.65));
//!
//! let expr = MathExpression::new("rate_slow_annual * prop_infectious".to_string());
//! let derived = expr.evaluate(&context, InputBound::Value).unwrap();
//! assert_eq!(derived.inputs, vec!["prop_infectious", "rate_slow_annual"]);
//! ```

use evalexpr::{
    build_operator_tree, eval_with_context, ContextWithMutableVariables, EvalexprError,
    HashMapContext, Node, Value,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::types::{InputBound, InputBounds};

const SPECIAL_VAR_PI: &str = "pi";
const SPECIAL_VAR_E: &str = "e";

/// Names formulas bind to constants, so no raw input may use them as a slug
pub const RESERVED_SLUGS: &[&str] = &[SPECIAL_VAR_PI, SPECIAL_VAR_E];

/// Errors that can occur during formula evaluation
#[derive(Debug, thiserror::Error)]
pub enum MathExpressionError {
    #[error("Evaluation error: {0}")]
    EvalError(#[from] EvalexprError),
    #[error("Variable not found: {0}")]
    VariableNotFound(String),
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),
}

/// Raw input values visible to formulas, keyed by slug
#[derive(Debug, Clone, Default)]
pub struct InputContext {
    inputs: HashMap<String, InputBounds>,
}

impl InputContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a slug to its value range
    pub fn set_input(&mut self, slug: String, bounds: InputBounds) {
        self.inputs.insert(slug, bounds);
    }

    pub fn get_input(&self, slug: &str) -> Option<InputBounds> {
        self.inputs.get(slug).copied()
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.inputs.contains_key(slug)
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Convert to an evalexpr context with every slug read at `bound`
    fn to_evalexpr_context(&self, bound: InputBound) -> Result<HashMapContext, EvalexprError> {
        let mut context = HashMapContext::new();

        for (slug, bounds) in &self.inputs {
            context.set_value(slug.clone(), Value::Float(bounds.get(bound)))?;
        }

        context.set_value(
            SPECIAL_VAR_PI.to_string(),
            Value::Float(std::f64::consts::PI),
        )?;
        context.set_value(SPECIAL_VAR_E.to_string(), Value::Float(std::f64::consts::E))?;

        Ok(context)
    }
}

/// Rewrites a formula into evalexpr syntax.
///
/// - `sin(x)` → `math::sin(x)` for functions evalexpr only exposes under `math::`
/// - `**` → `^`
/// - `log(x)` → `ln(x)` (evalexpr's `math::log` takes a base)
fn preprocess_formula(formula: &str) -> String {
    // Longer names first so "asin" is handled before "sin"
    const MATH_FUNCTIONS: &[&str] = &[
        "asinh", "acosh", "atanh", "asin", "acos", "atan2", "atan", "sinh", "cosh", "tanh", "sin",
        "cos", "tan", "log10", "log2", "ln", "cbrt", "sqrt", "hypot", "exp", "abs", "pow",
    ];

    let mut result = formula.replace("**", "^");
    result = result.replace("log(", "ln(");

    for func in MATH_FUNCTIONS {
        let pattern = format!("{}(", func);
        let replacement = format!("math::{}(", func);

        let mut new_result = String::new();
        let mut remaining = result.as_str();

        while let Some(pos) = remaining.find(&pattern) {
            let before = &remaining[..pos];

            // Only rewrite real calls, not the tail of a longer identifier
            let is_valid_boundary = match before.chars().next_back() {
                Some(c) => !c.is_alphanumeric() && c != '_',
                None => true,
            };

            if is_valid_boundary && !before.ends_with("math::") {
                new_result.push_str(before);
                new_result.push_str(&replacement);
            } else {
                new_result.push_str(&remaining[..pos + pattern.len()]);
            }
            remaining = &remaining[pos + pattern.len()..];
        }
        new_result.push_str(remaining);
        result = new_result;
    }

    result
}

/// Collects variable identifiers from an AST node, excluding constants.
fn get_variables_from_node(node: &Node, variables: &mut BTreeSet<String>) {
    for ident in node.iter_variable_identifiers() {
        if ident != SPECIAL_VAR_PI && ident != SPECIAL_VAR_E {
            variables.insert(ident.to_string());
        }
    }
}

/// Check if a string is a valid identifier (slug)
fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with(|c: char| c.is_ascii_digit())
        && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// A number together with how it was obtained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedValue {
    pub value: f64,
    pub formula: Option<String>,
    /// Slugs the value depends on, sorted
    pub inputs: Vec<String>,
}

impl DerivedValue {
    /// A literal with no raw input behind it
    pub fn literal(value: f64) -> Self {
        Self {
            value,
            formula: None,
            inputs: Vec::new(),
        }
    }
}

/// A formula over raw input slugs
///
/// The formula is preprocessed once during construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MathExpression {
    pub formula: String,
    #[serde(skip)]
    preprocessed: String,
}

// Custom deserialize to ensure preprocessed field is populated
impl<'de> Deserialize<'de> for MathExpression {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct MathExpressionData {
            formula: String,
        }

        let data = MathExpressionData::deserialize(deserializer)?;
        Ok(MathExpression::new(data.formula))
    }
}

impl MathExpression {
    pub fn new(formula: String) -> Self {
        let preprocessed = preprocess_formula(&formula);
        Self {
            formula,
            preprocessed,
        }
    }

    /// Evaluate with every slug read at `bound`
    pub fn evaluate(
        &self,
        context: &InputContext,
        bound: InputBound,
    ) -> Result<DerivedValue, MathExpressionError> {
        let inputs = self.get_variables();
        if let Some(missing) = inputs.iter().find(|slug| !context.contains(slug)) {
            return Err(MathExpressionError::VariableNotFound(missing.clone()));
        }

        let evalexpr_context = context.to_evalexpr_context(bound)?;
        let value = match eval_with_context(&self.preprocessed, &evalexpr_context)? {
            Value::Float(result) => result,
            Value::Int(result) => result as f64,
            _ => {
                return Err(MathExpressionError::InvalidExpression(format!(
                    "'{}' must evaluate to a number",
                    self.formula
                )))
            }
        };

        Ok(DerivedValue {
            value,
            formula: Some(self.formula.clone()),
            inputs,
        })
    }

    /// Validate that the expression is syntactically correct
    pub fn validate(&self) -> Result<(), MathExpressionError> {
        let tree = build_operator_tree(&self.preprocessed)?;

        let mut context = HashMapContext::new();
        for var in self.get_variables() {
            context.set_value(var, Value::Float(1.0))?;
        }
        context.set_value(
            SPECIAL_VAR_PI.to_string(),
            Value::Float(std::f64::consts::PI),
        )?;
        context.set_value(SPECIAL_VAR_E.to_string(), Value::Float(std::f64::consts::E))?;

        tree.eval_with_context(&context)?;
        Ok(())
    }

    /// Slugs used in the expression, sorted.
    ///
    /// Returns an empty vector if the expression is syntactically invalid.
    pub fn get_variables(&self) -> Vec<String> {
        let mut variables = BTreeSet::new();
        if let Ok(node) = build_operator_tree(&self.preprocessed) {
            get_variables_from_node(&node, &mut variables);
        }
        variables.into_iter().collect()
    }
}

/// Plain JSON shape of a rate expression: a number or a string
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ExpressionLiteral {
    Number(f64),
    Text(String),
}

/// An annual rate as written in a model definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ExpressionLiteral", into = "ExpressionLiteral")]
pub enum RateExpression {
    /// Literal value
    Constant(f64),
    /// A single raw input slug
    Input(String),
    /// Formula over raw input slugs
    Formula(MathExpression),
}

impl From<ExpressionLiteral> for RateExpression {
    fn from(literal: ExpressionLiteral) -> Self {
        match literal {
            ExpressionLiteral::Number(value) => Self::Constant(value),
            ExpressionLiteral::Text(text) => Self::from_string(text),
        }
    }
}

impl From<RateExpression> for ExpressionLiteral {
    fn from(expression: RateExpression) -> Self {
        match expression {
            RateExpression::Constant(value) => Self::Number(value),
            RateExpression::Input(slug) => Self::Text(slug),
            RateExpression::Formula(expr) => Self::Text(expr.formula),
        }
    }
}

impl RateExpression {
    /// Parse a string into the appropriate expression type.
    ///
    /// - Numeric values become `Constant`
    /// - Single identifiers become `Input` (e.g. "prop_slow")
    /// - Anything else becomes `Formula`
    pub fn from_string(s: String) -> Self {
        if let Ok(value) = s.trim().parse::<f64>() {
            return Self::Constant(value);
        }

        let trimmed = s.trim();
        if is_identifier(trimmed) && trimmed != SPECIAL_VAR_PI && trimmed != SPECIAL_VAR_E {
            return Self::Input(trimmed.to_string());
        }

        Self::Formula(MathExpression::new(s))
    }

    /// Evaluate with every slug read at `bound`
    pub fn evaluate(
        &self,
        context: &InputContext,
        bound: InputBound,
    ) -> Result<DerivedValue, MathExpressionError> {
        match self {
            Self::Constant(value) => Ok(DerivedValue::literal(*value)),
            Self::Input(slug) => {
                let bounds = context
                    .get_input(slug)
                    .ok_or_else(|| MathExpressionError::VariableNotFound(slug.clone()))?;
                Ok(DerivedValue {
                    value: bounds.get(bound),
                    formula: None,
                    inputs: vec![slug.clone()],
                })
            }
            Self::Formula(expr) => expr.evaluate(context, bound),
        }
    }

    /// Slugs referenced by this expression, sorted
    pub fn get_variables(&self) -> Vec<String> {
        match self {
            Self::Constant(_) => vec![],
            Self::Input(slug) => vec![slug.clone()],
            Self::Formula(expr) => expr.get_variables(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tb_context() -> InputContext {
        let mut context = InputContext::new();
        context.set_input(
            "rate_slow_annual".to_string(),
            InputBounds::new(0.00013, 0.00010, 0.00030),
        );
        context.set_input(
            "prop_infectious".to_string(),
            InputBounds::new(0.65, 0.50, 0.65),
        );
        context
    }

    #[test]
    fn test_partitioned_rate() {
        let expr = MathExpression::new("rate_slow_annual * (1.0 - prop_infectious)".to_string());
        let derived = expr.evaluate(&tb_context(), InputBound::Value).unwrap();
        assert_eq!(derived.value, 0.00013 * (1.0 - 0.65));
        assert_eq!(derived.inputs, vec!["prop_infectious", "rate_slow_annual"]);
        assert_eq!(
            derived.formula.as_deref(),
            Some("rate_slow_annual * (1.0 - prop_infectious)")
        );
    }

    #[test]
    fn test_evaluates_at_bound() {
        let expr = MathExpression::new("rate_slow_annual * prop_infectious".to_string());
        let low = expr.evaluate(&tb_context(), InputBound::Low).unwrap();
        let high = expr.evaluate(&tb_context(), InputBound::High).unwrap();
        assert_eq!(low.value, 0.00010 * 0.50);
        assert_eq!(high.value, 0.00030 * 0.65);
    }

    #[test]
    fn test_unknown_slug() {
        let expr = MathExpression::new("rate_slow_annual * prop_missing".to_string());
        match expr.evaluate(&tb_context(), InputBound::Value) {
            Err(MathExpressionError::VariableNotFound(slug)) => assert_eq!(slug, "prop_missing"),
            other => panic!("expected VariableNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_preprocess() {
        assert_eq!(preprocess_formula("x ** 2"), "x ^ 2");
        assert_eq!(preprocess_formula("exp(-r)"), "math::exp(-r)");
        assert_eq!(preprocess_formula("math::exp(-r)"), "math::exp(-r)");
        assert_eq!(preprocess_formula("log(x)"), "math::ln(x)");
        assert_eq!(preprocess_formula("my_exp(x)"), "my_exp(x)");
        assert_eq!(preprocess_formula("é * sin(x)"), "é * math::sin(x)");
        assert_eq!(preprocess_formula("ééé sin(x)"), "ééé math::sin(x)");
    }

    #[test]
    fn test_non_ascii_formula_is_an_error() {
        let expr = MathExpression::new("ééé sin(prop_infectious)".to_string());
        assert!(expr.evaluate(&tb_context(), InputBound::Value).is_err());
    }

    #[test]
    fn test_constants_are_not_inputs() {
        let expr = MathExpression::new("1.0 - exp(-rate * pi)".to_string());
        assert_eq!(expr.get_variables(), vec!["rate"]);
    }

    #[test]
    fn test_rate_expression_from_string() {
        assert_eq!(
            RateExpression::from_string("0.25".to_string()),
            RateExpression::Constant(0.25)
        );
        assert_eq!(
            RateExpression::from_string("prop_slow".to_string()),
            RateExpression::Input("prop_slow".to_string())
        );
        assert!(matches!(
            RateExpression::from_string("prop_slow * 2.0".to_string()),
            RateExpression::Formula(_)
        ));
    }

    #[test]
    fn test_rate_expression_serde() {
        let parsed: Vec<RateExpression> =
            serde_json::from_str(r#"[0.5, "prop_slow", "prop_slow / 4.0"]"#).unwrap();
        assert_eq!(parsed[0], RateExpression::Constant(0.5));
        assert_eq!(parsed[1], RateExpression::Input("prop_slow".to_string()));
        assert_eq!(parsed[2].get_variables(), vec!["prop_slow"]);

        let json = serde_json::to_string(&parsed).unwrap();
        assert_eq!(json, r#"[0.5,"prop_slow","prop_slow / 4.0"]"#);
    }

    #[test]
    fn test_validate() {
        assert!(MathExpression::new("a * (b + ".to_string()).validate().is_err());
        assert!(MathExpression::new("a * (b + c)".to_string()).validate().is_ok());
    }
}
