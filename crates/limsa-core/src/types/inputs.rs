use serde::{Deserialize, Serialize};

use super::ids::{RawInputId, ReferenceId};

/// A citation backing one or more raw inputs.
///
/// `name` is free text and may list several sources at once.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub id: ReferenceId,
    pub name: String,
    pub bibtex: Option<String>,
}

/// Which point of a raw input's uncertainty range to read
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputBound {
    Low,
    #[default]
    Value,
    High,
}

impl InputBound {
    pub const ALL: [InputBound; 3] = [InputBound::Value, InputBound::Low, InputBound::High];
}

/// Point estimate with its uncertainty range
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputBounds {
    pub value: f64,
    pub low: f64,
    pub high: f64,
}

impl InputBounds {
    pub fn new(value: f64, low: f64, high: f64) -> Self {
        Self { value, low, high }
    }

    /// A quantity with no uncertainty
    pub fn exact(value: f64) -> Self {
        Self::new(value, value, value)
    }

    pub fn get(&self, bound: InputBound) -> f64 {
        match bound {
            InputBound::Low => self.low,
            InputBound::Value => self.value,
            InputBound::High => self.high,
        }
    }

    /// `low <= value <= high`
    pub fn is_consistent(&self) -> bool {
        self.low <= self.value && self.value <= self.high
    }
}

/// How a derived raw input was computed from other raw inputs
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Derivation {
    pub formula: String,
    /// Slugs read by `formula`, sorted
    pub inputs: Vec<String>,
}

/// A calibrated model parameter.
///
/// The slug is the key the simulation engine binds to, so it must stay stable
/// across rebuilds. Recalibration creates a new raw input rather than editing
/// an existing one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawInput {
    pub id: RawInputId,
    pub name: String,
    pub slug: String,
    pub value: f64,
    pub low: f64,
    pub high: f64,
    pub reference: Option<ReferenceId>,
    pub derivation: Option<Derivation>,
}

impl RawInput {
    pub fn bounds(&self) -> InputBounds {
        InputBounds::new(self.value, self.low, self.high)
    }
}

/// Field values for a raw input that has not been stored yet
#[derive(Clone, Debug, PartialEq)]
pub struct NewRawInput {
    pub name: String,
    pub slug: String,
    pub bounds: InputBounds,
    pub reference: Option<ReferenceId>,
    pub derivation: Option<Derivation>,
}

impl NewRawInput {
    pub fn new(name: impl Into<String>, slug: impl Into<String>, bounds: InputBounds) -> Self {
        Self {
            name: name.into(),
            slug: slug.into(),
            bounds,
            reference: None,
            derivation: None,
        }
    }

    pub fn with_reference(mut self, reference: ReferenceId) -> Self {
        self.reference = Some(reference);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_consistency() {
        assert!(InputBounds::new(0.86, 0.75, 0.92).is_consistent());
        assert!(InputBounds::new(0.65, 0.50, 0.65).is_consistent());
        // self-cure literal sits below its own low bound
        assert!(!InputBounds::new(0.020, 0.15, 0.25).is_consistent());
    }

    #[test]
    fn test_bound_selection() {
        let bounds = InputBounds::new(0.62, 0.52, 0.75);
        assert_eq!(bounds.get(InputBound::Low), 0.52);
        assert_eq!(bounds.get(InputBound::Value), 0.62);
        assert_eq!(bounds.get(InputBound::High), 0.75);
    }
}
