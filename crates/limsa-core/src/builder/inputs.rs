use tracing::debug;

use super::ModelBuilder;
use crate::error::{ModelError, Result};
use crate::math_expression::{DerivedValue, MathExpression, RateExpression, RESERVED_SLUGS};
use crate::store::ModelStore;
use crate::types::{
    Derivation, InputBound, InputBounds, NewRawInput, RawInput, Reference, ReferenceId,
};

impl<S: ModelStore + ?Sized> ModelBuilder<'_, S> {
    pub fn add_reference(&mut self, name: &str, bibtex: Option<&str>) -> Result<Reference> {
        Ok(self.store.create_reference(name, bibtex)?)
    }

    /// Store a calibrated quantity.
    ///
    /// Slug and name must both be unused, and the slug may not shadow a
    /// formula constant (`pi`, `e`). Bounds are stored as given, even
    /// when `low <= value <= high` does not hold.
    pub fn add_raw_input(&mut self, input: NewRawInput) -> Result<RawInput> {
        if RESERVED_SLUGS.contains(&input.slug.as_str()) {
            return Err(ModelError::ReservedSlug(input.slug));
        }
        if self.store.raw_input_by_slug(&input.slug)?.is_some() {
            return Err(ModelError::DuplicateRawInput {
                field: "slug",
                value: input.slug,
            });
        }
        if self.store.raw_input_by_name(&input.name)?.is_some() {
            return Err(ModelError::DuplicateRawInput {
                field: "name",
                value: input.name,
            });
        }
        if let Some(reference) = input.reference {
            self.ensure_reference(reference)?;
        }

        let raw_input = self.store.create_raw_input(input)?;
        self.inputs
            .set_input(raw_input.slug.clone(), raw_input.bounds());
        debug!(slug = %raw_input.slug, value = raw_input.value, "Raw input stored");
        Ok(raw_input)
    }

    /// Store a raw input computed from earlier ones.
    ///
    /// The formula is evaluated once per bound, so `low` is the formula over
    /// every input's `low`, and likewise for `value` and `high`.
    pub fn add_derived_raw_input(
        &mut self,
        name: &str,
        slug: &str,
        formula: &MathExpression,
        reference: Option<ReferenceId>,
    ) -> Result<RawInput> {
        let at = |bound| {
            formula
                .evaluate(&self.inputs, bound)
                .map_err(|e| ModelError::formula(format!("raw input '{}'", slug), e))
        };
        let value = at(InputBound::Value)?;
        let low = at(InputBound::Low)?;
        let high = at(InputBound::High)?;

        let input = NewRawInput {
            name: name.to_string(),
            slug: slug.to_string(),
            bounds: InputBounds::new(value.value, low.value, high.value),
            reference,
            derivation: Some(Derivation {
                formula: formula.formula.clone(),
                inputs: value.inputs,
            }),
        };
        self.add_raw_input(input)
    }

    pub fn raw_input(&self, slug: &str) -> Result<RawInput> {
        self.store
            .raw_input_by_slug(slug)?
            .ok_or_else(|| ModelError::RawInputNotFound(slug.to_string()))
    }

    /// Evaluate a rate expression against the stored raw inputs
    pub fn derive(&self, expression: &RateExpression, bound: InputBound) -> Result<DerivedValue> {
        expression
            .evaluate(&self.inputs, bound)
            .map_err(|e| ModelError::formula("rate expression", e))
    }

    fn ensure_reference(&self, id: ReferenceId) -> Result<()> {
        let exists = self
            .store
            .references()?
            .iter()
            .any(|reference| reference.id == id);
        if exists {
            Ok(())
        } else {
            Err(ModelError::ReferenceNotFound(format!("#{}", id)))
        }
    }
}
