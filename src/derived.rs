//! Derived field calculator.
//!
//! Rules recompute their output whenever one of their inputs changes and write
//! the result back through [`FieldStore::set_field`], so error clearing and
//! change notifications behave exactly as for typed answers.

use crate::constants::units::{INCHES_PER_FOOT, KG_PER_POUND, METERS_PER_INCH};
use crate::error::Result;
use crate::fields::{FieldStore, FieldValue};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub type DeriveFn = Arc<dyn Fn(&FieldStore) -> Option<FieldValue> + Send + Sync>;

#[derive(Clone)]
pub struct DerivedRule {
    name: String,
    inputs: Vec<String>,
    output: String,
    compute: DeriveFn,
}

impl fmt::Debug for DerivedRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedRule")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("output", &self.output)
            .finish()
    }
}

impl DerivedRule {
    /// `compute` returns `None` while any input is missing or unparseable
    pub fn new<F>(
        name: impl Into<String>,
        inputs: Vec<String>,
        output: impl Into<String>,
        compute: F,
    ) -> Self
    where
        F: Fn(&FieldStore) -> Option<FieldValue> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            inputs,
            output: output.into(),
            compute: Arc::new(compute),
        }
    }

    /// BMI from height in feet and inches plus weight in pounds
    pub fn bmi(feet: &str, inches: &str, pounds: &str, output: &str) -> Self {
        let (feet_field, inches_field, pounds_field) =
            (feet.to_string(), inches.to_string(), pounds.to_string());
        Self::new(
            "bmi",
            vec![feet.to_string(), inches.to_string(), pounds.to_string()],
            output,
            move |store| {
                let feet = store.get_field(&feet_field).as_number()?;
                let inches = store.get_field(&inches_field).as_number()?;
                let pounds = store.get_field(&pounds_field).as_number()?;
                compute_bmi(feet, inches, pounds).map(FieldValue::Number)
            },
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn compute(&self, store: &FieldStore) -> Option<FieldValue> {
        (self.compute)(store)
    }
}

/// Body-mass index rounded to one decimal place
///
/// Undefined when either total height or weight is not positive.
pub fn compute_bmi(feet: f64, inches: f64, pounds: f64) -> Option<f64> {
    let height_in = feet * INCHES_PER_FOOT + inches;
    if height_in <= 0.0 || pounds <= 0.0 {
        return None;
    }
    let meters = height_in * METERS_PER_INCH;
    let bmi = pounds * KG_PER_POUND / (meters * meters);
    bmi.is_finite().then(|| (bmi * 10.0).round() / 10.0)
}

#[derive(Debug, Clone, Default)]
pub struct DerivedFieldCalculator {
    rules: Vec<DerivedRule>,
}

impl DerivedFieldCalculator {
    pub fn new(rules: Vec<DerivedRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[DerivedRule] {
        &self.rules
    }

    pub fn is_output(&self, field: &str) -> bool {
        self.rules.iter().any(|r| r.output == field)
    }

    /// React to one changed field, cascading into rules fed by derived outputs
    pub fn on_field_changed(&self, store: &mut FieldStore, changed: &str) -> Result<()> {
        let mut pending = vec![changed.to_string()];
        let mut written = BTreeSet::new();

        while let Some(field) = pending.pop() {
            for rule in self.rules.iter().filter(|r| r.inputs.contains(&field)) {
                if !written.insert(rule.output.clone()) {
                    continue;
                }
                self.apply(rule, store)?;
                pending.push(rule.output.clone());
            }
        }
        Ok(())
    }

    /// Recompute every rule, e.g. after restoring a snapshot
    pub fn recompute_all(&self, store: &mut FieldStore) -> Result<()> {
        for rule in &self.rules {
            self.apply(rule, store)?;
        }
        Ok(())
    }

    /// Evaluate all rules without touching the store
    pub fn compute_all(&self, store: &FieldStore) -> BTreeMap<String, FieldValue> {
        self.rules
            .iter()
            .filter_map(|rule| rule.compute(store).map(|v| (rule.output.clone(), v)))
            .collect()
    }

    fn apply(&self, rule: &DerivedRule, store: &mut FieldStore) -> Result<()> {
        match rule.compute(store) {
            Some(value) => {
                debug!(rule = rule.name(), output = rule.output(), value = %value, "Derived field recomputed");
                store.set_field(&rule.output, value)
            }
            None => store.clear_field(&rule.output),
        }
    }
}
