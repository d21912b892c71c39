//! # Flow Definitions
//!
//! A questionnaire is data: its field schema, ordered segments, per-field
//! validation rules, disqualification rules, derived fields and submission
//! sanitization. [`FlowDefinitionBuilder`] assembles one in code;
//! [`FlowDefinitionSpec`] describes one in a TOML or JSON file.
//!
//! Every cross reference is checked once at build time, so a running flow
//! never meets an unknown field or segment.

use crate::derived::{DerivedFieldCalculator, DerivedRule};
use crate::eligibility::{DisqualificationRule, EligibilityEvaluator};
use crate::error::{IntakeError, Result};
use crate::fields::{FieldDef, FieldSchema};
use crate::segments::{Segment, SegmentGraph};
use crate::submission::SanitizationRules;
use crate::validation::{FieldRule, ValidationGate};
use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DefinitionError {
    #[error("{context} references unknown field '{field}'")]
    UnknownField { context: String, field: String },

    #[error("{context} references unknown segment '{segment}'")]
    UnknownSegment { context: String, segment: String },

    #[error("Failed to load flow definition from {source_name}: {reason}")]
    Load { source_name: String, reason: String },
}

impl From<DefinitionError> for IntakeError {
    fn from(error: DefinitionError) -> Self {
        IntakeError::Definition(error.to_string())
    }
}

/// Validated, immutable description of one questionnaire
#[derive(Debug, Clone)]
pub struct FlowDefinition {
    name: String,
    schema: FieldSchema,
    graph: SegmentGraph,
    validation: ValidationGate,
    eligibility: EligibilityEvaluator,
    derived: DerivedFieldCalculator,
    sanitization: SanitizationRules,
    identity_fields: Vec<String>,
}

impl FlowDefinition {
    pub fn builder(name: impl Into<String>) -> FlowDefinitionBuilder {
        FlowDefinitionBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn graph(&self) -> &SegmentGraph {
        &self.graph
    }

    pub fn validation(&self) -> &ValidationGate {
        &self.validation
    }

    pub fn eligibility(&self) -> &EligibilityEvaluator {
        &self.eligibility
    }

    pub fn derived(&self) -> &DerivedFieldCalculator {
        &self.derived
    }

    pub fn sanitization(&self) -> &SanitizationRules {
        &self.sanitization
    }

    /// Fields copied into every telemetry event once answered
    pub fn identity_fields(&self) -> &[String] {
        &self.identity_fields
    }
}

#[derive(Debug, Clone)]
pub struct FlowDefinitionBuilder {
    name: String,
    schema: FieldSchema,
    segments: Vec<Segment>,
    rules: BTreeMap<String, Vec<FieldRule>>,
    disqualifications: Vec<DisqualificationRule>,
    derived: Vec<DerivedRule>,
    sanitization: SanitizationRules,
    identity_fields: Vec<String>,
}

impl FlowDefinitionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: FieldSchema::new(),
            segments: Vec::new(),
            rules: BTreeMap::new(),
            disqualifications: Vec::new(),
            derived: Vec::new(),
            sanitization: SanitizationRules::default(),
            identity_fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, def: FieldDef) -> Self {
        self.schema.insert(name, def);
        self
    }

    pub fn schema(mut self, schema: FieldSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn segment(mut self, segment: Segment) -> Self {
        self.segments.push(segment);
        self
    }

    pub fn rule(mut self, field: impl Into<String>, rule: FieldRule) -> Self {
        self.rules.entry(field.into()).or_default().push(rule);
        self
    }

    pub fn disqualify(mut self, rule: DisqualificationRule) -> Self {
        self.disqualifications.push(rule);
        self
    }

    pub fn derived(mut self, rule: DerivedRule) -> Self {
        self.derived.push(rule);
        self
    }

    pub fn sanitization(mut self, rules: SanitizationRules) -> Self {
        self.sanitization = rules;
        self
    }

    pub fn identity_field(mut self, field: impl Into<String>) -> Self {
        self.identity_fields.push(field.into());
        self
    }

    pub fn build(self) -> Result<FlowDefinition> {
        self.check_references()?;

        let graph = SegmentGraph::new(self.segments)?;
        let validation = ValidationGate::new(&graph, self.rules)?;

        debug!(
            flow = %self.name,
            segments = graph.len(),
            fields = self.schema.len(),
            "Built flow definition"
        );

        Ok(FlowDefinition {
            name: self.name,
            schema: self.schema,
            graph,
            validation,
            eligibility: EligibilityEvaluator::new(self.disqualifications),
            derived: DerivedFieldCalculator::new(self.derived),
            sanitization: self.sanitization,
            identity_fields: self.identity_fields,
        })
    }

    fn check_references(&self) -> std::result::Result<(), DefinitionError> {
        let known = |context: String, field: &str| {
            if self.schema.contains(field) {
                Ok(())
            } else {
                Err(DefinitionError::UnknownField {
                    context,
                    field: field.to_string(),
                })
            }
        };

        for segment in &self.segments {
            for field in &segment.field_names {
                known(format!("segment '{}'", segment.id), field)?;
            }
            for rule in &segment.skip_rules {
                for field in rule.when.fields() {
                    known(format!("skip rule on segment '{}'", segment.id), field)?;
                }
            }
        }

        for (field, rules) in &self.rules {
            known("validation rules".to_string(), field)?;
            for referenced in rules.iter().flat_map(FieldRule::referenced_fields) {
                known(format!("validation rule of '{field}'"), referenced)?;
            }
        }

        for rule in &self.disqualifications {
            if !self.segments.iter().any(|s| s.id == rule.segment_id) {
                return Err(DefinitionError::UnknownSegment {
                    context: format!("disqualification '{}'", rule.reason),
                    segment: rule.segment_id.to_string(),
                });
            }
            for field in rule.when.fields() {
                known(format!("disqualification '{}'", rule.reason), field)?;
            }
        }

        for rule in &self.derived {
            for field in rule.inputs() {
                known(format!("derived rule '{}'", rule.name()), field)?;
            }
            known(format!("derived rule '{}'", rule.name()), rule.output())?;
        }

        for field in self.sanitization.referenced_fields() {
            known("sanitization rules".to_string(), field)?;
        }
        for field in &self.identity_fields {
            known("identity fields".to_string(), field)?;
        }

        Ok(())
    }
}

/// Derived rules available to file-based definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DerivedSpec {
    Bmi {
        feet: String,
        inches: String,
        pounds: String,
        output: String,
    },
}

impl DerivedSpec {
    pub fn to_rule(&self) -> DerivedRule {
        match self {
            Self::Bmi {
                feet,
                inches,
                pounds,
                output,
            } => DerivedRule::bmi(feet, inches, pounds, output),
        }
    }
}

/// Serializable flow definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDefinitionSpec {
    pub name: String,
    pub fields: FieldSchema,
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub validation: BTreeMap<String, Vec<FieldRule>>,
    #[serde(default)]
    pub disqualifications: Vec<DisqualificationRule>,
    #[serde(default)]
    pub derived: Vec<DerivedSpec>,
    #[serde(default)]
    pub sanitization: SanitizationRules,
    #[serde(default)]
    pub identity_fields: Vec<String>,
}

impl FlowDefinitionSpec {
    /// Load from a `.toml` or `.json` file, chosen by extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let source_name = path.display().to_string();
        if !path.is_file() {
            return Err(DefinitionError::Load {
                source_name,
                reason: "not a regular file".to_string(),
            }
            .into());
        }
        Self::load(File::from(path.to_path_buf()), source_name)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Self::load(File::from_str(contents, FileFormat::Toml), "inline TOML".to_string())
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        Self::load(File::from_str(contents, FileFormat::Json), "inline JSON".to_string())
    }

    fn load<S>(source: S, source_name: String) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        Config::builder()
            .add_source(source)
            .build()
            .and_then(|merged| merged.try_deserialize())
            .map_err(|e| {
                DefinitionError::Load {
                    source_name,
                    reason: e.to_string(),
                }
                .into()
            })
    }

    pub fn build(self) -> Result<FlowDefinition> {
        let mut builder = FlowDefinitionBuilder::new(self.name)
            .schema(self.fields)
            .sanitization(self.sanitization);

        for segment in self.segments {
            builder = builder.segment(segment);
        }
        for (field, rules) in self.validation {
            for rule in rules {
                builder = builder.rule(field.clone(), rule);
            }
        }
        for rule in self.disqualifications {
            builder = builder.disqualify(rule);
        }
        for derived in &self.derived {
            builder = builder.derived(derived.to_rule());
        }
        for field in self.identity_fields {
            builder = builder.identity_field(field);
        }

        builder.build()
    }
}
