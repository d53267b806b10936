//! Current ontology / algorithm / classifier selection

use serde::{Deserialize, Serialize};

/// The three dependent dropdown values
///
/// Blank strings are normalized to `None`, so "unset" has one spelling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub ontology: Option<String>,
    pub algorithm: Option<String>,
    pub classifier: Option<String>,
}

/// A fully populated selection; tags evaluation requests
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvaluationKey {
    pub ontology: String,
    pub algorithm: String,
    pub classifier: String,
}

impl EvaluationKey {
    pub fn new(
        ontology: impl Into<String>,
        algorithm: impl Into<String>,
        classifier: impl Into<String>,
    ) -> Self {
        Self {
            ontology: ontology.into(),
            algorithm: algorithm.into(),
            classifier: classifier.into(),
        }
    }
}

impl std::fmt::Display for EvaluationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.ontology, self.algorithm, self.classifier)
    }
}

impl Selection {
    /// Selection right after an ontology has been extracted
    pub fn for_ontology(ontology: impl Into<String>) -> Self {
        Self {
            ontology: normalize(Some(ontology.into())),
            algorithm: None,
            classifier: None,
        }
    }

    /// `Some` only when all three fields are set
    pub fn evaluation_key(&self) -> Option<EvaluationKey> {
        Some(EvaluationKey {
            ontology: self.ontology.clone()?,
            algorithm: self.algorithm.clone()?,
            classifier: self.classifier.clone()?,
        })
    }

    /// Apply a partial update; returns true if anything changed
    pub fn apply(&mut self, update: &SelectionUpdate) -> bool {
        let before = self.clone();
        update.ontology.apply_to(&mut self.ontology);
        update.algorithm.apply_to(&mut self.algorithm);
        update.classifier.apply_to(&mut self.classifier);
        *self != before
    }
}

/// One field of a selection update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "lowercase")]
pub enum FieldUpdate {
    /// Leave the field as it is
    #[default]
    Keep,
    /// Set the field; a blank value clears it
    Set(String),
    Clear,
}

impl FieldUpdate {
    fn apply_to(&self, field: &mut Option<String>) {
        match self {
            FieldUpdate::Keep => {}
            FieldUpdate::Set(value) => *field = normalize(Some(value.clone())),
            FieldUpdate::Clear => *field = None,
        }
    }
}

/// Partial update of the selection (one dropdown change, or several at once)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionUpdate {
    #[serde(default)]
    pub ontology: FieldUpdate,
    #[serde(default)]
    pub algorithm: FieldUpdate,
    #[serde(default)]
    pub classifier: FieldUpdate,
}

impl SelectionUpdate {
    pub fn ontology(value: impl Into<String>) -> Self {
        Self {
            ontology: FieldUpdate::Set(value.into()),
            ..Default::default()
        }
    }

    pub fn algorithm(value: impl Into<String>) -> Self {
        Self {
            algorithm: FieldUpdate::Set(value.into()),
            ..Default::default()
        }
    }

    pub fn classifier(value: impl Into<String>) -> Self {
        Self {
            classifier: FieldUpdate::Set(value.into()),
            ..Default::default()
        }
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
