//! Ontology structural statistics

use serde::{Deserialize, Serialize};

/// Structural counts extracted from one uploaded ontology
///
/// Always replaced as a whole record, never patched field by field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OntologySummary {
    pub id: String,
    pub classes: u64,
    pub individuals: u64,
    pub axioms: u64,
    pub annotations: u64,
}

/// Ontology file picked for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OntologyFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl OntologyFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// What kind of completion the ontology supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionKind {
    /// Schema only
    TBox,
    /// Schema plus instance data
    #[serde(rename = "TBox & ABox")]
    TBoxAndABox,
}

impl OntologySummary {
    /// Individuals imply ABox content
    pub fn completion_kind(&self) -> CompletionKind {
        if self.individuals > 0 {
            CompletionKind::TBoxAndABox
        } else {
            CompletionKind::TBox
        }
    }
}

impl std::fmt::Display for CompletionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletionKind::TBox => write!(f, "TBox"),
            CompletionKind::TBoxAndABox => write!(f, "TBox & ABox"),
        }
    }
}
