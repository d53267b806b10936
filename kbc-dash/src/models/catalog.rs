//! Known embedding algorithms and classifiers
//!
//! The backend is the authority on what it accepts; this list only feeds
//! view-layer dropdowns and diagnostics.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub id: &'static str,
    pub label: &'static str,
}

pub const ALGORITHMS: &[CatalogEntry] = &[
    CatalogEntry { id: "owl2vec-star", label: "OWL2Vec*" },
    CatalogEntry { id: "opa2vec", label: "OPA2Vec" },
    CatalogEntry { id: "rdf2vec", label: "RDF2Vec" },
    CatalogEntry { id: "onto2vec", label: "Onto2Vec" },
];

pub const CLASSIFIERS: &[CatalogEntry] = &[
    CatalogEntry { id: "random-forest", label: "Random Forest" },
    CatalogEntry { id: "mlp", label: "Multi-layer Perceptron" },
    CatalogEntry { id: "logistic-regression", label: "Logistic Regression" },
    CatalogEntry { id: "svm", label: "SVM" },
    CatalogEntry { id: "linear-svc", label: "Linear SVC" },
    CatalogEntry { id: "decision-tree", label: "Decision Tree" },
    CatalogEntry { id: "sgd-log", label: "SGD Log" },
];

pub fn is_known_algorithm(id: &str) -> bool {
    ALGORITHMS.iter().any(|entry| entry.id == id)
}

pub fn is_known_classifier(id: &str) -> bool {
    CLASSIFIERS.iter().any(|entry| entry.id == id)
}
