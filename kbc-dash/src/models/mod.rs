//! Dashboard data model

pub mod catalog;
pub mod evaluation;
pub mod notification;
pub mod ontology;
pub mod selection;

pub use catalog::{CatalogEntry, ALGORITHMS, CLASSIFIERS};
pub use evaluation::{
    EvaluationMetrics, EvaluationReport, GarbageImageRecord, GarbageMetricRecord, GarbagePair,
};
pub use notification::{Notification, NotificationFeed};
pub use ontology::{CompletionKind, OntologyFile, OntologySummary};
pub use selection::{EvaluationKey, FieldUpdate, Selection, SelectionUpdate};
