//! Versioned display store
//!
//! Everything a view renders lives in one record that only changes through
//! named transitions. Garbage metrics and their diagrams are held as pairs,
//! so the two can never drift apart.

use crate::models::{
    EvaluationKey, EvaluationMetrics, EvaluationReport, GarbageImageRecord, GarbageMetricRecord,
    GarbagePair, OntologySummary,
};
use serde::Serialize;

/// Named mutations of the display store
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayTransition {
    /// Drop everything (fresh ontology, failed extraction)
    Cleared,
    /// Replace the ontology summary as a whole
    OntologyInstalled(OntologySummary),
    /// Replace metrics and garbage pairs in one step
    EvaluationInstalled {
        key: EvaluationKey,
        report: EvaluationReport,
    },
    /// Back to zero metrics and no garbage
    EvaluationReset,
    /// User picked garbage pair `i`
    GarbageSelected(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DisplayState {
    version: u64,
    ontology: Option<OntologySummary>,
    /// Selection the shown metrics were produced for
    evaluated: Option<EvaluationKey>,
    metrics: EvaluationMetrics,
    garbage: Vec<GarbagePair>,
    /// `None` whenever `garbage` is empty
    garbage_index: Option<usize>,
}

impl DisplayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one transition and return the new version
    pub fn apply(&mut self, transition: DisplayTransition) -> u64 {
        match transition {
            DisplayTransition::Cleared => {
                self.ontology = None;
                self.reset_evaluation();
            }
            DisplayTransition::OntologyInstalled(summary) => {
                let belongs_elsewhere = self
                    .evaluated
                    .as_ref()
                    .is_some_and(|key| key.ontology != summary.id);
                if belongs_elsewhere {
                    self.reset_evaluation();
                }
                self.ontology = Some(summary);
            }
            DisplayTransition::EvaluationInstalled { key, report } => {
                if self
                    .ontology
                    .as_ref()
                    .is_some_and(|summary| summary.id != key.ontology)
                {
                    self.ontology = None;
                }
                self.evaluated = Some(key);
                self.metrics = report.metrics;
                self.garbage = report.garbage;
                self.select_garbage(self.garbage_index);
            }
            DisplayTransition::EvaluationReset => self.reset_evaluation(),
            DisplayTransition::GarbageSelected(index) => self.select_garbage(Some(index)),
        }

        self.version += 1;
        self.version
    }

    fn reset_evaluation(&mut self) {
        self.evaluated = None;
        self.metrics = EvaluationMetrics::default();
        self.garbage.clear();
        self.select_garbage(None);
    }

    /// Sole writer of `garbage_index`
    ///
    /// Keeps an in-bounds request, falls back to the first pair when there is
    /// one, and to no selection when there is none.
    fn select_garbage(&mut self, requested: Option<usize>) {
        let len = self.garbage.len();
        self.garbage_index = match requested {
            Some(index) if index < len => Some(index),
            _ if len > 0 => Some(0),
            _ => None,
        };
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn ontology(&self) -> Option<&OntologySummary> {
        self.ontology.as_ref()
    }

    pub fn evaluated(&self) -> Option<&EvaluationKey> {
        self.evaluated.as_ref()
    }

    pub fn metrics(&self) -> &EvaluationMetrics {
        &self.metrics
    }

    pub fn garbage(&self) -> &[GarbagePair] {
        &self.garbage
    }

    pub fn garbage_metrics(&self) -> impl Iterator<Item = &GarbageMetricRecord> {
        self.garbage.iter().map(|pair| &pair.metric)
    }

    pub fn garbage_images(&self) -> impl Iterator<Item = &GarbageImageRecord> {
        self.garbage.iter().map(|pair| &pair.image)
    }

    pub fn garbage_index(&self) -> Option<usize> {
        self.garbage_index
    }

    /// The pair currently on screen
    pub fn selected_pair(&self) -> Option<&GarbagePair> {
        self.garbage_index.and_then(|index| self.garbage.get(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(individual: &str) -> GarbagePair {
        GarbagePair {
            metric: GarbageMetricRecord {
                individual: individual.to_string(),
                predicted_label: "Predicted".to_string(),
                predicted_rank: 1,
                true_label: "True".to_string(),
                true_rank: 3,
                score_predicted: 0.8,
                score_true: 0.5,
                rank_difference: 2,
            },
            image: GarbageImageRecord {
                diagram: format!("digraph {} {{}}", individual),
            },
        }
    }

    fn report(count: usize) -> EvaluationReport {
        EvaluationReport {
            metrics: EvaluationMetrics {
                mrr: 0.5,
                garbage_count: count as u64,
                total: 10,
                ..Default::default()
            },
            garbage: (0..count).map(|i| pair(&format!("ind{}", i))).collect(),
        }
    }

    fn key(classifier: &str) -> EvaluationKey {
        EvaluationKey::new("onto1", "owl2vec-star", classifier)
    }

    fn summary(id: &str) -> OntologySummary {
        OntologySummary {
            id: id.to_string(),
            classes: 10,
            individuals: 0,
            axioms: 42,
            annotations: 3,
        }
    }

    fn assert_index_in_bounds(display: &DisplayState) {
        match display.garbage_index() {
            Some(index) => assert!(index < display.garbage().len()),
            None => assert!(display.garbage().is_empty()),
        }
    }

    #[test]
    fn test_new_display_is_pre_evaluation() {
        let display = DisplayState::new();
        assert_eq!(display.version(), 0);
        assert!(display.metrics().is_zero());
        assert!(display.garbage().is_empty());
        assert_eq!(display.garbage_index(), None);
        assert!(display.selected_pair().is_none());
    }

    #[test]
    fn test_install_defaults_index_to_first_pair() {
        let mut display = DisplayState::new();
        let version = display.apply(DisplayTransition::EvaluationInstalled {
            key: key("svm"),
            report: report(3),
        });

        assert_eq!(version, 1);
        assert_eq!(display.garbage_index(), Some(0));
        assert_eq!(display.selected_pair().unwrap().metric.individual, "ind0");
        assert_eq!(display.evaluated(), Some(&key("svm")));
    }

    #[test]
    fn test_select_clamps_out_of_range_to_first() {
        let mut display = DisplayState::new();
        display.apply(DisplayTransition::EvaluationInstalled {
            key: key("svm"),
            report: report(3),
        });

        display.apply(DisplayTransition::GarbageSelected(2));
        assert_eq!(display.garbage_index(), Some(2));

        display.apply(DisplayTransition::GarbageSelected(7));
        assert_eq!(display.garbage_index(), Some(0));
    }

    #[test]
    fn test_select_on_empty_is_no_selection() {
        let mut display = DisplayState::new();
        display.apply(DisplayTransition::GarbageSelected(0));
        assert_eq!(display.garbage_index(), None);
    }

    #[test]
    fn test_replacement_revalidates_index() {
        let mut display = DisplayState::new();
        display.apply(DisplayTransition::EvaluationInstalled {
            key: key("svm"),
            report: report(5),
        });
        display.apply(DisplayTransition::GarbageSelected(4));

        // Shorter replacement: index 4 no longer exists
        display.apply(DisplayTransition::EvaluationInstalled {
            key: key("mlp"),
            report: report(2),
        });
        assert_eq!(display.garbage_index(), Some(0));

        // Still in bounds: kept
        display.apply(DisplayTransition::GarbageSelected(1));
        display.apply(DisplayTransition::EvaluationInstalled {
            key: key("mlp"),
            report: report(3),
        });
        assert_eq!(display.garbage_index(), Some(1));

        // Empty replacement: no selection
        display.apply(DisplayTransition::EvaluationInstalled {
            key: key("mlp"),
            report: report(0),
        });
        assert_eq!(display.garbage_index(), None);
    }

    #[test]
    fn test_index_invariant_across_transition_sequences() {
        let sizes = [3usize, 0, 5, 1, 4, 0, 2];
        let picks = [0usize, 2, 9, 4, 1, 3];
        let mut display = DisplayState::new();

        for (step, size) in sizes.iter().enumerate() {
            display.apply(DisplayTransition::EvaluationInstalled {
                key: key("svm"),
                report: report(*size),
            });
            assert_index_in_bounds(&display);
            assert_eq!(display.garbage_metrics().count(), display.garbage_images().count());

            for pick in picks.iter().skip(step % picks.len()) {
                display.apply(DisplayTransition::GarbageSelected(*pick));
                assert_index_in_bounds(&display);
            }

            if step % 3 == 2 {
                display.apply(DisplayTransition::EvaluationReset);
                assert_index_in_bounds(&display);
            }
        }
    }

    #[test]
    fn test_cleared_resets_everything() {
        let mut display = DisplayState::new();
        display.apply(DisplayTransition::OntologyInstalled(summary("onto1")));
        display.apply(DisplayTransition::EvaluationInstalled {
            key: key("svm"),
            report: report(2),
        });
        display.apply(DisplayTransition::Cleared);

        assert!(display.ontology().is_none());
        assert!(display.evaluated().is_none());
        assert!(display.metrics().is_zero());
        assert!(display.garbage().is_empty());
        assert_eq!(display.garbage_index(), None);
        assert_eq!(display.version(), 3);
    }

    #[test]
    fn test_summary_refresh_keeps_matching_evaluation() {
        let mut display = DisplayState::new();
        display.apply(DisplayTransition::OntologyInstalled(summary("onto1")));
        display.apply(DisplayTransition::EvaluationInstalled {
            key: key("svm"),
            report: report(2),
        });

        let mut refreshed = summary("onto1");
        refreshed.individuals = 12;
        display.apply(DisplayTransition::OntologyInstalled(refreshed));

        assert_eq!(display.ontology().unwrap().individuals, 12);
        assert_eq!(display.garbage().len(), 2);
    }

    #[test]
    fn test_other_ontology_summary_drops_evaluation() {
        let mut display = DisplayState::new();
        display.apply(DisplayTransition::EvaluationInstalled {
            key: key("svm"),
            report: report(2),
        });
        display.apply(DisplayTransition::OntologyInstalled(summary("onto2")));

        assert!(display.evaluated().is_none());
        assert!(display.garbage().is_empty());
        assert!(display.metrics().is_zero());
    }

    #[test]
    fn test_evaluation_for_other_ontology_drops_summary() {
        let mut display = DisplayState::new();
        display.apply(DisplayTransition::OntologyInstalled(summary("onto2")));
        display.apply(DisplayTransition::EvaluationInstalled {
            key: key("svm"),
            report: report(1),
        });
        assert!(display.ontology().is_none());
    }
}
