//! Normalized verbal-autopsy records and row rejection accounting

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single normalized row: the free-text narrative, its canonical cause
/// category (absent for inference data) and the original column values.
///
/// Records are plain values. Every downstream stage reads them; none
/// mutates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Free-text narrative, quotes already stripped
    pub text: String,
    /// Canonical category from the code book, `None` for unlabeled rows
    pub label: Option<String>,
    /// Original column values as they appeared in the source row
    pub raw_fields: Vec<String>,
}

impl Record {
    pub fn new(text: String, label: Option<String>, raw_fields: Vec<String>) -> Self {
        Self {
            text,
            label,
            raw_fields,
        }
    }

    /// Shorthand used by tests and synthetic corpora
    pub fn labeled(text: &str, label: &str) -> Self {
        Self::new(text.to_string(), Some(label.to_string()), Vec::new())
    }
}

/// Why a row was dropped during normalization
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("row has {found} columns, expected at least {required}")]
    MalformedRow { found: usize, required: usize },
    #[error("no category mapping for label '{0}'")]
    UnmappedLabel(String),
}

/// Per-batch counts of kept and rejected rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionSummary {
    pub total: usize,
    pub kept: usize,
    pub malformed: usize,
    pub unmapped: usize,
}

impl RejectionSummary {
    pub fn rejected(&self) -> usize {
        self.malformed + self.unmapped
    }

    pub fn count_kept(&mut self) {
        self.total += 1;
        self.kept += 1;
    }

    pub fn count_rejected(&mut self, reason: &RejectReason) {
        self.total += 1;
        match reason {
            RejectReason::MalformedRow { .. } => self.malformed += 1,
            RejectReason::UnmappedLabel(_) => self.unmapped += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_reason_messages() {
        let malformed = RejectReason::MalformedRow {
            found: 3,
            required: 7,
        };
        assert_eq!(
            malformed.to_string(),
            "row has 3 columns, expected at least 7"
        );

        let unmapped = RejectReason::UnmappedLabel("hypertension".to_string());
        assert_eq!(
            unmapped.to_string(),
            "no category mapping for label 'hypertension'"
        );
    }

    #[test]
    fn test_rejection_summary_counts() {
        let mut summary = RejectionSummary::default();
        summary.count_kept();
        summary.count_kept();
        summary.count_rejected(&RejectReason::MalformedRow {
            found: 2,
            required: 7,
        });
        summary.count_rejected(&RejectReason::UnmappedLabel("x".to_string()));
        summary.count_rejected(&RejectReason::UnmappedLabel("y".to_string()));

        assert_eq!(summary.total, 5);
        assert_eq!(summary.kept, 2);
        assert_eq!(summary.malformed, 1);
        assert_eq!(summary.unmapped, 2);
        assert_eq!(summary.rejected(), 3);
    }
}
