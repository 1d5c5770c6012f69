use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::smtp::ProbeOutcome;

/// Terminal label of one address. The pipeline stops at the first negative
/// stage, so a record carries exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Duplicate,
    InvalidEmail,
    InvalidDomain,
    RejectedEmail,
    InvalidSmtp,
    Valid,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::Duplicate,
        Status::InvalidEmail,
        Status::InvalidDomain,
        Status::RejectedEmail,
        Status::InvalidSmtp,
        Status::Valid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::InvalidEmail => "invalid_email",
            Self::InvalidDomain => "invalid_domain",
            Self::RejectedEmail => "rejected_email",
            Self::InvalidSmtp => "invalid_smtp",
            Self::Valid => "valid",
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl From<ProbeOutcome> for Status {
    fn from(outcome: ProbeOutcome) -> Self {
        match outcome {
            ProbeOutcome::Valid => Self::Valid,
            ProbeOutcome::RejectedEmail => Self::RejectedEmail,
            ProbeOutcome::InvalidSmtp => Self::InvalidSmtp,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One input row and its classification. `email` is kept exactly as
/// supplied; `status` is serialised as a one-element list of labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    pub email: String,
    #[serde(with = "label_list")]
    pub status: Status,
}

impl ClassificationRecord {
    pub fn new(email: impl Into<String>, status: Status) -> Self {
        Self {
            email: email.into(),
            status,
        }
    }
}

/// Records in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub total: usize,
    pub results: Vec<ClassificationRecord>,
}

impl BatchResult {
    pub fn new(results: Vec<ClassificationRecord>) -> Self {
        Self {
            total: results.len(),
            results,
        }
    }

    pub fn count(&self, status: Status) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    /// Number of records per label, labels without records omitted.
    pub fn summary(&self) -> BTreeMap<Status, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.results {
            *counts.entry(record.status).or_insert(0) += 1;
        }
        counts
    }

    pub fn all_valid(&self) -> bool {
        self.results.iter().all(|r| r.status.is_valid())
    }
}

mod label_list {
    use serde::de::Error as _;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Status;

    pub(super) fn serialize<S: Serializer>(status: &Status, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(1))?;
        seq.serialize_element(status)?;
        seq.end()
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Status, D::Error> {
        let labels = Vec::<Status>::deserialize(deserializer)?;
        match labels.as_slice() {
            [status] => Ok(*status),
            other => Err(D::Error::invalid_length(other.len(), &"exactly one status label")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_serializes_to_wire_shape() {
        let batch = BatchResult::new(vec![
            ClassificationRecord::new("a@x.com", Status::InvalidDomain),
            ClassificationRecord::new("A@X.COM", Status::Duplicate),
        ]);
        let json = serde_json::to_string(&batch).expect("serialize");
        insta::assert_snapshot!(json, @r#"{"total":2,"results":[{"email":"a@x.com","status":["invalid_domain"]},{"email":"A@X.COM","status":["duplicate"]}]}"#);
    }

    #[test]
    fn record_round_trips_through_json() {
        let record = ClassificationRecord::new("user@example.com", Status::RejectedEmail);
        let json = serde_json::to_string(&record).expect("serialize");
        let back: ClassificationRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, record);
    }

    #[test]
    fn record_requires_exactly_one_label() {
        let err = serde_json::from_str::<ClassificationRecord>(
            r#"{"email":"a@b.co","status":["valid","duplicate"]}"#,
        );
        assert!(err.is_err());
        let err = serde_json::from_str::<ClassificationRecord>(r#"{"email":"a@b.co","status":[]}"#);
        assert!(err.is_err());
    }

    #[test]
    fn probe_outcomes_map_to_equal_labels() {
        for outcome in [ProbeOutcome::Valid, ProbeOutcome::RejectedEmail, ProbeOutcome::InvalidSmtp] {
            assert_eq!(Status::from(outcome).as_str(), outcome.as_str());
        }
    }

    #[test]
    fn summary_counts_labels() {
        let batch = BatchResult::new(vec![
            ClassificationRecord::new("a@x.com", Status::Valid),
            ClassificationRecord::new("b@x.com", Status::Valid),
            ClassificationRecord::new("bad", Status::InvalidEmail),
        ]);
        let summary = batch.summary();
        assert_eq!(summary.get(&Status::Valid), Some(&2));
        assert_eq!(summary.get(&Status::InvalidEmail), Some(&1));
        assert_eq!(summary.get(&Status::Duplicate), None);
        assert!(!batch.all_valid());
        assert_eq!(batch.count(Status::Valid), 2);
    }
}
