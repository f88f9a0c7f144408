use crate::types::RemoteRecord;
use http::StatusCode;
use std::fmt;

/// Workflow status that asks a reviewer to look at pending changes.
pub const STATUS_TO_REVIEW: &str = "to-review";
/// Workflow status that signs and publishes pending changes.
pub const STATUS_TO_SIGN: &str = "to-sign";

/// A single change to the remote collection.
///
/// Mutations are plain descriptors: they can be described without being
/// executed, which is what dry-run mode relies on.
#[derive(Clone, Debug, PartialEq)]
pub enum Mutation {
    Upsert {
        id: String,
        description: String,
        hashes: Vec<String>,
    },
    Delete(RemoteRecord),
    DeleteAll,
    RequestReview,
    Approve,
}

impl Mutation {
    /// Statuses the server may answer with when the mutation succeeded.
    pub fn accepted_statuses(&self) -> &'static [StatusCode] {
        match self {
            Mutation::Upsert { .. } => &[StatusCode::OK, StatusCode::CREATED],
            _ => &[StatusCode::OK],
        }
    }

    pub fn is_accepted(&self, status: StatusCode) -> bool {
        self.accepted_statuses().contains(&status)
    }

    pub(crate) fn failure_message(&self) -> &'static str {
        match self {
            Mutation::Upsert { .. } => "Couldn't upsert record",
            Mutation::Delete(_) => "Couldn't delete record",
            Mutation::DeleteAll => "Couldn't delete records",
            Mutation::RequestReview => "Couldn't request review",
            Mutation::Approve => "Couldn't approve changes",
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Mutation::Upsert { .. } => "upsert",
            Mutation::Delete(_) => "delete",
            Mutation::DeleteAll => "delete_all",
            Mutation::RequestReview => "request_review",
            Mutation::Approve => "approve",
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::Upsert {
                id, description, ..
            } => write!(f, "Upsert {id} ({description})"),
            Mutation::Delete(record) => write!(f, "Delete {} ({})", record.id, record.description),
            Mutation::DeleteAll => f.write_str("Delete all records"),
            Mutation::RequestReview => f.write_str("Requesting review"),
            Mutation::Approve => f.write_str("Approving changes"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_statuses() {
        let upsert = Mutation::Upsert {
            id: "id-000".into(),
            description: "d".into(),
            hashes: vec![],
        };
        assert!(upsert.is_accepted(StatusCode::OK));
        assert!(upsert.is_accepted(StatusCode::CREATED));
        assert!(!upsert.is_accepted(StatusCode::NO_CONTENT));

        let delete = Mutation::Delete(RemoteRecord::new("id-001", "old", vec![]));
        assert!(delete.is_accepted(StatusCode::OK));
        assert!(!delete.is_accepted(StatusCode::CREATED));
        assert!(!Mutation::DeleteAll.is_accepted(StatusCode::ACCEPTED));
        assert!(!Mutation::Approve.is_accepted(StatusCode::CREATED));
    }

    #[test]
    fn test_describe() {
        let upsert = Mutation::Upsert {
            id: "id-004".into(),
            description: "gpu (win nightly): sig".into(),
            hashes: vec!["h".into()],
        };
        assert_eq!(upsert.to_string(), "Upsert id-004 (gpu (win nightly): sig)");
        assert_eq!(
            Mutation::Delete(RemoteRecord::new("id-009", "stale", vec![])).to_string(),
            "Delete id-009 (stale)"
        );
        assert_eq!(Mutation::Approve.to_string(), "Approving changes");
    }
}
