use crate::types::{MalformedInputError, SignatureGroup};
use async_trait::async_trait;
use http::StatusCode;
use shared::marker::Marker;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error(transparent)]
    Malformed(#[from] MalformedInputError),
    #[error("{tool} exited with {status}: {stderr}")]
    ExternalTool {
        tool: &'static str,
        status: String,
        stderr: String,
    },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {location}: {source}")]
    Json {
        location: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("HTTP client error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{context}: [{status}]")]
    UnexpectedStatus {
        context: &'static str,
        status: StatusCode,
    },
}

impl SourceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SourceError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type GroupIter<'a> = Box<dyn Iterator<Item = Result<SignatureGroup, SourceError>> + Send + 'a>;

/// A finite sequence of signature groups that can be walked more than once.
///
/// Every call to `iter` starts from the beginning and yields the groups in the
/// same order. Record ids are assigned from this order, so it must not depend
/// on anything but the underlying data.
pub trait SignatureGroups: Send + Sync {
    fn iter(&self) -> GroupIter<'_>;
}

/// Produces the desired state of the collection.
#[async_trait]
pub trait SignatureSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cheap check for upstream data newer than `marker`. Must not build the
    /// full target state.
    async fn new_data_since(&self, marker: &Marker) -> Result<bool, SourceError>;

    /// Builds the target state.
    async fn load(&self) -> Result<Box<dyn SignatureGroups>, SourceError>;
}

/// Groups held in memory, yielded in insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StaticGroups(Vec<SignatureGroup>);

impl StaticGroups {
    pub fn new(groups: Vec<SignatureGroup>) -> Self {
        StaticGroups(groups)
    }
}

impl SignatureGroups for StaticGroups {
    fn iter(&self) -> GroupIter<'_> {
        Box::new(self.0.iter().cloned().map(Ok))
    }
}
