use serde::{Deserialize, Serialize};
use shared::marker::Marker;

/// A record as stored in the remote collection.
///
/// Only `id` is authoritative. The description is a derived label and the
/// server may attach further metadata fields, which are ignored.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct RemoteRecord {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub hashes: Vec<String>,
}

impl RemoteRecord {
    pub fn new<I, D>(id: I, description: D, hashes: Vec<String>) -> Self
    where
        I: Into<String>,
        D: Into<String>,
    {
        RemoteRecord {
            id: id.into(),
            description: description.into(),
            hashes,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct RecordList {
    pub data: Vec<RemoteRecord>,
}

#[derive(Serialize)]
pub(crate) struct RecordBody<'a> {
    pub data: RecordFields<'a>,
}

#[derive(Serialize)]
pub(crate) struct RecordFields<'a> {
    pub description: &'a str,
    pub hashes: &'a [String],
}

#[derive(Serialize)]
pub(crate) struct StatusBody {
    pub data: StatusField,
}

#[derive(Serialize)]
pub(crate) struct StatusField {
    pub status: &'static str,
}

/// Observed state of the collection at the start of a run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub records: Vec<RemoteRecord>,
    pub marker: Option<Marker>,
}
