//! Signature rows exported from the top crashers query.
//!
//! The export is newline-delimited JSON, one row per line, already ranked by
//! the query. Row order is kept as-is.
use crate::metrics_defs::ROWS_LOADED;
use crate::source::{SignatureGroups, SignatureSource, SourceError, StaticGroups};
use crate::types::SignatureGroup;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use shared::histogram;
use shared::marker::Marker;
use std::path::PathBuf;

pub struct RowsSource {
    path: PathBuf,
}

impl RowsSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        RowsSource { path: path.into() }
    }

    fn parse(&self, contents: &str) -> Result<Vec<SignatureGroup>, SourceError> {
        contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| -> Result<SignatureGroup, SourceError> {
                let row: Value = serde_json::from_str(line).map_err(|source| SourceError::Json {
                    location: format!("{}:{}", self.path.display(), index + 1),
                    source,
                })?;
                Ok(SignatureGroup::from_row(&row)?)
            })
            .collect()
    }
}

#[async_trait]
impl SignatureSource for RowsSource {
    fn name(&self) -> &'static str {
        "rows"
    }

    async fn new_data_since(&self, marker: &Marker) -> Result<bool, SourceError> {
        let modified = tokio::fs::metadata(&self.path)
            .await
            .and_then(|metadata| metadata.modified())
            .map_err(|e| SourceError::io(&self.path, e))?;

        Ok(DateTime::<Utc>::from(modified) > marker.timestamp())
    }

    async fn load(&self) -> Result<Box<dyn SignatureGroups>, SourceError> {
        tracing::info!("Read top crashers from {}", self.path.display());

        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SourceError::io(&self.path, e))?;

        let groups = self.parse(&contents)?;
        histogram!(ROWS_LOADED).record(groups.len() as f64);

        Ok(Box::new(StaticGroups::new(groups)))
    }
}
