//! Crash id archive published by the crash ping pipeline.
//!
//! The archive is a gzipped tarball with one JSON file per process type and
//! channel, named `<process>_<channel>-crash-ids.json`. Each file maps a
//! signature key to `{"description": ..., "hashes": [...]}`.
use crate::metrics_defs::{ARCHIVE_BYTES, ARCHIVE_NOT_MODIFIED};
use crate::source::{GroupIter, SignatureGroups, SignatureSource, SourceError};
use crate::types::SignatureGroup;
use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use http::header::IF_MODIFIED_SINCE;
use serde_json::{Map, Value};
use shared::marker::Marker;
use shared::{counter, histogram};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::process::Command;
use tokio::sync::Mutex;
use url::Url;

const ARCHIVE_FILENAME: &str = "crash-ids.tar.gz";
const TAR: &str = "tar";

#[derive(Clone, Debug, PartialEq)]
pub struct ArchiveConfig {
    pub url: Url,
    pub processes: Vec<String>,
    pub channels: Vec<String>,
}

pub struct ArchiveSource {
    client: reqwest::Client,
    config: ArchiveConfig,
    // Body fetched by a successful freshness check, reused by `load`.
    fetched: Mutex<Option<Bytes>>,
}

impl ArchiveSource {
    pub fn new(config: ArchiveConfig) -> Self {
        ArchiveSource {
            client: reqwest::Client::new(),
            config,
            fetched: Mutex::new(None),
        }
    }

    /// Downloads the archive. With a marker, the request is conditional and
    /// `None` is returned when the server reports no modification.
    async fn fetch(&self, marker: Option<&Marker>) -> Result<Option<Bytes>, SourceError> {
        tracing::info!("Get top crashers from {}", self.config.url);

        let mut request = self.client.get(self.config.url.clone());
        if let Some(marker) = marker {
            request = request.header(IF_MODIFIED_SINCE, marker.as_header_value());
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::OK => {
                let body = response.bytes().await?;
                histogram!(ARCHIVE_BYTES).record(body.len() as f64);
                Ok(Some(body))
            }
            StatusCode::NOT_MODIFIED if marker.is_some() => {
                counter!(ARCHIVE_NOT_MODIFIED).increment(1);
                Ok(None)
            }
            status => Err(SourceError::UnexpectedStatus {
                context: "Can't retrieve top crashers",
                status,
            }),
        }
    }

    fn partitions(&self) -> Vec<(String, String)> {
        self.config
            .channels
            .iter()
            .flat_map(|channel| {
                self.config
                    .processes
                    .iter()
                    .map(move |process| (process.clone(), channel.clone()))
            })
            .collect()
    }
}

#[async_trait]
impl SignatureSource for ArchiveSource {
    fn name(&self) -> &'static str {
        "archive"
    }

    async fn new_data_since(&self, marker: &Marker) -> Result<bool, SourceError> {
        match self.fetch(Some(marker)).await? {
            Some(body) => {
                *self.fetched.lock().await = Some(body);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn load(&self) -> Result<Box<dyn SignatureGroups>, SourceError> {
        let cached = self.fetched.lock().await.take();
        let body = match cached {
            Some(body) => body,
            None => self
                .fetch(None)
                .await?
                .ok_or(SourceError::UnexpectedStatus {
                    context: "Can't retrieve top crashers",
                    status: StatusCode::NOT_MODIFIED,
                })?,
        };

        let unpacked = unpack(&body, self.partitions()).await?;
        Ok(Box::new(unpacked))
    }
}

/// Writes the archive to a temporary directory and extracts it there.
async fn unpack(body: &[u8], partitions: Vec<(String, String)>) -> Result<UnpackedArchive, SourceError> {
    let dir = TempDir::new().map_err(|e| SourceError::io(std::env::temp_dir(), e))?;
    let archive_path = dir.path().join(ARCHIVE_FILENAME);

    tokio::fs::write(&archive_path, body)
        .await
        .map_err(|e| SourceError::io(&archive_path, e))?;

    let output = Command::new(TAR)
        .arg("-xzf")
        .arg(&archive_path)
        .arg("-C")
        .arg(dir.path())
        .output()
        .await
        .map_err(|e| SourceError::io(&archive_path, e))?;

    if !output.status.success() {
        return Err(SourceError::ExternalTool {
            tool: TAR,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(UnpackedArchive { dir, partitions })
}

/// An extracted archive. Partition files are read lazily while iterating.
pub struct UnpackedArchive {
    dir: TempDir,
    partitions: Vec<(String, String)>,
}

impl UnpackedArchive {
    fn partition_path(&self, process: &str, channel: &str) -> PathBuf {
        self.dir
            .path()
            .join(format!("{process}_{channel}-crash-ids.json"))
    }

    // Entries are yielded sorted by key so iteration order only depends on
    // the file contents.
    fn read_partition(&self, process: &str, channel: &str) -> Vec<Result<SignatureGroup, SourceError>> {
        let path = self.partition_path(process, channel);
        match read_entries(&path) {
            Ok(Some(entries)) => {
                let mut entries: Vec<_> = entries.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                entries
                    .into_iter()
                    .map(|(key, entry)| {
                        SignatureGroup::from_entry(process, channel, key, entry).map_err(Into::into)
                    })
                    .collect()
            }
            Ok(None) => {
                tracing::debug!(process, channel, "No crash ids published for partition");
                Vec::new()
            }
            Err(e) => vec![Err(e)],
        }
    }
}

impl SignatureGroups for UnpackedArchive {
    fn iter(&self) -> GroupIter<'_> {
        Box::new(
            self.partitions
                .iter()
                .flat_map(|(process, channel)| self.read_partition(process, channel)),
        )
    }
}

/// Reads one partition file. A missing file means the partition has no top
/// crashers.
fn read_entries(path: &Path) -> Result<Option<Map<String, Value>>, SourceError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(SourceError::io(path, e)),
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| SourceError::Json {
            location: path.display().to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{headers, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Builds a gzipped tarball from `(filename, contents)` pairs with the
    /// system tar.
    fn make_archive(files: &[(&str, &str)]) -> Vec<u8> {
        let src = tempfile::tempdir().unwrap();
        for (name, contents) in files {
            std::fs::write(src.path().join(name), contents).unwrap();
        }
        let out = tempfile::tempdir().unwrap();
        let archive = out.path().join("out.tar.gz");
        let status = std::process::Command::new("tar")
            .arg("-czf")
            .arg(&archive)
            .arg("-C")
            .arg(src.path())
            .arg(".")
            .status()
            .unwrap();
        assert!(status.success());
        std::fs::read(archive).unwrap()
    }

    fn config(server: &MockServer) -> ArchiveConfig {
        ArchiveConfig {
            url: Url::parse(&format!("{}/crash-ids.tar.gz", server.uri())).unwrap(),
            processes: vec!["gpu".into(), "rdd".into()],
            channels: vec!["nightly".into(), "beta".into()],
        }
    }

    fn collect(groups: &dyn SignatureGroups) -> Vec<SignatureGroup> {
        groups.iter().map(|g| g.unwrap()).collect()
    }

    #[tokio::test]
    async fn test_load_orders_partitions_and_keys() {
        let archive = make_archive(&[
            (
                "gpu_nightly-crash-ids.json",
                r#"{"zz": {"description": "late", "hashes": ["1"]}, "aa": {"description": "early", "hashes": ["2", "3"]}}"#,
            ),
            (
                "rdd_beta-crash-ids.json",
                r#"{"k": {"description": "rdd beta", "hashes": []}}"#,
            ),
        ]);

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/crash-ids.tar.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
            .expect(1)
            .mount(&server)
            .await;

        let source = ArchiveSource::new(config(&server));
        let groups = source.load().await.unwrap();
        let first = collect(groups.as_ref());

        let summary: Vec<_> = first
            .iter()
            .map(|g| (g.process_type.as_str(), g.channel.as_str(), g.signature.as_str()))
            .collect();
        // Channels outer, processes inner, keys sorted; rdd_nightly and
        // gpu_beta are absent and skipped.
        assert_eq!(
            summary,
            vec![
                ("gpu", "nightly", "early"),
                ("gpu", "nightly", "late"),
                ("rdd", "beta", "rdd beta"),
            ]
        );

        // Iterating again yields the same sequence.
        assert_eq!(first, collect(groups.as_ref()));
    }

    #[tokio::test]
    async fn test_conditional_fetch_not_modified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/crash-ids.tar.gz"))
            // wiremock splits header values on commas, so match the HTTP-date in its split form.
            .and(headers("if-modified-since", vec!["Wed", "21 Oct 2015 07:28:00 GMT"]))
            .respond_with(ResponseTemplate::new(304))
            .expect(1)
            .mount(&server)
            .await;

        let source = ArchiveSource::new(config(&server));
        let marker = Marker::parse("Wed, 21 Oct 2015 07:28:00 GMT").unwrap();
        assert!(!source.new_data_since(&marker).await.unwrap());
    }

    #[tokio::test]
    async fn test_fresh_archive_is_downloaded_once() {
        let archive = make_archive(&[(
            "gpu_nightly-crash-ids.json",
            r#"{"a": {"description": "sig", "hashes": ["h"]}}"#,
        )]);

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/crash-ids.tar.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
            .expect(1)
            .mount(&server)
            .await;

        let source = ArchiveSource::new(config(&server));
        let marker = Marker::parse("Wed, 21 Oct 2015 07:28:00 GMT").unwrap();
        assert!(source.new_data_since(&marker).await.unwrap());

        let groups = source.load().await.unwrap();
        assert_eq!(collect(groups.as_ref()).len(), 1);
    }

    #[tokio::test]
    async fn test_unpack_failure_is_external_tool_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/crash-ids.tar.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not a tarball"))
            .mount(&server)
            .await;

        let source = ArchiveSource::new(config(&server));
        match source.load().await {
            Err(SourceError::ExternalTool { tool, .. }) => assert_eq!(tool, "tar"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("garbage archive unpacked"),
        }
    }

    #[tokio::test]
    async fn test_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/crash-ids.tar.gz"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let source = ArchiveSource::new(config(&server));
        let marker = Marker::parse("Wed, 21 Oct 2015 07:28:00 GMT").unwrap();
        assert!(matches!(
            source.new_data_since(&marker).await,
            Err(SourceError::UnexpectedStatus { status: StatusCode::INTERNAL_SERVER_ERROR, .. })
        ));
    }

    #[tokio::test]
    async fn test_malformed_partition_surfaces_during_iteration() {
        let archive = make_archive(&[
            (
                "gpu_nightly-crash-ids.json",
                r#"{"a": {"description": "sig", "hashes": ["h", 1]}}"#,
            ),
            ("rdd_nightly-crash-ids.json", "{ not json"),
        ]);

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/crash-ids.tar.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
            .mount(&server)
            .await;

        let source = ArchiveSource::new(config(&server));
        let groups = source.load().await.unwrap();
        let results: Vec<_> = groups.iter().collect();
        assert_eq!(results.len(), 2);
        match &results[0] {
            Err(SourceError::Malformed(e)) => {
                assert_eq!(e.process_type, "gpu");
                assert_eq!(e.signature, "a");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(results[1], Err(SourceError::Json { .. })));
    }
}
