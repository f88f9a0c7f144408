use crate::auth::authorization_header;
use crate::dry_run::{DryRunnable, Execute};
use crate::metrics_defs::{MUTATION_FAILED, MUTATION_SUCCEEDED, RECORDS_FETCHED};
use crate::mutation::{Mutation, STATUS_TO_REVIEW, STATUS_TO_SIGN};
use crate::types::{RecordBody, RecordFields, RecordList, RemoteRecord, Snapshot, StatusBody, StatusField};
use async_trait::async_trait;
use http::header::{AUTHORIZATION, HeaderMap, HeaderValue, LAST_MODIFIED};
use http::StatusCode;
use shared::marker::Marker;
use shared::{counter, gauge};
use url::Url;

pub const DEFAULT_BUCKET: &str = "main-workspace";
pub const DEFAULT_COLLECTION: &str = "crash-reports-ondemand";

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("HTTP client error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{context}: [{status}]")]
    UnexpectedStatus {
        context: &'static str,
        status: StatusCode,
    },
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("authorization credential is not a valid header value")]
    InvalidCredential,
}

/// Everything needed to talk to one collection.
#[derive(Clone, Debug, PartialEq)]
pub struct CollectionConfig {
    pub server: Url,
    pub bucket: String,
    pub collection: String,
    pub authorization: String,
    pub dry_run: bool,
}

impl CollectionConfig {
    pub fn new(server: Url, authorization: impl Into<String>) -> Self {
        CollectionConfig {
            server,
            bucket: DEFAULT_BUCKET.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            authorization: authorization.into(),
            dry_run: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Endpoints {
    collection: String,
    records: String,
}

impl Endpoints {
    fn new(server: &Url, bucket: &str, collection: &str) -> Result<Self, ClientError> {
        if server.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(server.to_string()));
        }

        let collection = format!(
            "{}/buckets/{bucket}/collections/{collection}",
            server.as_str().trim_end_matches('/'),
        );
        let records = format!("{collection}/records");

        Ok(Endpoints {
            collection,
            records,
        })
    }

    fn record(&self, id: &str) -> String {
        format!("{}/{id}", self.records)
    }
}

/// Sends mutations to the collection over HTTP.
#[derive(Clone)]
pub struct HttpExecutor {
    client: reqwest::Client,
    endpoints: Endpoints,
}

#[async_trait]
impl Execute for HttpExecutor {
    async fn execute(&self, mutation: &Mutation) -> Result<bool, ClientError> {
        let request = match mutation {
            Mutation::Upsert {
                id,
                description,
                hashes,
            } => self.client.put(self.endpoints.record(id)).json(&RecordBody {
                data: RecordFields {
                    description,
                    hashes,
                },
            }),
            Mutation::Delete(record) => self.client.delete(self.endpoints.record(&record.id)),
            Mutation::DeleteAll => self.client.delete(&self.endpoints.records),
            Mutation::RequestReview => self.client.patch(&self.endpoints.collection).json(&StatusBody {
                data: StatusField {
                    status: STATUS_TO_REVIEW,
                },
            }),
            Mutation::Approve => self.client.patch(&self.endpoints.collection).json(&StatusBody {
                data: StatusField {
                    status: STATUS_TO_SIGN,
                },
            }),
        };

        let response = request.send().await?;
        let status = response.status();

        if mutation.is_accepted(status) {
            counter!(MUTATION_SUCCEEDED, "kind" => mutation.kind()).increment(1);
            return Ok(true);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(
            status = %status,
            body = %body,
            "{}",
            mutation.failure_message()
        );
        counter!(MUTATION_FAILED, "kind" => mutation.kind()).increment(1);
        Ok(false)
    }
}

/// Typed access to the records of a single collection.
///
/// Reads always hit the server. Mutations go through a [`DryRunnable`]
/// executor, so in dry-run mode they are only logged.
pub struct RemoteSettingsClient {
    http: HttpExecutor,
    mutations: DryRunnable<HttpExecutor>,
}

impl RemoteSettingsClient {
    pub fn new(config: &CollectionConfig) -> Result<Self, ClientError> {
        let endpoints = Endpoints::new(&config.server, &config.bucket, &config.collection)?;

        let mut auth = HeaderValue::from_str(&authorization_header(&config.authorization))
            .map_err(|_| ClientError::InvalidCredential)?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        let http = HttpExecutor { client, endpoints };

        Ok(RemoteSettingsClient {
            mutations: DryRunnable::new(http.clone(), config.dry_run),
            http,
        })
    }

    pub fn collection_endpoint(&self) -> &str {
        &self.http.endpoints.collection
    }

    pub fn is_dry_run(&self) -> bool {
        self.mutations.is_dry_run()
    }

    /// Fetches every record and the collection's last modification time.
    ///
    /// Anything but `200 OK` is an error: there is no way to reconcile against
    /// a partial view of the collection.
    pub async fn fetch_all(&self) -> Result<Snapshot, ClientError> {
        tracing::info!("Get existing data from {}", self.http.endpoints.collection);

        let response = self.http.client.get(&self.http.endpoints.records).send().await?;

        if response.status() != StatusCode::OK {
            return Err(ClientError::UnexpectedStatus {
                context: "Can't retrieve records",
                status: response.status(),
            });
        }

        let marker = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| match Marker::parse(raw) {
                Ok(marker) => Some(marker),
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring unparseable Last-Modified header");
                    None
                }
            });

        let RecordList { data: records } = response.json().await?;
        gauge!(RECORDS_FETCHED).set(records.len() as f64);

        Ok(Snapshot { records, marker })
    }

    /// Creates or replaces the record with the given id.
    pub async fn upsert(
        &self,
        id: &str,
        description: &str,
        hashes: &[String],
    ) -> Result<bool, ClientError> {
        self.mutations
            .execute(&Mutation::Upsert {
                id: id.to_string(),
                description: description.to_string(),
                hashes: hashes.to_vec(),
            })
            .await
    }

    pub async fn delete(&self, record: &RemoteRecord) -> Result<bool, ClientError> {
        self.mutations
            .execute(&Mutation::Delete(record.clone()))
            .await
    }

    pub async fn delete_all(&self) -> Result<bool, ClientError> {
        self.mutations.execute(&Mutation::DeleteAll).await
    }

    /// Moves the collection to review.
    pub async fn request_review(&self) -> Result<bool, ClientError> {
        self.mutations.execute(&Mutation::RequestReview).await
    }

    /// Signs the pending changes directly. Only permitted on servers where
    /// the writer may approve its own changes.
    pub async fn approve(&self) -> Result<bool, ClientError> {
        self.mutations.execute(&Mutation::Approve).await
    }
}
