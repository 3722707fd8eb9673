//! Qdrant REST client.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CollectionSpec, Distance, Point, PointPayload, VectorStore};
use crate::error::StoreError;
use crate::telemetry::STORE_REQUESTS;
use crate::{Error, Result};

/// Vector store backed by a Qdrant server.
#[derive(Clone)]
pub struct QdrantStore {
    client: Client,
    base_url: Url,
    max_retries: usize,
}

impl QdrantStore {
    /// Build a client for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot carry a path, the API key is not a
    /// valid header value, or the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        timeout: Duration,
        max_retries: usize,
    ) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| Error::config(format!("invalid Qdrant URL '{base_url}': {e}")))?;
        if parsed.cannot_be_a_base() {
            return Err(Error::config(format!("invalid Qdrant URL '{base_url}'")));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key.map(str::trim).filter(|k| !k.is_empty()) {
            let value = HeaderValue::from_str(key)
                .map_err(|e| Error::config(format!("invalid Qdrant API key: {e}")))?;
            headers.insert("api-key", value);
        }

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: parsed,
            max_retries: max_retries.max(1),
        })
    }

    /// Build a client and verify the server answers.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unreachable`] if the collection list cannot be
    /// fetched.
    pub async fn connect(
        base_url: &str,
        api_key: Option<&str>,
        timeout: Duration,
        max_retries: usize,
    ) -> Result<Self> {
        let store = Self::new(base_url, api_key, timeout, max_retries)?;
        let collections = store.list_collections().await.map_err(|e| {
            Error::Store(StoreError::Unreachable {
                url: store.base_url.to_string(),
                reason: e.to_string(),
            })
        })?;
        tracing::info!(url = %store.base_url, collections = collections.len(), "Connected to Qdrant");
        Ok(store)
    }

    /// Names of all collections on the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_collections(&self) -> Result<Vec<String>> {
        let url = self.endpoint(&["collections"])?;
        let resp = self
            .send("list_collections", "*", || self.client.get(url.clone()))
            .await?;
        let body: ApiResponse<CollectionsResult> = decode(resp).await?;
        Ok(body.result.collections.into_iter().map(|c| c.name).collect())
    }

    /// Base URL extended with percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::config(format!("invalid Qdrant URL '{}'", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Endpoint under a collection, waiting for the write to be applied.
    fn write_endpoint(&self, collection: &str, tail: &[&str]) -> Result<Url> {
        let mut segments = vec!["collections", collection];
        segments.extend_from_slice(tail);
        let mut url = self.endpoint(&segments)?;
        url.set_query(Some("wait=true"));
        Ok(url)
    }

    /// Send a request, retrying connection failures, timeouts, 429 and 5xx.
    async fn send<F>(
        &self,
        operation: &'static str,
        collection: &str,
        build: F,
    ) -> Result<Response>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut attempt = 0usize;
        loop {
            match build().send().await {
                Ok(resp) => {
                    let status = resp.status();
                    STORE_REQUESTS
                        .with_label_values(&[operation, status.as_str()])
                        .inc();
                    if status.is_success() {
                        return Ok(resp);
                    }
                    if should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        tracing::warn!(operation, %status, attempt, "Retrying Qdrant request");
                        tokio::time::sleep(retry_backoff(attempt)).await;
                        continue;
                    }
                    let body = resp
                        .text()
                        .await
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    return Err(StoreError::Rejected {
                        operation,
                        collection: collection.to_string(),
                        status: status.as_u16(),
                        body,
                    }
                    .into());
                }
                Err(err) => {
                    STORE_REQUESTS
                        .with_label_values(&[operation, "transport"])
                        .inc();
                    let transient = err.is_connect() || err.is_timeout() || err.is_request();
                    if transient && attempt + 1 < self.max_retries {
                        attempt += 1;
                        tracing::warn!(operation, error = %err, attempt, "Retrying Qdrant request");
                        tokio::time::sleep(retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(StoreError::transport(operation, err.to_string()).into());
                }
            }
        }
    }
}

impl std::fmt::Debug for QdrantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantStore")
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self, name: &str, spec: &CollectionSpec) -> Result<bool> {
        if self.list_collections().await?.iter().any(|c| c == name) {
            tracing::debug!(collection = name, "Collection exists");
            return Ok(false);
        }

        let url = self.endpoint(&["collections", name])?;
        let body = CreateCollection::from_spec(spec);
        let result = self
            .send("create_collection", name, || self.client.put(url.clone()).json(&body))
            .await;

        match result {
            Ok(_) => {
                tracing::info!(collection = name, size = spec.size, "Created collection");
                Ok(true)
            }
            // Another writer created it between the list and the create.
            Err(Error::Store(StoreError::Rejected { status: 409, .. })) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let url = self.write_endpoint(collection, &["points"])?;
        let body = UpsertPoints {
            points: points.iter().map(WirePoint::from).collect(),
        };
        self.send("upsert", collection, || self.client.put(url.clone()).json(&body))
            .await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[Uuid]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let url = self.write_endpoint(collection, &["points", "delete"])?;
        let body = DeletePoints { points: ids };
        self.send("delete", collection, || self.client.post(url.clone()).json(&body))
            .await?;
        Ok(())
    }

    async fn point_count(&self, collection: &str) -> Result<u64> {
        let url = self.endpoint(&["collections", collection])?;
        let resp = self
            .send("collection_info", collection, || self.client.get(url.clone()))
            .await
            .map_err(|e| match e {
                Error::Store(StoreError::Rejected { status: 404, .. }) => {
                    StoreError::CollectionNotFound(collection.to_string()).into()
                }
                other => other,
            })?;
        let body: ApiResponse<CollectionInfo> = decode(resp).await?;
        Ok(body.result.points_count.unwrap_or(0))
    }
}

async fn decode<T: for<'de> Deserialize<'de>>(resp: Response) -> Result<T> {
    resp.json::<T>()
        .await
        .map_err(|e| StoreError::Decode(e.to_string()).into())
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = u32::try_from(attempt.min(5)).unwrap_or(5);
    Duration::from_millis(250 * (1 << capped))
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct CollectionsResult {
    #[serde(default)]
    collections: Vec<CollectionDescription>,
}

#[derive(Debug, Deserialize)]
struct CollectionDescription {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    #[serde(default)]
    points_count: Option<u64>,
}

#[derive(Debug, Serialize)]
struct VectorParams {
    size: usize,
    distance: Distance,
}

#[derive(Debug, Serialize)]
struct CreateCollection {
    vectors: HashMap<String, VectorParams>,
}

impl CreateCollection {
    fn from_spec(spec: &CollectionSpec) -> Self {
        let mut vectors = HashMap::new();
        vectors.insert(
            spec.vector_name.clone(),
            VectorParams {
                size: spec.size,
                distance: spec.distance,
            },
        );
        Self { vectors }
    }
}

#[derive(Debug, Serialize)]
struct WirePoint<'a> {
    id: Uuid,
    vector: HashMap<&'a str, &'a [f32]>,
    payload: &'a PointPayload,
}

impl<'a> From<&'a Point> for WirePoint<'a> {
    fn from(point: &'a Point) -> Self {
        let mut vector = HashMap::new();
        vector.insert(point.vector_name.as_str(), point.vector.as_slice());
        Self {
            id: point.id,
            vector,
            payload: &point.payload,
        }
    }
}

#[derive(Debug, Serialize)]
struct UpsertPoints<'a> {
    points: Vec<WirePoint<'a>>,
}

#[derive(Debug, Serialize)]
struct DeletePoints<'a> {
    points: &'a [Uuid],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PointMetadata;

    fn sample_point() -> Point {
        Point {
            id: Uuid::nil(),
            vector_name: "fast-all-minilm-l6-v2".to_string(),
            vector: vec![0.5, -0.5],
            payload: PointPayload {
                document: "chunk text".to_string(),
                metadata: PointMetadata {
                    file_path: "notes/a.md".to_string(),
                    title: "A".to_string(),
                    chunk_index: 0,
                    total_chunks: 1,
                    collection: "personal".to_string(),
                    folder: "notes".to_string(),
                    last_modified: "2024-05-01T10:00:00+00:00".to_string(),
                },
            },
        }
    }

    #[test]
    fn test_create_collection_body() {
        let body = CreateCollection::from_spec(&CollectionSpec::cosine("fast-all-minilm-l6-v2", 384));
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "vectors": {"fast-all-minilm-l6-v2": {"size": 384, "distance": "Cosine"}}
            })
        );
    }

    #[test]
    fn test_wire_point_body() {
        let point = sample_point();
        let value = serde_json::to_value(WirePoint::from(&point)).unwrap();

        assert_eq!(value["id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(
            value["vector"]["fast-all-minilm-l6-v2"],
            serde_json::json!([0.5, -0.5])
        );
        assert_eq!(value["payload"]["document"], "chunk text");
        assert_eq!(value["payload"]["metadata"]["file_path"], "notes/a.md");
        assert_eq!(value["payload"]["metadata"]["total_chunks"], 1);
    }

    #[test]
    fn test_delete_body() {
        let ids = [Uuid::nil()];
        let value = serde_json::to_value(DeletePoints { points: &ids }).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"points": ["00000000-0000-0000-0000-000000000000"]})
        );
    }

    #[test]
    fn test_decode_collection_info() {
        let body: ApiResponse<CollectionInfo> = serde_json::from_str(
            r#"{"result":{"status":"green","points_count":42,"segments_count":2},"status":"ok","time":0.001}"#,
        )
        .unwrap();
        assert_eq!(body.result.points_count, Some(42));

        let empty: ApiResponse<CollectionInfo> =
            serde_json::from_str(r#"{"result":{"points_count":null}}"#).unwrap();
        assert_eq!(empty.result.points_count, None);
    }

    #[test]
    fn test_decode_collections() {
        let body: ApiResponse<CollectionsResult> = serde_json::from_str(
            r#"{"result":{"collections":[{"name":"work"},{"name":"personal"}]},"status":"ok"}"#,
        )
        .unwrap();
        let names: Vec<_> = body.result.collections.into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["work", "personal"]);
    }

    #[test]
    fn test_should_retry() {
        assert!(should_retry(StatusCode::TOO_MANY_REQUESTS));
        assert!(should_retry(StatusCode::BAD_GATEWAY));
        assert!(!should_retry(StatusCode::BAD_REQUEST));
        assert!(!should_retry(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_retry_backoff_is_capped() {
        assert_eq!(retry_backoff(1), Duration::from_millis(500));
        assert_eq!(retry_backoff(5), retry_backoff(50));
    }

    fn store(base_url: &str) -> QdrantStore {
        QdrantStore::new(base_url, None, Duration::from_secs(1), 0).unwrap()
    }

    #[test]
    fn test_endpoints() {
        let store = store("http://localhost:6333/");
        assert_eq!(store.max_retries, 1);
        assert_eq!(
            store.endpoint(&["collections", "work"]).unwrap().as_str(),
            "http://localhost:6333/collections/work"
        );
        assert_eq!(
            store.write_endpoint("work", &["points", "delete"]).unwrap().as_str(),
            "http://localhost:6333/collections/work/points/delete?wait=true"
        );
    }

    #[test]
    fn test_endpoints_keep_base_path() {
        let store = store("https://qdrant.example.com/proxy/");
        assert_eq!(
            store.write_endpoint("work", &["points"]).unwrap().as_str(),
            "https://qdrant.example.com/proxy/collections/work/points?wait=true"
        );
    }

    #[test]
    fn test_collection_name_is_percent_encoded() {
        let store = store("http://localhost:6333");
        assert_eq!(
            store.endpoint(&["collections", "a?b#c/d e"]).unwrap().as_str(),
            "http://localhost:6333/collections/a%3Fb%23c%2Fd%20e"
        );
        assert_eq!(
            store.write_endpoint("x?y", &["points"]).unwrap().as_str(),
            "http://localhost:6333/collections/x%3Fy/points?wait=true"
        );
    }

    #[test]
    fn test_new_rejects_invalid_url() {
        for url in ["not a url", "mailto:ops@example.com"] {
            let err = QdrantStore::new(url, None, Duration::from_secs(1), 1).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{url}");
        }
    }

    #[tokio::test]
    async fn test_connect_unreachable() {
        // Port 9 (discard) is not an HTTP server; connection fails fast.
        let err = QdrantStore::connect("http://127.0.0.1:9", None, Duration::from_secs(2), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::Unreachable { .. })));
    }
}
