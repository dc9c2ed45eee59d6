use async_trait::async_trait;
use catalog_config::SearchConfig;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use tracing::{debug, info};
use url::Url;

use super::{SearchEngine, SearchHits, SearchRequest, build_search_query};
use crate::error::{CatalogError, Result};

#[derive(Debug, Deserialize)]
struct SearchResponseBody {
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    total: TotalHits,
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct TotalHits {
    value: u64,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_source", default)]
    source: Value,
}

/// OpenSearch REST client.
#[derive(Clone)]
pub struct OpenSearchClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Option<(String, String)>,
}

impl fmt::Debug for OpenSearchClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenSearchClient")
            .field("base_url", &self.base_url.as_str())
            .field("authenticated", &self.credentials.is_some())
            .finish()
    }
}

impl OpenSearchClient {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let base_url = Url::parse(&config.url).map_err(|err| {
            CatalogError::InvalidInput(format!(
                "invalid search url {:?}: {err}",
                config.url
            ))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(CatalogError::InvalidInput(format!(
                "search url {:?} cannot carry a path",
                config.url
            )));
        }

        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .timeout(config.timeout)
            .build()?;

        let credentials = config
            .credentials()
            .map(|(user, pass)| (user.to_string(), pass.to_string()));

        info!(url = %base_url, authenticated = credentials.is_some(), "search client configured");

        Ok(Self {
            http,
            base_url,
            credentials,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CatalogError::Search("search url cannot carry a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.credentials {
            Some((user, pass)) => builder.basic_auth(user, Some(pass)),
            None => builder,
        }
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        Err(CatalogError::HttpStatus { status, url, body })
    }
}

#[async_trait]
impl SearchEngine for OpenSearchClient {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        let url = self.endpoint(&[index])?;
        let response = self.request(Method::HEAD, url).send().await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Self::check(response).await.map(|_| true),
        }
    }

    async fn create_index(&self, index: &str, mapping: &Value) -> Result<()> {
        let url = self.endpoint(&[index])?;
        let response = self.request(Method::PUT, url).json(mapping).send().await?;
        Self::check(response).await?;
        info!(index, "created search index");
        Ok(())
    }

    async fn index_document(&self, index: &str, id: &str, document: &Value) -> Result<()> {
        let mut url = self.endpoint(&[index, "_doc", id])?;
        url.query_pairs_mut().append_pair("refresh", "true");
        let response = self.request(Method::PUT, url).json(document).send().await?;
        Self::check(response).await?;
        debug!(index, id, "indexed document");
        Ok(())
    }

    async fn delete_document(&self, index: &str, id: &str) -> Result<()> {
        let mut url = self.endpoint(&[index, "_doc", id])?;
        url.query_pairs_mut().append_pair("refresh", "true");
        let response = self.request(Method::DELETE, url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(index, id, "document already absent");
            return Ok(());
        }
        Self::check(response).await?;
        debug!(index, id, "deleted document");
        Ok(())
    }

    async fn search(&self, index: &str, request: &SearchRequest) -> Result<SearchHits> {
        let mut url = self.endpoint(&[index, "_search"])?;
        url.query_pairs_mut()
            .append_pair("from", &request.from().to_string())
            .append_pair("size", &request.page_size.to_string());

        let body = build_search_query(request);
        let response = self.request(Method::POST, url).json(&body).send().await?;
        let parsed: SearchResponseBody = Self::check(response).await?.json().await?;

        Ok(SearchHits {
            total: parsed.hits.total.value,
            hits: parsed.hits.hits.into_iter().map(|hit| hit.source).collect(),
            page: request.page,
            size: request.page_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves a single request with an empty response of the given status
    /// line and returns the base URL.
    async fn one_shot_server(status: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let read = socket.read(&mut buf).await.unwrap();
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..read]);
            }
            let response =
                format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{addr}")
    }

    fn config(url: &str) -> SearchConfig {
        SearchConfig {
            url: url.into(),
            username: None,
            password: None,
            index_prefix: "th".into(),
            timeout: Duration::from_secs(1),
            accept_invalid_certs: true,
        }
    }

    #[test]
    fn endpoints_escape_segments_and_keep_base_path() {
        let client = OpenSearchClient::new(&config("http://search:9200/os/")).unwrap();
        let url = client.endpoint(&["th-episodes", "_doc", "a/b"]).unwrap();
        assert_eq!(url.as_str(), "http://search:9200/os/th-episodes/_doc/a%2Fb");
    }

    #[test]
    fn rejects_unusable_urls() {
        assert!(OpenSearchClient::new(&config("not a url")).is_err());
        assert!(OpenSearchClient::new(&config("mailto:ops@example.com")).is_err());
    }

    #[test]
    fn parses_hits_envelope() {
        let raw = r#"{"hits":{"total":{"value":2,"relation":"eq"},"hits":[{"_id":"1","_source":{"id":"1"}},{"_id":"2","_source":{"id":"2"}}]}}"#;
        let parsed: SearchResponseBody = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.hits.total.value, 2);
        assert_eq!(parsed.hits.hits[1].source["id"], "2");
    }

    #[tokio::test]
    async fn deleting_an_absent_document_succeeds() {
        let url = one_shot_server("404 Not Found").await;
        let client = OpenSearchClient::new(&config(&url)).unwrap();
        client.delete_document("th-episodes", "missing").await.unwrap();
    }

    #[tokio::test]
    async fn delete_surfaces_server_errors() {
        let url = one_shot_server("503 Service Unavailable").await;
        let client = OpenSearchClient::new(&config(&url)).unwrap();
        let err = client.delete_document("th-episodes", "ep-1").await.unwrap_err();
        assert!(err.is_retryable(), "{err:?}");
    }
}
