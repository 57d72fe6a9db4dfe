use super::{RawResponse, Requester};
use crate::config::ClientConfig;
use crate::descriptor::{header_name, is_absolute, join, RequestBody, RequestDescriptor};
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Turns `Serialized` bodies into bytes.
pub trait BodySerializer: Send + Sync {
    fn content_type(&self) -> &'static str;
    fn serialize(&self, value: &Value) -> Result<Bytes>;
}

/// `application/json` via `serde_json`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBodySerializer;

impl BodySerializer for JsonBodySerializer {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn serialize(&self, value: &Value) -> Result<Bytes> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|source| Error::Serialize {
                parameter: "body".to_string(),
                source,
            })
    }
}

type Modifier = Arc<dyn Fn(RequestBuilder, &RequestDescriptor) -> RequestBuilder + Send + Sync>;

/// [`Requester`] backed by a `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestRequester {
    client: Client,
    base_url: Option<Url>,
    serializer: Arc<dyn BodySerializer>,
    modifier: Option<Modifier>,
}

impl fmt::Debug for ReqwestRequester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestRequester")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("modifier", &self.modifier.is_some())
            .finish()
    }
}

impl ReqwestRequester {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Self::from_config(&ClientConfig {
            base_url: Some(base_url.as_ref().to_string()),
            ..ClientConfig::default()
        })
    }

    /// Wrap an existing client. Relative paths need a base URL.
    pub fn from_reqwest(client: Client, base_url: Option<&str>) -> Result<Self> {
        let base_url = base_url.map(Url::parse).transpose()?;
        Ok(Self {
            client,
            base_url,
            serializer: Arc::new(JsonBodySerializer),
            modifier: None,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut builder = Client::builder().user_agent(config.user_agent.as_str());
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        if !config.default_headers.is_empty() {
            let mut headers = HeaderMap::new();
            for (name, value) in &config.default_headers {
                let name = header_name(name).map_err(Error::Config)?;
                let value = HeaderValue::from_str(value)
                    .map_err(|e| Error::Config(format!("default header `{name}`: {e}")))?;
                headers.append(name, value);
            }
            builder = builder.default_headers(headers);
        }
        Self::from_reqwest(builder.build()?, config.base_url.as_deref())
    }

    pub fn with_serializer(mut self, serializer: impl BodySerializer + 'static) -> Self {
        self.serializer = Arc::new(serializer);
        self
    }

    /// Adjust every outgoing request, e.g. to add authentication.
    pub fn with_modifier<F>(mut self, modifier: F) -> Self
    where
        F: Fn(RequestBuilder, &RequestDescriptor) -> RequestBuilder + Send + Sync + 'static,
    {
        self.modifier = Some(Arc::new(modifier));
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Absolute URL for a descriptor.
    pub fn url_for(&self, request: &RequestDescriptor) -> Result<Url> {
        let target = request.path_and_query();
        if is_absolute(&target) && !target.starts_with('/') {
            return Ok(Url::parse(&target)?);
        }
        let base = self.base_url.as_ref().ok_or_else(|| {
            Error::Config(format!(
                "`{}` has a relative path `{}` and no base URL is configured",
                request.operation, request.path
            ))
        })?;
        Ok(Url::parse(&join(base.as_str(), &target))?)
    }

    fn body(&self, body: &RequestBody) -> Result<(Bytes, &'static str)> {
        Ok(match body {
            RequestBody::Bytes(bytes) => (bytes.clone(), "application/octet-stream"),
            RequestBody::Text(text) => (Bytes::from(text.clone()), "text/plain; charset=utf-8"),
            RequestBody::UrlEncoded(pairs) => (
                Bytes::from(RequestBody::form_encoded(pairs)),
                "application/x-www-form-urlencoded",
            ),
            RequestBody::Serialized(value) => (
                self.serializer.serialize(value)?,
                self.serializer.content_type(),
            ),
        })
    }
}

#[async_trait]
impl Requester for ReqwestRequester {
    async fn send(&self, request: RequestDescriptor) -> Result<RawResponse> {
        let url = self.url_for(&request)?;
        let mut headers = request.headers.clone();

        let mut builder = self.client.request(request.method.clone(), url.clone());
        if let Some(body) = &request.body {
            let (bytes, content_type) = self.body(body)?;
            if !headers.contains_key(CONTENT_TYPE) {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
            }
            builder = builder.body(bytes);
        }
        builder = builder.headers(headers);
        if let Some(modifier) = &self.modifier {
            builder = modifier(builder, &request);
        }

        debug!(operation = %request.operation, url = %url, "HTTP request");
        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().to_string();
        let body = response.bytes().await?;

        Ok(RawResponse {
            status,
            headers,
            body,
            url,
        })
    }
}
