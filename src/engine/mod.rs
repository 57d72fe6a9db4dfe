//! # Execution Engine
//!
//! Drives one call end to end: assemble the [`RequestDescriptor`], hand it to a
//! [`Requester`], apply the status policy and decode the reply per the
//! method's [`ResponseShape`].
//!
//! ## Overview
//!
//! [`ApiClient`] binds a validated [`ClientModel`] to a requester. Generated
//! clients wrap one and forward every trait method to [`ApiClient::invoke`];
//! hand-written callers can use it directly with lowered [`ArgValue`]s.
//!
//! The requester is the only place network I/O happens. The crate ships a
//! `reqwest` implementation behind the `transport` feature; tests and custom
//! transports implement the trait themselves.
//!
//! ## Thread Safety
//!
//! `ApiClient` is `Send + Sync`. Property values sit behind an `RwLock`; a
//! call holds the read guard only while the descriptor is assembled, never
//! across an `.await`.

#[cfg(feature = "transport")]
mod transport;

#[cfg(feature = "transport")]
pub use transport::{BodySerializer, JsonBodySerializer, ReqwestRequester};

use crate::descriptor::{ArgValue, PropertyValues, RequestDescriptor};
use crate::error::{snippet, Error, Result};
use crate::model::{ClientModel, ResponseShape};
use crate::registry::{self, Declared};
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// Longest body excerpt carried by HTTP and decode errors
pub const BODY_SNIPPET_LIMIT: usize = 512;

/// Sends assembled requests.
#[async_trait]
pub trait Requester: Send + Sync {
    async fn send(&self, request: RequestDescriptor) -> Result<RawResponse>;
}

#[async_trait]
impl<R: Requester + ?Sized> Requester for Arc<R> {
    async fn send(&self, request: RequestDescriptor) -> Result<RawResponse> {
        (**self).send(request).await
    }
}

#[async_trait]
impl<R: Requester + ?Sized> Requester for Box<R> {
    async fn send(&self, request: RequestDescriptor) -> Result<RawResponse> {
        (**self).send(request).await
    }
}

/// Undecoded response as returned by a [`Requester`].
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Final request URL, used in error messages
    pub url: String,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        RawResponse {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
            url: String::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body as UTF-8, invalid sequences replaced
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the body as JSON. An empty body decodes as `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let body: &[u8] = if self.body.is_empty() {
            b"null"
        } else {
            &self.body
        };
        serde_json::from_slice(body).map_err(|source| Error::Decode {
            url: self.url.clone(),
            source,
            body_snippet: snippet(&self.text(), BODY_SNIPPET_LIMIT),
        })
    }
}

/// A decoded value together with the response it came from.
#[derive(Debug, Clone)]
pub struct Response<T> {
    pub value: T,
    pub raw: RawResponse,
}

impl<T> Response<T> {
    pub fn status(&self) -> StatusCode {
        self.raw.status
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// A response that passed the status policy, not yet decoded.
#[derive(Debug, Clone)]
pub struct Reply {
    shape: ResponseShape,
    raw: RawResponse,
}

impl Reply {
    pub fn shape(&self) -> &ResponseShape {
        &self.shape
    }

    pub fn raw(&self) -> &RawResponse {
        &self.raw
    }

    pub fn into_unit(self) -> Result<()> {
        Ok(())
    }

    pub fn into_text(self) -> Result<String> {
        Ok(self.raw.text())
    }

    pub fn into_raw(self) -> RawResponse {
        self.raw
    }

    pub fn into_json<T: DeserializeOwned>(self) -> Result<T> {
        self.raw.json()
    }

    pub fn into_response<T: DeserializeOwned>(self) -> Result<Response<T>> {
        let value = self.raw.json()?;
        Ok(Response {
            value,
            raw: self.raw,
        })
    }
}

/// A client model bound to a requester.
#[derive(Debug)]
pub struct ApiClient<R> {
    model: Arc<ClientModel>,
    requester: Arc<R>,
    properties: RwLock<PropertyValues>,
}

impl<R: Requester> ApiClient<R> {
    /// Bind the cached model of `D` to `requester`.
    pub fn for_interface<D: Declared>(requester: R) -> Result<Self> {
        Ok(Self::from_model(registry::model::<D>()?, requester))
    }

    pub fn from_model(model: Arc<ClientModel>, requester: R) -> Self {
        Self::shared(model, Arc::new(requester))
    }

    /// Bind a requester that is shared with other clients.
    pub fn shared(model: Arc<ClientModel>, requester: Arc<R>) -> Self {
        ApiClient {
            model,
            requester,
            properties: RwLock::new(PropertyValues::new()),
        }
    }

    pub fn model(&self) -> &Arc<ClientModel> {
        &self.model
    }

    pub fn requester(&self) -> &Arc<R> {
        &self.requester
    }

    /// The requester as a trait object, for requester-typed properties.
    pub fn requester_handle(&self) -> Arc<dyn Requester>
    where
        R: 'static,
    {
        let requester: Arc<R> = Arc::clone(&self.requester);
        requester
    }

    /// Store a property value. `None` clears it.
    pub fn set_property<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value).map_err(|source| Error::Serialize {
            parameter: name.to_string(),
            source,
        })?;
        let mut properties = self
            .properties
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match value {
            Value::Null => {
                properties.remove(name);
            }
            v => properties.set(name, v),
        }
        Ok(())
    }

    /// [`set_property`](Self::set_property) for generated setters, which
    /// cannot return an error. A value that fails to serialize clears the
    /// property.
    pub fn store_property<T: Serialize + ?Sized>(&self, name: &str, value: &T) {
        if let Err(err) = self.set_property(name, value) {
            warn!(property = %name, error = %err, "Property value rejected");
            self.properties
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(name);
        }
    }

    /// Current value of a property, `None` when unset or not a `T`.
    pub fn property_value<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let properties = self
            .properties
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        match properties.get(name) {
            Value::Null => None,
            v => serde_json::from_value(v.clone()).ok(),
        }
    }

    /// Assemble the descriptor for a call without sending it.
    pub fn describe(&self, method: &str, args: &[ArgValue]) -> Result<RequestDescriptor> {
        self.describe_in(&self.model, method, args)
    }

    fn describe_in(
        &self,
        model: &ClientModel,
        method: &str,
        args: &[ArgValue],
    ) -> Result<RequestDescriptor> {
        let template = model
            .template(method)
            .ok_or_else(|| Error::UnknownMethod {
                interface: model.name().to_string(),
                method: method.to_string(),
            })?;
        let properties = self
            .properties
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(template.assemble(args, &properties)?)
    }

    /// Assemble, send and apply the status policy.
    ///
    /// A cancellation argument aborts the call with [`Error::Cancelled`] as
    /// soon as its token fires, dropping the in-flight send.
    pub async fn invoke(&self, method: &str, args: Vec<ArgValue>) -> Result<Reply> {
        let request = self.describe(method, &args)?;
        self.execute(request).await
    }

    /// [`invoke`](Self::invoke) for a method declared on `D`.
    ///
    /// Generated code calls every method this way. When the bound model
    /// carries the method as declared by `D`, inherited or not, it is assembled
    /// there with the bound interface's headers, properties and base path.
    /// Otherwise the call resolves against the model of `D` itself.
    pub async fn invoke_as<D: Declared>(&self, method: &str, args: Vec<ArgValue>) -> Result<Reply> {
        let bound = self
            .model
            .template(method)
            .is_some_and(|t| t.declared_by() == D::interface_name());
        let request = if bound {
            self.describe_in(&self.model, method, &args)?
        } else {
            let model = registry::model::<D>()?;
            self.describe_in(&model, method, &args)?
        };
        self.execute(request).await
    }

    async fn execute(&self, request: RequestDescriptor) -> Result<Reply> {
        let shape = request.response.clone();
        let allow_any_status = request.allow_any_status_code;
        let operation = request.operation.clone();

        debug!(
            interface = %self.model.name(),
            operation = %operation,
            method = %request.method,
            path = %request.path_and_query(),
            "Sending request"
        );

        let raw = match request.cancellation.clone() {
            Some(token) => {
                if token.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(Error::Cancelled),
                    sent = self.requester.send(request) => sent?,
                }
            }
            None => self.requester.send(request).await?,
        };

        debug!(
            operation = %operation,
            status = raw.status.as_u16(),
            bytes = raw.body.len(),
            "Received response"
        );

        if !raw.is_success() && !allow_any_status && shape != ResponseShape::Raw {
            return Err(Error::Http {
                url: raw.url.clone(),
                status: raw.status,
                body_snippet: snippet(&raw.text(), BODY_SNIPPET_LIMIT),
            });
        }

        Ok(Reply { shape, raw })
    }

    /// Release the client. Generated disposal methods end up here.
    pub fn dispose(self) {
        debug!(interface = %self.model.name(), "Client disposed");
    }
}
