//! # brrtclient
//!
//! **brrtclient** turns annotated Rust traits into HTTP clients. An interface
//! declares its endpoints with attributes (verb and path template, path,
//! query, header and body bindings, serialization hints) and the crate
//! compiles those declarations into request templates that assemble a
//! transport-agnostic [`RequestDescriptor`] per call.
//!
//! ## Architecture
//!
//! - **[`decl`]** - The declaration vocabulary and its decoder
//! - **[`analyzer`]** - Walks an interface and its supertraits into a [`TypeModel`].
//!   Two backends share one algorithm: runtime builders ([`analyzer::runtime`])
//!   and `syn` syntax trees ([`analyzer::source`])
//! - **[`validator`]** - Structured [`Diagnostic`]s and the validated [`ClientModel`]
//! - **[`descriptor`]** - Request templates and per-call assembly
//! - **[`registry`]** - Process-wide compute-once cache of client models
//! - **[`engine`]** - [`ApiClient`], the [`Requester`] seam and the `reqwest` transport
//! - **[`config`]** / **[`logging`]** - Environment and YAML configuration, tracing setup
//! - **[`cli`]** - The `brrtclient-lint` command
//!
//! ### Call Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Caller
//!     participant Client as Generated client
//!     participant Registry as ModelRegistry
//!     participant Template as RequestTemplate
//!     participant Requester
//!
//!     Caller->>Client: UsersApiDeclaration::client(requester)
//!     Client->>Registry: model::<UsersApiDeclaration>()
//!     Registry->>Registry: analyze + validate + compile (first use only)
//!     Registry-->>Client: Arc<ClientModel>
//!     Caller->>Client: get_user(42)
//!     Client->>Template: assemble(args, properties)
//!     Template-->>Client: RequestDescriptor
//!     Client->>Requester: send(descriptor)
//!     Requester-->>Client: RawResponse
//!     Client->>Client: status policy + decode
//!     Client-->>Caller: User
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use brrtclient::{ReqwestRequester, Result};
//! use brrtclient_macros::api;
//!
//! #[api]
//! #[base_path("api/v1")]
//! #[header("Accept: application/json")]
//! pub trait UsersApi {
//!     #[get("users/{id}")]
//!     async fn get_user(&self, #[path] id: u64) -> Result<User>;
//!
//!     #[post("users")]
//!     async fn create_user(&self, #[body] user: NewUser) -> Result<User>;
//! }
//!
//! let client = UsersApiDeclaration::client(ReqwestRequester::new("https://example.com")?)?;
//! let user = client.get_user(42).await?;
//! ```

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod decl;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod registry;
pub mod validator;

pub use descriptor::{
    ArgValue, AssembleError, BytesArg, CancelArg, PropertyValues, QueryPart, RequestBody,
    RequestDescriptor, RequestTemplate,
};
pub use engine::{ApiClient, RawResponse, Reply, Requester, Response};
#[cfg(feature = "transport")]
pub use engine::{BodySerializer, JsonBodySerializer, ReqwestRequester};
pub use error::{Error, Result};
pub use model::{ClientModel, ResponseShape, TypeModel};
pub use registry::{registry, Declared, ModelRegistry};
pub use tokio_util::sync::CancellationToken;
pub use validator::{Diagnostic, Severity, Validated};

