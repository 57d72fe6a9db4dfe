#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

//! Integration tests for `#[brrtclient_macros::api]`
//!
//! Annotated traits are expanded, bound to a scripted requester and driven
//! through their generated methods.

mod common;

use brrtclient::{
    CancellationToken, Declared, Error, QueryPart, RawResponse, RequestBody, Requester, Response,
    Result,
};
use brrtclient_macros::api;
use bytes::Bytes;
use common::mock::MockRequester;
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize, PartialEq)]
pub struct User {
    id: u64,
    name: String,
}

#[derive(Debug, Serialize)]
pub struct NewUser {
    name: String,
}

#[api]
#[header("X-Client: tests")]
pub trait Health {
    #[get("/health")]
    async fn health(&self) -> Result<String>;
}

#[api]
#[base_path("api/v1")]
#[header("Accept: application/json")]
pub trait UsersApi: Health + Send + Sync {
    #[property]
    #[header("Authorization")]
    fn token(&self) -> Option<String>;
    #[property]
    fn set_token(&mut self, value: Option<String>);

    #[property]
    fn transport(&self) -> Arc<dyn Requester>;

    #[get("users/{id}")]
    async fn get_user(&self, #[path] id: u64) -> Result<User>;

    #[get("users")]
    #[allow_any_status_code]
    async fn search(
        &self,
        #[query("q")] query: &str,
        page: Option<u32>,
    ) -> Result<Response<Vec<User>>>;

    #[post("users")]
    async fn create(&self, #[body] user: &NewUser, cancel: CancellationToken) -> Result<()>;

    #[put("users/{id}/avatar")]
    #[header("Content-Type: image/png")]
    async fn upload(&self, #[path] id: u64, #[body] data: Vec<u8>) -> Result<RawResponse>;

    fn label(&self) -> &'static str {
        "users"
    }

    fn close(self);
}

#[api]
pub trait Pinger {
    #[get("ping")]
    async fn ping(&self) -> Result<()>;
}

#[api]
#[base_path("v2")]
#[header("X-Api-Key: k")]
pub trait Versioned: Pinger {
    #[property]
    #[header("X-Tenant")]
    fn tenant(&self) -> Option<String>;
    #[property]
    fn set_tenant(&mut self, value: Option<String>);
}

/// Application error wrapping the client error.
#[derive(Debug)]
pub struct AppError(Error);

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        AppError(err)
    }
}

#[api]
pub trait Reports {
    #[get("reports/{name}")]
    async fn report(&self, #[path] name: String) -> std::result::Result<String, AppError>;
}

#[tokio::test]
async fn test_generated_request_method() {
    let client = UsersApiDeclaration::client(
        MockRequester::new().respond(200, r#"{"id": 42, "name": "grace"}"#),
    )
    .unwrap();

    let user = client.get_user(42).await.unwrap();
    assert_eq!(
        user,
        User {
            id: 42,
            name: "grace".into()
        }
    );

    let sent = client.requester().last();
    assert_eq!(sent.method, Method::GET);
    assert_eq!(sent.path, "api/v1/users/42");
    assert_eq!(sent.header_values("accept"), vec!["application/json"]);
    assert_eq!(sent.header_values("x-client"), vec!["tests"]);
}

#[tokio::test]
async fn test_query_and_any_status() {
    let client: UsersApiClient<MockRequester> =
        UsersApiDeclaration::client(MockRequester::new().respond(404, "[]")).unwrap();

    let response = client.search("a b", None).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.value.is_empty());

    let sent = client.requester().last();
    assert_eq!(sent.query, vec![QueryPart::Pair("q".into(), "a b".into())]);
}

#[tokio::test]
async fn test_body_and_cancellation_arguments() {
    let client = UsersApiDeclaration::client(MockRequester::new()).unwrap();
    let token = CancellationToken::new();

    client
        .create(
            &NewUser {
                name: "linus".into(),
            },
            token.clone(),
        )
        .await
        .unwrap();
    let sent = client.requester().last();
    assert_eq!(sent.method, Method::POST);
    assert_eq!(
        sent.body,
        Some(RequestBody::Serialized(json!({"name": "linus"})))
    );
    assert!(sent.cancellation.is_some());

    token.cancel();
    let err = client
        .create(&NewUser { name: "x".into() }, token)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

#[tokio::test]
async fn test_bytes_body_and_raw_response() {
    let client = UsersApiDeclaration::client(MockRequester::new().respond(500, "disk full")).unwrap();

    let raw = client.upload(7, vec![1, 2, 3]).await.unwrap();
    assert_eq!(raw.status, StatusCode::INTERNAL_SERVER_ERROR);

    let sent = client.requester().last();
    assert_eq!(sent.path, "api/v1/users/7/avatar");
    assert_eq!(sent.body, Some(RequestBody::Bytes(Bytes::from_static(&[1, 2, 3]))));
    assert_eq!(sent.header_values("content-type"), vec!["image/png"]);
}

#[tokio::test]
async fn test_properties_through_accessors() {
    let mut client = UsersApiDeclaration::client(MockRequester::new().respond(200, "ok")).unwrap();
    assert_eq!(client.token(), None);

    client.set_token(Some("Bearer t".into()));
    assert_eq!(client.token().as_deref(), Some("Bearer t"));

    client.health().await.unwrap();
    let sent = client.requester().last();
    // Inherited methods carry the bound interface's headers and properties
    assert_eq!(sent.path, "/health");
    assert_eq!(sent.header_values("accept"), vec!["application/json"]);
    assert_eq!(sent.header_values("authorization"), vec!["Bearer t"]);
    assert_eq!(sent.header_values("x-client"), vec!["tests"]);

    client.get_user(1).await.unwrap_err();
    let sent = client.requester().last();
    assert_eq!(sent.header_values("authorization"), vec!["Bearer t"]);

    client.set_token(None);
    assert_eq!(client.token(), None);
}

#[tokio::test]
async fn test_requester_property_and_disposal() {
    let client = UsersApiDeclaration::client(MockRequester::new()).unwrap();
    assert_eq!(client.label(), "users");

    let transport = client.transport();
    let raw = transport
        .send(client.describe("upload", &[json!(1).into(), Bytes::new().into()]).unwrap())
        .await
        .unwrap();
    assert!(raw.is_success());
    assert_eq!(client.requester().sent().len(), 1);

    client.close();
}

#[tokio::test]
async fn test_inherited_text_method() {
    let client = HealthDeclaration::client(MockRequester::new().respond(200, "up")).unwrap();
    assert_eq!(client.health().await.unwrap(), "up");
}

#[tokio::test]
async fn test_inherited_method_uses_child_declarations() {
    let mut client = VersionedDeclaration::client(MockRequester::new()).unwrap();
    client.set_tenant(Some("acme".into()));

    client.ping().await.unwrap();
    let sent = client.requester().last();
    assert_eq!(sent.path, "v2/ping");
    assert_eq!(sent.header_values("x-api-key"), vec!["k"]);
    assert_eq!(sent.header_values("x-tenant"), vec!["acme"]);

    let plain = PingerDeclaration::client(MockRequester::new()).unwrap();
    plain.ping().await.unwrap();
    let sent = plain.requester().last();
    assert_eq!(sent.path, "ping");
    assert!(sent.header_values("x-api-key").is_empty());
}

#[tokio::test]
async fn test_custom_error_type_converts() {
    let client = ReportsDeclaration::client(MockRequester::new().respond(503, "busy")).unwrap();

    let err = client.report("q3 sales".into()).await.unwrap_err();
    match err {
        AppError(Error::Http { status, .. }) => assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE),
        AppError(other) => panic!("expected an HTTP error, got {other:?}"),
    }
    assert_eq!(client.requester().last().path, "reports/q3%20sales");
}

#[test]
fn test_runtime_declaration_matches_source() {
    let decl = UsersApiDeclaration::declaration();
    assert_eq!(decl.name, "UsersApi");
    assert_eq!(decl.extends.len(), 1);
    assert_eq!(decl.extends[0].name, "Health");

    let model = brrtclient::registry::model::<UsersApiDeclaration>().unwrap();
    let methods: Vec<_> = model.methods().collect();
    assert_eq!(methods, vec!["get_user", "search", "create", "upload", "health"]);
    assert_eq!(model.template("health").unwrap().declared_by(), "Health");
    assert_eq!(model.disposal.as_deref(), Some("close"));
    assert_eq!(model.ty.interfaces, vec!["UsersApi", "Health"]);
}
