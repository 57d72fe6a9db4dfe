#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

//! Integration tests for the execution engine against a scripted requester

mod common;

use brrtclient::analyzer::{Attr, InterfaceDecl, MethodDecl, ParamDecl, PropertyDecl};
use brrtclient::model::{ResponseShape, TypeKind};
use brrtclient::{ApiClient, ArgValue, CancellationToken, Declared, Error, Response};
use common::mock::MockRequester;
use http::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize, PartialEq)]
struct User {
    id: u64,
    name: String,
}

struct UsersApi;

impl Declared for UsersApi {
    fn declaration() -> InterfaceDecl {
        InterfaceDecl::new("UsersApi")
            .attr(Attr::new("base_path").arg("api"))
            .property(
                PropertyDecl::new("token")
                    .kind(TypeKind::Text)
                    .attr(Attr::new("header").arg("Authorization")),
            )
            .method(
                MethodDecl::new("get_user")
                    .attr(Attr::new("get").arg("users/{id}"))
                    .param(ParamDecl::new("id").attr(Attr::new("path")))
                    .returns(ResponseShape::Deserialize { ty: "User".into() }),
            )
            .method(
                MethodDecl::new("ping_any")
                    .attr(Attr::new("head").arg("users/{id}"))
                    .attr(Attr::new("allow_any_status_code"))
                    .param(ParamDecl::new("id").attr(Attr::new("path")))
                    .returns(ResponseShape::WithResponse { ty: "User".into() }),
            )
            .method(
                MethodDecl::new("raw")
                    .attr(Attr::new("get").arg("raw"))
                    .returns(ResponseShape::Raw),
            )
            .method(
                MethodDecl::new("slow")
                    .attr(Attr::new("get").arg("slow"))
                    .param(ParamDecl::new("cancel").kind(TypeKind::Cancellation))
                    .returns(ResponseShape::Text),
            )
    }
}

struct AdminApi;

impl Declared for AdminApi {
    fn declaration() -> InterfaceDecl {
        InterfaceDecl::new("AdminApi")
            .attr(Attr::new("header").arg("X-Admin: 1"))
            .extends(UsersApi::declaration())
            .method(MethodDecl::new("purge").attr(Attr::new("delete").arg("cache")))
    }
}

struct Standalone;

impl Declared for Standalone {
    fn declaration() -> InterfaceDecl {
        InterfaceDecl::new("Standalone")
            .method(MethodDecl::new("ping").attr(Attr::new("get").arg("ping")))
    }
}

fn client(requester: MockRequester) -> ApiClient<MockRequester> {
    ApiClient::for_interface::<UsersApi>(requester).unwrap()
}

#[tokio::test]
async fn test_success_decodes_json() {
    let client = client(MockRequester::new().respond(200, r#"{"id": 7, "name": "ada"}"#));

    let reply = client
        .invoke("get_user", vec![ArgValue::from(json!(7))])
        .await
        .unwrap();
    let user: User = reply.into_json().unwrap();
    assert_eq!(
        user,
        User {
            id: 7,
            name: "ada".into()
        }
    );

    let sent = client.requester().last();
    assert_eq!(sent.operation, "get_user");
    assert_eq!(sent.path, "api/users/7");
}

#[tokio::test]
async fn test_error_status_becomes_http_error() {
    let client = client(MockRequester::new().respond(404, "no such user"));

    let err = client
        .invoke("get_user", vec![ArgValue::from(json!(1))])
        .await
        .unwrap_err();
    match err {
        Error::Http {
            status,
            body_snippet,
            url,
        } => {
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body_snippet, "no such user");
            assert_eq!(url, "http://mock.local");
        }
        other => panic!("expected an HTTP error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_any_status_and_raw_bypass_status_policy() {
    let client = client(
        MockRequester::new()
            .respond(404, "")
            .respond(500, "boom"),
    );

    let response: Response<Option<User>> = client
        .invoke("ping_any", vec![ArgValue::from(json!(1))])
        .await
        .unwrap()
        .into_response()
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.value.is_none());

    let raw = client.invoke("raw", vec![]).await.unwrap().into_raw();
    assert_eq!(raw.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(raw.text(), "boom");
}

#[tokio::test]
async fn test_undecodable_body_is_a_decode_error() {
    let client = client(MockRequester::new().respond(200, "<html>oops</html>"));

    let err = client
        .invoke("get_user", vec![ArgValue::from(json!(1))])
        .await
        .unwrap()
        .into_json::<User>()
        .unwrap_err();
    match err {
        Error::Decode { body_snippet, .. } => assert_eq!(body_snippet, "<html>oops</html>"),
        other => panic!("expected a decode error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_cancellation_aborts_in_flight_call() {
    let client = client(MockRequester::new().slow(Duration::from_secs(30)));
    let token = CancellationToken::new();

    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let err = client
        .invoke("slow", vec![ArgValue::from(token)])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_cancelled_token_never_sends() {
    let client = client(MockRequester::new());
    let token = CancellationToken::new();
    token.cancel();

    let err = client
        .invoke("slow", vec![ArgValue::from(token)])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert!(client.requester().sent().is_empty());
}

#[tokio::test]
async fn test_property_values_flow_into_requests() {
    let client = client(MockRequester::new());

    client.set_property("token", "Bearer abc").unwrap();
    assert_eq!(
        client.property_value::<String>("token").as_deref(),
        Some("Bearer abc")
    );
    client.invoke("raw", vec![]).await.unwrap();
    assert_eq!(
        client.requester().last().header_values("authorization"),
        vec!["Bearer abc"]
    );

    client.set_property("token", &None::<String>).unwrap();
    assert!(client.property_value::<String>("token").is_none());
    client.invoke("raw", vec![]).await.unwrap();
    assert!(client
        .requester()
        .last()
        .header_values("authorization")
        .is_empty());
}

#[tokio::test]
async fn test_unknown_method_and_wrong_arity() {
    let client = client(MockRequester::new());

    assert!(matches!(
        client.invoke("missing", vec![]).await.unwrap_err(),
        Error::UnknownMethod { .. }
    ));
    assert!(matches!(
        client.invoke("get_user", vec![]).await.unwrap_err(),
        Error::Assemble(_)
    ));
    assert!(client.requester().sent().is_empty());
}

#[tokio::test]
async fn test_inherited_methods_assemble_with_the_bound_interface() {
    let requester = Arc::new(MockRequester::new());
    let admin = ApiClient::shared(
        brrtclient::registry::model::<AdminApi>().unwrap(),
        Arc::clone(&requester),
    );
    admin.set_property("token", "Bearer admin").unwrap();

    admin.invoke("purge", vec![]).await.unwrap();
    let purge = requester.last();
    assert_eq!(purge.path, "api/cache");
    assert_eq!(purge.header_values("x-admin"), vec!["1"]);

    admin
        .invoke_as::<UsersApi>("get_user", vec![ArgValue::from(json!(3))])
        .await
        .unwrap();
    let get = requester.last();
    assert_eq!(get.operation, "get_user");
    assert_eq!(get.path, "api/users/3");
    assert_eq!(get.header_values("x-admin"), vec!["1"]);
    assert_eq!(get.header_values("authorization"), vec!["Bearer admin"]);

    // A client bound to the parent alone never sees the child's headers
    let users = ApiClient::shared(
        brrtclient::registry::model::<UsersApi>().unwrap(),
        Arc::clone(&requester),
    );
    users
        .invoke_as::<UsersApi>("get_user", vec![ArgValue::from(json!(3))])
        .await
        .unwrap();
    assert!(requester.last().header_values("x-admin").is_empty());
}

#[tokio::test]
async fn test_invoke_as_falls_back_to_the_declaring_model() {
    let client = ApiClient::for_interface::<AdminApi>(MockRequester::new()).unwrap();
    let standalone = ApiClient::shared(
        brrtclient::registry::model::<Standalone>().unwrap(),
        Arc::clone(client.requester()),
    );

    standalone.invoke_as::<AdminApi>("purge", vec![]).await.unwrap();
    let sent = client.requester().last();
    assert_eq!(sent.path, "api/cache");
    assert_eq!(sent.header_values("x-admin"), vec!["1"]);
}

#[tokio::test]
async fn test_clients_share_one_requester() {
    let requester = Arc::new(MockRequester::new());
    let model = brrtclient::registry::model::<UsersApi>().unwrap();
    let first = ApiClient::shared(Arc::clone(&model), Arc::clone(&requester));
    let second = ApiClient::shared(model, Arc::clone(&requester));

    first.invoke("raw", vec![]).await.unwrap();
    second.invoke("raw", vec![]).await.unwrap();
    assert_eq!(requester.sent().len(), 2);
    assert!(Arc::ptr_eq(first.model(), second.model()));

    first.dispose();
    second.invoke("raw", vec![]).await.unwrap();
    assert_eq!(requester.sent().len(), 3);
}
