#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

//! Integration tests for request descriptor assembly
//!
//! Interfaces are declared with the runtime builders, validated, and every
//! assertion is made on the descriptor a single call produces.

use brrtclient::analyzer::{Attr, InterfaceDecl, MethodDecl, ParamDecl, PropertyDecl};
use brrtclient::model::{ResponseShape, TypeKind};
use brrtclient::validator;
use brrtclient::{
    ArgValue, AssembleError, ClientModel, PropertyValues, QueryPart, RequestBody,
    RequestDescriptor,
};
use bytes::Bytes;
use http::Method;
use serde_json::json;

fn model(decl: InterfaceDecl) -> ClientModel {
    let validated = validator::build(&&decl);
    assert!(
        !validated.has_errors(),
        "unexpected errors: {:?}",
        validated.errors().collect::<Vec<_>>()
    );
    validated.model.expect("valid model")
}

fn call(
    model: &ClientModel,
    method: &str,
    args: &[ArgValue],
    properties: &PropertyValues,
) -> RequestDescriptor {
    model
        .template(method)
        .expect("method template")
        .assemble(args, properties)
        .expect("assembled request")
}

fn header(name: &str, value: &str) -> Attr {
    Attr::new("header").arg(format!("{name}: {value}"))
}

#[test]
fn test_header_layers_replace_lower_layers() {
    let decl = InterfaceDecl::new("Layers")
        .attr(header("B", "1"))
        .attr(header("A", "type"))
        .property(PropertyDecl::new("b").attr(Attr::new("header").arg("B")))
        .method(
            MethodDecl::new("plain")
                .attr(Attr::new("get").arg("x"))
                .attr(header("B", "3")),
        )
        .method(
            MethodDecl::new("with_param")
                .attr(Attr::new("get").arg("x"))
                .attr(header("B", "3"))
                .param(ParamDecl::new("b").attr(Attr::new("header").arg("B"))),
        );
    let model = model(decl);
    let properties = PropertyValues::new().with("b", json!("2"));

    let request = call(&model, "plain", &[], &properties);
    assert_eq!(request.header_values("b"), vec!["3"]);
    assert_eq!(request.header_values("a"), vec!["type"]);

    let request = call(&model, "with_param", &[ArgValue::text("4")], &properties);
    assert_eq!(request.header_values("b"), vec!["4"]);

    let request = call(
        &model,
        "with_param",
        &[ArgValue::from(json!(["4", "5"]))],
        &properties,
    );
    assert_eq!(request.header_values("b"), vec!["4", "5"]);
}

#[test]
fn test_three_layer_header_precedence() {
    let decl = InterfaceDecl::new("Precedence")
        .attr(header("A", "1"))
        .method(
            MethodDecl::new("call")
                .attr(Attr::new("get").arg("x"))
                .attr(header("A", "2"))
                .attr(header("B", "3"))
                .param(ParamDecl::new("a").attr(Attr::new("header").arg("A"))),
        );
    let model = model(decl);

    let request = call(&model, "call", &[ArgValue::Null], &PropertyValues::new());
    assert!(request.header_values("a").is_empty());
    assert_eq!(request.header_values("b"), vec!["3"]);
    assert_eq!(request.headers.len(), 1);
}

#[test]
fn test_property_header_applies_when_set() {
    let decl = InterfaceDecl::new("Props")
        .attr(header("X-Key", "static"))
        .property(
            PropertyDecl::new("key")
                .kind(TypeKind::Text)
                .attr(Attr::new("header").arg("X-Key")),
        )
        .method(MethodDecl::new("get").attr(Attr::new("get").arg("x")));
    let model = model(decl);

    let unset = call(&model, "get", &[], &PropertyValues::new());
    assert_eq!(unset.header_values("x-key"), vec!["static"]);

    let set = call(
        &model,
        "get",
        &[],
        &PropertyValues::new().with("key", json!("secret")),
    );
    assert_eq!(set.header_values("x-key"), vec!["secret"]);
}

#[test]
fn test_removed_header_restored_by_parameter() {
    let decl = InterfaceDecl::new("Trace")
        .attr(header("X-Trace", "on"))
        .method(
            MethodDecl::new("quiet")
                .attr(Attr::new("get").arg("x"))
                .attr(Attr::new("header").arg("X-Trace")),
        )
        .method(
            MethodDecl::new("traced")
                .attr(Attr::new("get").arg("x"))
                .attr(Attr::new("header").arg("X-Trace"))
                .param(ParamDecl::new("trace").attr(Attr::new("header").arg("X-Trace"))),
        );
    let model = model(decl);
    let none = PropertyValues::new();

    assert!(call(&model, "quiet", &[], &none)
        .header_values("x-trace")
        .is_empty());
    assert_eq!(
        call(&model, "traced", &[ArgValue::text("abc")], &none).header_values("x-trace"),
        vec!["abc"]
    );
    // A null header argument removes the header again
    assert!(call(&model, "traced", &[ArgValue::Null], &none)
        .header_values("x-trace")
        .is_empty());
}

#[test]
fn test_query_order_and_multi_values() {
    let decl = InterfaceDecl::new("Search").method(
        MethodDecl::new("search")
            .attr(Attr::new("get").arg("items"))
            .param(ParamDecl::new("tags").attr(Attr::new("query").arg("tag")))
            .param(ParamDecl::new("page"))
            .param(ParamDecl::new("extra").attr(Attr::new("raw_query_string")))
            .returns(ResponseShape::Deserialize { ty: "Vec<Item>".into() }),
    );
    let model = model(decl);

    let request = call(
        &model,
        "search",
        &[
            ArgValue::from(json!(["a", null, "b c"])),
            ArgValue::from(json!(2)),
            ArgValue::text("x=1&y=2"),
        ],
        &PropertyValues::new(),
    );
    assert_eq!(
        request.query,
        vec![
            QueryPart::Pair("tag".into(), "a".into()),
            QueryPart::Pair("tag".into(), "b c".into()),
            QueryPart::Pair("page".into(), "2".into()),
            QueryPart::Raw("x=1&y=2".into()),
        ]
    );
    assert_eq!(request.path_and_query(), "items?tag=a&tag=b%20c&page=2&x=1&y=2");

    let sparse = call(
        &model,
        "search",
        &[ArgValue::Null, ArgValue::Null, ArgValue::Null],
        &PropertyValues::new(),
    );
    assert!(sparse.query.is_empty());
    assert_eq!(sparse.path_and_query(), "items");
}

#[test]
fn test_serialized_query_style() {
    let decl = InterfaceDecl::new("Filters")
        .attr(Attr::new("serialization").named_ident("query", "serialized"))
        .method(
            MethodDecl::new("find")
                .attr(Attr::new("get").arg("things"))
                .param(ParamDecl::new("filter"))
                .param(ParamDecl::new("limit").attr(Attr::new("query").named_ident("style", "to_string"))),
        );
    let model = model(decl);

    let request = call(
        &model,
        "find",
        &[ArgValue::from(json!({"a": [1, 2]})), ArgValue::from(json!(10))],
        &PropertyValues::new(),
    );
    assert_eq!(
        request.query,
        vec![
            QueryPart::Pair("filter".into(), r#"{"a":[1,2]}"#.into()),
            QueryPart::Pair("limit".into(), "10".into()),
        ]
    );
}

#[test]
fn test_query_map_expands_entries_in_order() {
    let decl = InterfaceDecl::new("Filters").method(
        MethodDecl::new("filter")
            .attr(Attr::new("get").arg("items"))
            .param(ParamDecl::new("filters").attr(Attr::new("query_map"))),
    );
    let model = model(decl);
    let none = PropertyValues::new();

    let request = call(
        &model,
        "filter",
        &[ArgValue::from(json!({"a": ["1", "2"], "b": "3", "c": null}))],
        &none,
    );
    assert_eq!(
        request.query,
        vec![
            QueryPart::Pair("a".into(), "1".into()),
            QueryPart::Pair("a".into(), "2".into()),
            QueryPart::Pair("b".into(), "3".into()),
        ]
    );
    assert_eq!(request.query_string(), "a=1&a=2&b=3");

    assert!(call(&model, "filter", &[ArgValue::Null], &none).query.is_empty());

    let err = model
        .template("filter")
        .unwrap()
        .assemble(&[ArgValue::from(json!(5))], &none)
        .unwrap_err();
    assert!(matches!(err, AssembleError::InvalidArgument { .. }));
}

#[test]
fn test_url_encoded_body_keeps_insertion_order() {
    let decl = InterfaceDecl::new("Forms").method(
        MethodDecl::new("submit")
            .attr(Attr::new("post").arg("forms"))
            .param(ParamDecl::new("form").attr(Attr::new("body").ident("url_encoded"))),
    );
    let model = model(decl);

    let form = json!({"zeta": "a b", "alpha": "x&y", "list": ["1", null, "2"]});
    let request = call(
        &model,
        "submit",
        &[ArgValue::from(form)],
        &PropertyValues::new(),
    );
    let Some(RequestBody::UrlEncoded(pairs)) = &request.body else {
        panic!("expected a url-encoded body, got {:?}", request.body);
    };
    let keys: Vec<_> = pairs.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["zeta", "alpha", "list", "list"]);
    assert_eq!(
        RequestBody::form_encoded(pairs),
        "zeta=a+b&alpha=x%26y&list=1&list=2"
    );

    let err = model
        .template("submit")
        .unwrap()
        .assemble(&[ArgValue::from(json!("text"))], &PropertyValues::new())
        .unwrap_err();
    assert!(matches!(err, AssembleError::InvalidArgument { .. }));
}

#[test]
fn test_body_kinds_follow_parameter_type() {
    let decl = InterfaceDecl::new("Uploads")
        .method(
            MethodDecl::new("upload")
                .attr(Attr::new("put").arg("blob"))
                .param(
                    ParamDecl::new("data")
                        .kind(TypeKind::Bytes)
                        .attr(Attr::new("body")),
                ),
        )
        .method(
            MethodDecl::new("note")
                .attr(Attr::new("put").arg("note"))
                .param(ParamDecl::new("text").kind(TypeKind::Text).attr(Attr::new("body"))),
        )
        .method(
            MethodDecl::new("json")
                .attr(Attr::new("put").arg("json"))
                .param(ParamDecl::new("doc").attr(Attr::new("body"))),
        );
    let model = model(decl);
    let none = PropertyValues::new();

    let request = call(&model, "upload", &[ArgValue::bytes(b"\x00\x01")], &none);
    assert_eq!(
        request.body,
        Some(RequestBody::Bytes(Bytes::from_static(b"\x00\x01")))
    );
    let request = call(&model, "note", &[ArgValue::text("hello")], &none);
    assert_eq!(request.body, Some(RequestBody::Text("hello".into())));
    let request = call(&model, "json", &[ArgValue::from(json!({"k": 1}))], &none);
    assert_eq!(request.body, Some(RequestBody::Serialized(json!({"k": 1}))));
    let request = call(&model, "json", &[ArgValue::Null], &none);
    assert!(request.body.is_none());
}

#[test]
fn test_path_rendering() {
    let decl = InterfaceDecl::new("Repos")
        .attr(Attr::new("base_path").arg("api/{org}"))
        .property(PropertyDecl::new("org").attr(Attr::new("path")))
        .method(
            MethodDecl::new("file")
                .attr(Attr::new("get").arg("repos/{Repo}/files/{path}"))
                .param(ParamDecl::new("repo").attr(Attr::new("path")))
                .param(ParamDecl::new("path").attr(Attr::new("path").named("encode", false))),
        )
        .method(
            MethodDecl::new("status")
                .attr(Attr::new("get").arg("https://status.example.com/{org}")),
        );
    let model = model(decl);
    let properties = PropertyValues::new().with("org", json!("acme corp"));

    let request = call(
        &model,
        "file",
        &[ArgValue::text("a/b"), ArgValue::text("src/lib.rs")],
        &properties,
    );
    assert_eq!(request.method, Method::GET);
    assert_eq!(request.path, "api/acme%20corp/repos/a%2Fb/files/src/lib.rs");

    let request = call(&model, "status", &[], &properties);
    assert_eq!(request.path, "https://status.example.com/acme%20corp");
}

#[test]
fn test_inherited_methods_assemble_in_the_bound_interface() {
    let lenient = InterfaceDecl::new("Lenient")
        .attr(Attr::new("allow_any_status_code"))
        .attr(Attr::new("base_path").arg("v1"))
        .method(MethodDecl::new("status").attr(Attr::new("get").arg("status")));
    let decl = InterfaceDecl::new("Strict")
        .attr(Attr::new("allow_any_status_code").arg(false))
        .attr(Attr::new("base_path").arg("v2"))
        .attr(header("X-Api-Key", "k"))
        .extends(lenient)
        .property(PropertyDecl::new("tenant").attr(Attr::new("query").arg("tenant")))
        .method(MethodDecl::new("list").attr(Attr::new("get").arg("items")));
    let model = model(decl);
    let properties = PropertyValues::new().with("tenant", json!("acme"));

    let list = model.template("list").unwrap();
    assert_eq!(list.declared_by(), "Strict");
    assert!(!list.allow_any_status_code());

    let status = model.template("status").unwrap();
    assert_eq!(status.declared_by(), "Lenient");
    // Any-status is resolved against the interface that declares the method
    assert!(status.allow_any_status_code());

    let request = call(&model, "status", &[], &properties);
    assert_eq!(request.path_and_query(), "v2/status?tenant=acme");
    assert_eq!(request.header_values("x-api-key"), vec!["k"]);
}

#[test]
fn test_request_properties_and_cancellation() {
    let decl = InterfaceDecl::new("Bag")
        .property(
            PropertyDecl::new("tenant").attr(Attr::new("request_property").arg("tenant")),
        )
        .method(
            MethodDecl::new("ping")
                .attr(Attr::new("get").arg("ping"))
                .param(ParamDecl::new("attempt").attr(Attr::new("request_property")))
                .param(ParamDecl::new("cancel").kind(TypeKind::Cancellation)),
        );
    let model = model(decl);
    let token = brrtclient::CancellationToken::new();

    let request = call(
        &model,
        "ping",
        &[ArgValue::from(json!(3)), ArgValue::from(token.clone())],
        &PropertyValues::new().with("tenant", json!("t-1")),
    );
    assert_eq!(request.properties.get("tenant"), Some(&json!("t-1")));
    assert_eq!(request.properties.get("attempt"), Some(&json!(3)));
    assert!(request.query.is_empty());
    assert!(request.headers.is_empty());
    let carried = request.cancellation.expect("token carried");
    token.cancel();
    assert!(carried.is_cancelled());
}

#[test]
fn test_call_contract_violations() {
    let decl = InterfaceDecl::new("Strict").method(
        MethodDecl::new("get")
            .attr(Attr::new("get").arg("items/{id}"))
            .param(ParamDecl::new("id").attr(Attr::new("path")))
            .param(ParamDecl::new("token").attr(Attr::new("header").arg("X-Token"))),
    );
    let model = model(decl);
    let template = model.template("get").unwrap();
    let none = PropertyValues::new();

    assert_eq!(
        template.assemble(&[ArgValue::text("1")], &none).unwrap_err(),
        AssembleError::ArgumentCount {
            operation: "get".into(),
            expected: 2,
            got: 1,
        }
    );
    assert!(matches!(
        template
            .assemble(&[ArgValue::bytes(b"1"), ArgValue::Null], &none)
            .unwrap_err(),
        AssembleError::InvalidArgument { .. }
    ));
    assert!(matches!(
        template
            .assemble(&[ArgValue::text("1"), ArgValue::text("bad\nvalue")], &none)
            .unwrap_err(),
        AssembleError::InvalidHeaderValue { .. }
    ));
}
