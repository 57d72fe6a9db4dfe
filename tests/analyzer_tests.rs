#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Integration tests for the two declaration backends
//!
//! The same interface is declared once as Rust source and once with the
//! runtime builders; both must analyze and validate to equal models.

use brrtclient::analyzer::{analyze, Attr, InterfaceDecl, MethodDecl, ParamDecl, PropertyDecl, SourceGraph};
use brrtclient::model::{AssociatedKind, Receiver, ResponseShape, TypeKind};
use brrtclient::validator::{self, codes};

const SOURCE: &str = r#"
#[header("X-Client: base")]
#[allow_any_status_code(false)]
pub trait Base {}

#[base_path("api/v1")]
#[header("Accept: application/json")]
#[serialization(query = serialized)]
pub trait UsersApi: Base + Send + Sync {
    #[property]
    #[header("X-Api-Key")]
    fn api_key(&self) -> Option<String>;
    #[property]
    fn set_api_key(&mut self, value: Option<String>);

    #[get("users/{id}")]
    #[allow_any_status_code]
    async fn get_user(&self, #[path] id: u64, #[query("verbose")] verbose: bool) -> Result<User>;

    #[post("users")]
    #[header("Content-Language: en")]
    async fn create(
        &self,
        #[body(url_encoded)] form: NewUser,
        cancel: CancellationToken,
    ) -> Result<Response<User>>;

    #[get("users/{id}/avatar")]
    async fn avatar(&self, #[path(name = "id", encode = false)] user: &str) -> Result<RawResponse>;

    fn close(self);
}
"#;

fn runtime_users_api() -> InterfaceDecl {
    let base = InterfaceDecl::new("Base")
        .attr(Attr::new("header").arg("X-Client: base"))
        .attr(Attr::new("allow_any_status_code").arg(false));

    InterfaceDecl::new("UsersApi")
        .attr(Attr::new("base_path").arg("api/v1"))
        .attr(Attr::new("header").arg("Accept: application/json"))
        .attr(Attr::new("serialization").named_ident("query", "serialized"))
        .extends(base)
        .property(
            PropertyDecl::new("api_key")
                .kind(TypeKind::Text)
                .attr(Attr::new("header").arg("X-Api-Key")),
        )
        .method(
            MethodDecl::new("get_user")
                .attr(Attr::new("get").arg("users/{id}"))
                .attr(Attr::new("allow_any_status_code"))
                .param(ParamDecl::new("id").attr(Attr::new("path")))
                .param(ParamDecl::new("verbose").attr(Attr::new("query").arg("verbose")))
                .returns(ResponseShape::Deserialize { ty: "User".into() }),
        )
        .method(
            MethodDecl::new("create")
                .attr(Attr::new("post").arg("users"))
                .attr(Attr::new("header").arg("Content-Language: en"))
                .param(ParamDecl::new("form").attr(Attr::new("body").ident("url_encoded")))
                .param(ParamDecl::new("cancel").kind(TypeKind::Cancellation))
                .returns(ResponseShape::WithResponse { ty: "User".into() }),
        )
        .method(
            MethodDecl::new("avatar")
                .attr(Attr::new("get").arg("users/{id}/avatar"))
                .param(
                    ParamDecl::new("user")
                        .kind(TypeKind::Text)
                        .attr(Attr::new("path").named("name", "id").named("encode", false)),
                )
                .returns(ResponseShape::Raw),
        )
        .method(
            MethodDecl::new("close")
                .receiver(Receiver::Owned)
                .returns(ResponseShape::Void),
        )
}

#[test]
fn test_backends_produce_equal_models() {
    let graph = SourceGraph::parse(SOURCE).unwrap();
    let source = graph.interface("UsersApi").unwrap();
    let runtime = runtime_users_api();

    let (from_source, source_diagnostics) = analyze(&source);
    let (from_runtime, runtime_diagnostics) = analyze(&&runtime);

    assert!(source_diagnostics.is_empty(), "{source_diagnostics:?}");
    assert!(runtime_diagnostics.is_empty(), "{runtime_diagnostics:?}");
    assert_eq!(from_source, from_runtime);
    assert_eq!(from_source.interfaces, vec!["UsersApi", "Base"]);
}

#[test]
fn test_backends_produce_equal_templates() {
    let graph = SourceGraph::parse(SOURCE).unwrap();
    let from_source = validator::build(&graph.interface("UsersApi").unwrap())
        .model
        .expect("source model");
    let runtime = runtime_users_api();
    let from_runtime = validator::build(&&runtime).model.expect("runtime model");

    assert_eq!(from_source.ty, from_runtime.ty);
    assert_eq!(from_source.disposal.as_deref(), Some("close"));
    assert_eq!(from_source.disposal, from_runtime.disposal);

    let describe = |model: &brrtclient::ClientModel| -> Vec<String> {
        model
            .templates()
            .iter()
            .map(|t| {
                format!(
                    "{} {} {} {}",
                    t.method_name(),
                    t.http_method(),
                    t.path_template(),
                    t.allow_any_status_code()
                )
            })
            .collect()
    };
    assert_eq!(describe(&from_source), describe(&from_runtime));
    assert_eq!(
        describe(&from_source),
        vec![
            "get_user GET api/v1/users/{id} true",
            "create POST api/v1/users false",
            "avatar GET api/v1/users/{id}/avatar false",
        ]
    );
}

#[test]
fn test_backends_report_the_same_problems() {
    let graph = SourceGraph::parse(
        r#"
pub trait Broken {
    type Item;

    #[get("a/{missing}")]
    #[delete("a")]
    async fn twice(&self) -> Result<()>;

    #[get("b/{id}")]
    async fn lookup(&self, #[path] id: u64, #[path] other: u64) -> Result<()>;

    #[cookie("x")]
    async fn unknown(&self) -> Result<()>;
}
"#,
    )
    .unwrap();
    let runtime = InterfaceDecl::new("Broken")
        .associated("Item", AssociatedKind::Type)
        .method(
            MethodDecl::new("twice")
                .attr(Attr::new("get").arg("a/{missing}"))
                .attr(Attr::new("delete").arg("a")),
        )
        .method(
            MethodDecl::new("lookup")
                .attr(Attr::new("get").arg("b/{id}"))
                .param(ParamDecl::new("id").attr(Attr::new("path")))
                .param(ParamDecl::new("other").attr(Attr::new("path"))),
        )
        .method(MethodDecl::new("unknown").attr(Attr::new("cookie").arg("x")));

    let from_source = validator::build(&graph.interface("Broken").unwrap());
    let from_runtime = validator::build(&&runtime);

    let codes_of = |v: &brrtclient::Validated| -> Vec<&'static str> {
        v.diagnostics.iter().map(|d| d.code).collect()
    };
    assert_eq!(codes_of(&from_source), codes_of(&from_runtime));
    assert!(from_source.model.is_none());
    assert!(from_runtime.model.is_none());
    assert!(codes_of(&from_source).contains(&codes::UNSUPPORTED_ASSOCIATED_ITEM));
    assert!(codes_of(&from_source).contains(&codes::UNKNOWN_DECLARATION));
}

#[test]
fn test_private_trait_is_inaccessible_in_both_backends() {
    let graph = SourceGraph::parse(
        r#"
trait Hidden {
    #[get("x")]
    async fn x(&self) -> Result<()>;
}
"#,
    )
    .unwrap();
    let runtime = InterfaceDecl::new("Hidden")
        .private()
        .method(MethodDecl::new("x").attr(Attr::new("get").arg("x")));

    for validated in [
        validator::build(&graph.interface("Hidden").unwrap()),
        validator::build(&&runtime),
    ] {
        assert!(validated.model.is_none());
        assert_eq!(validated.diagnostics[0].code, codes::INACCESSIBLE_INTERFACE);
    }
}
