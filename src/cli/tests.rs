#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

//! Unit tests for CLI commands

use crate::cli::{execute, lint_source, Cli, Commands, ModelSummary, Outcome};
use clap::Parser;
use std::io::Write;
use tempfile::NamedTempFile;

const SOURCE: &str = r#"
#[base_path("api/v1")]
#[header("Accept: application/json")]
pub trait UsersApi {
    #[get("users/{id}")]
    async fn get_user(&self, #[path] id: u64) -> Result<User>;

    #[post("users")]
    async fn create(&self, #[body] user: NewUser) -> Result<()>;
}

pub trait Unrelated {
    fn nothing(&self);
}

pub trait Broken {
    #[get("a")]
    #[post("a")]
    async fn twice(&self) -> Result<()>;
}
"#;

fn source_file(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn test_lint_command_exists() {
    let cli = Cli::try_parse_from(["brrtclient-lint", "lint", "--source", "api.rs"]).unwrap();
    match cli.command {
        Commands::Lint {
            source,
            interface,
            errors_only,
        } => {
            assert_eq!(source.to_string_lossy(), "api.rs");
            assert!(interface.is_none());
            assert!(!errors_only);
        }
        _ => panic!("Expected Lint command"),
    }
}

#[test]
fn test_inspect_requires_interface() {
    assert!(Cli::try_parse_from(["brrtclient-lint", "inspect", "--source", "api.rs"]).is_err());
}

#[test]
fn test_lint_skips_undeclared_traits() {
    let file = source_file(SOURCE);
    let results = lint_source(file.path(), None).unwrap();
    let names: Vec<_> = results.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["UsersApi", "Broken"]);
    assert!(results[0].1.diagnostics.is_empty());
    assert!(results[1].1.has_errors());
}

#[test]
fn test_lint_exit_outcome() {
    let file = source_file(SOURCE);
    let path = file.path().to_str().unwrap();

    let cli = Cli::try_parse_from(["brrtclient-lint", "lint", "--source", path]).unwrap();
    assert_eq!(execute(&cli).unwrap(), Outcome::Failed);

    let cli = Cli::try_parse_from([
        "brrtclient-lint",
        "lint",
        "--source",
        path,
        "--interface",
        "UsersApi",
    ])
    .unwrap();
    assert_eq!(execute(&cli).unwrap(), Outcome::Clean);
}

#[test]
fn test_unknown_interface_is_an_error() {
    let file = source_file(SOURCE);
    assert!(lint_source(file.path(), Some("Missing")).is_err());
}

#[test]
fn test_unparsable_source_is_an_error() {
    let file = source_file("pub trait {");
    assert!(lint_source(file.path(), None).is_err());
}

#[test]
fn test_model_summary() {
    let file = source_file(SOURCE);
    let mut results = lint_source(file.path(), Some("UsersApi")).unwrap();
    let (_, validated) = results.pop().unwrap();
    let model = validated.model.expect("valid model");
    let summary = ModelSummary(&model).to_string();

    assert!(summary.contains("Interface: UsersApi"));
    assert!(summary.contains("Base path: api/v1"));
    assert!(summary.contains("Header: Accept: application/json"));
    assert!(summary.contains("GET api/v1/users/{id} -> User"));
    assert!(summary.contains("id: path `id`"));
    assert!(summary.contains("POST api/v1/users -> ()"));
}

#[test]
fn test_model_summary_marks_inherited_methods() {
    let file = source_file(
        r#"
pub trait Health {
    #[get("health")]
    async fn health(&self) -> Result<String>;
}

#[base_path("api")]
pub trait Api: Health {
    #[get("items")]
    async fn items(&self) -> Result<Vec<Item>>;
}
"#,
    );
    let mut results = lint_source(file.path(), Some("Api")).unwrap();
    let (_, validated) = results.pop().unwrap();
    let summary = ModelSummary(&validated.model.expect("valid model")).to_string();

    assert!(summary.contains("Extends: Health"));
    assert!(summary.contains("    fn items\n"));
    assert!(summary.contains("GET api/health -> String"));
    assert!(summary.contains("fn health (from Health)"));
}
