use crate::analyzer::SourceGraph;
use crate::model::{ClientModel, ParameterRole, PropertyRole, ResponseShape};
use crate::validator::{self, print_diagnostics, Diagnostic, Severity, Validated};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::fmt;
use std::path::{Path, PathBuf};

/// Command-line interface for brrtclient
///
/// Lints and inspects client interface declarations in Rust source files
/// without compiling them.
#[derive(Parser)]
#[command(name = "brrtclient-lint")]
#[command(about = "brrtclient declaration linter", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Validate every declared interface in a source file
    Lint {
        /// Rust source file containing the interface traits
        #[arg(short, long)]
        source: PathBuf,

        /// Only lint this interface
        #[arg(short, long)]
        interface: Option<String>,

        /// Show only errors (hide warnings and info)
        #[arg(long, default_value_t = false)]
        errors_only: bool,
    },
    /// Print the normalized model and request templates of one interface
    Inspect {
        #[arg(short, long)]
        source: PathBuf,

        #[arg(short, long)]
        interface: String,
    },
}

/// What a command run found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Clean,
    /// At least one error diagnostic was reported
    Failed,
}

/// Parse arguments and run. The binary exits non-zero on [`Outcome::Failed`].
pub fn run_cli() -> Result<Outcome> {
    let cli = Cli::parse();
    execute(&cli)
}

pub fn execute(cli: &Cli) -> Result<Outcome> {
    match &cli.command {
        Commands::Lint {
            source,
            interface,
            errors_only,
        } => {
            let results = lint_source(source, interface.as_deref())?;
            let mut diagnostics: Vec<Diagnostic> = results
                .into_iter()
                .flat_map(|(_, validated)| validated.diagnostics)
                .collect();
            if *errors_only {
                diagnostics.retain(|d| d.severity == Severity::Error);
            }
            print_diagnostics(&diagnostics);
            if diagnostics.iter().any(Diagnostic::is_error) {
                Ok(Outcome::Failed)
            } else {
                Ok(Outcome::Clean)
            }
        }
        Commands::Inspect { source, interface } => {
            let mut results = lint_source(source, Some(interface.as_str()))?;
            let (_, validated) = results
                .pop()
                .ok_or_else(|| anyhow!("interface `{interface}` not found"))?;
            match &validated.model {
                Some(model) => {
                    print!("{}", ModelSummary(model));
                    if validated.diagnostics.is_empty() {
                        Ok(Outcome::Clean)
                    } else {
                        print_diagnostics(&validated.diagnostics);
                        Ok(if validated.has_errors() {
                            Outcome::Failed
                        } else {
                            Outcome::Clean
                        })
                    }
                }
                None => {
                    print_diagnostics(&validated.diagnostics);
                    Ok(Outcome::Failed)
                }
            }
        }
    }
}

/// Validate the interfaces of a source file.
///
/// With `interface` set only that trait is validated and it must exist;
/// otherwise every trait carrying declarations is, in file order.
pub fn lint_source(path: &Path, interface: Option<&str>) -> Result<Vec<(String, Validated)>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let graph = SourceGraph::parse(&text)
        .map_err(|e| anyhow!("{}: {e}", path.display()))?;

    match interface {
        Some(name) => {
            let iface = graph
                .interface(name)
                .ok_or_else(|| anyhow!("interface `{name}` not found in {}", path.display()))?;
            Ok(vec![(name.to_string(), validator::build(&iface))])
        }
        None => Ok(graph
            .interfaces()
            .filter(|iface| iface.is_declared())
            .map(|iface| (iface.item().ident.to_string(), validator::build(&iface)))
            .collect()),
    }
}

fn role_text(role: &ParameterRole) -> String {
    match role {
        ParameterRole::Query { name, .. } => format!("query `{name}`"),
        ParameterRole::Path { name, encode, .. } => {
            if *encode {
                format!("path `{name}`")
            } else {
                format!("path `{name}` (unencoded)")
            }
        }
        ParameterRole::Header { name } => format!("header `{name}`"),
        ParameterRole::RawQueryString => "raw query string".to_string(),
        ParameterRole::QueryMap { .. } => "query map".to_string(),
        ParameterRole::Body(encoding) => format!("body ({encoding:?})"),
        ParameterRole::Cancellation => "cancellation".to_string(),
        ParameterRole::RequestProperty { key } => format!("request property `{key}`"),
    }
}

fn property_text(role: Option<PropertyRole>) -> String {
    match role {
        Some(PropertyRole::Header { name, default: None }) => format!("header `{name}`"),
        Some(PropertyRole::Header {
            name,
            default: Some(default),
        }) => format!("header `{name}` (default `{default}`)"),
        Some(PropertyRole::Path { name, .. }) => format!("path `{name}`"),
        Some(PropertyRole::Query { name, .. }) => format!("query `{name}`"),
        Some(PropertyRole::RequestProperty { key }) => format!("request property `{key}`"),
        None => "requester".to_string(),
    }
}

fn shape_text(shape: &ResponseShape) -> String {
    match shape {
        ResponseShape::Void => "()".to_string(),
        ResponseShape::Text => "String".to_string(),
        ResponseShape::Raw => "RawResponse".to_string(),
        ResponseShape::Deserialize { ty } => ty.clone(),
        ResponseShape::WithResponse { ty } => format!("Response<{ty}>"),
    }
}

/// Human-readable summary of a validated model.
pub struct ModelSummary<'a>(pub &'a ClientModel);

impl fmt::Display for ModelSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let model = self.0;
        let ty = &model.ty;
        writeln!(f, "Interface: {}", ty.name)?;
        if ty.interfaces.len() > 1 {
            writeln!(f, "  Extends: {}", ty.interfaces[1..].join(", "))?;
        }
        if let Some(base) = &ty.base_path {
            writeln!(f, "  Base path: {}", base.value)?;
        }
        for header in &ty.headers {
            match &header.value.value {
                Some(value) => writeln!(f, "  Header: {}: {}", header.value.name, value)?,
                None => writeln!(f, "  Header: {} (removed)", header.value.name)?,
            }
        }
        for property in &ty.properties {
            writeln!(
                f,
                "  Property {}: {}",
                property.name,
                property_text(property.role())
            )?;
        }

        for template in model.templates() {
            let name = template.method_name();
            writeln!(
                f,
                "  {} {} -> {}{}",
                template.http_method(),
                template.path_template(),
                shape_text(template.response()),
                if template.allow_any_status_code() {
                    " (any status)"
                } else {
                    ""
                }
            )?;
            if template.declared_by() == ty.name {
                writeln!(f, "    fn {name}")?;
            } else {
                writeln!(f, "    fn {name} (from {})", template.declared_by())?;
            }
            if let Some(method) = ty.method(name) {
                for param in &method.parameters {
                    writeln!(f, "      {}: {}", param.name, role_text(&param.role()))?;
                }
            }
        }
        if let Some(disposal) = &model.disposal {
            writeln!(f, "  Disposal: {disposal}")?;
        }
        Ok(())
    }
}
