use std::fmt;

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Fatal for the type (no member) or the member it names
    Error,
    /// Likely a mistake but the client still builds
    Warning,
    /// Best practice suggestion
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// Where a diagnostic applies.
///
/// `member: None` means the type as a whole. `line`/`column` are filled in
/// when the declaration source knows them (the syntax-tree backend does, the
/// runtime backend does not).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeclLocation {
    pub interface: String,
    pub member: Option<String>,
    pub property: Option<String>,
    pub parameter: Option<String>,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl DeclLocation {
    pub fn interface(name: impl Into<String>) -> Self {
        DeclLocation {
            interface: name.into(),
            ..Default::default()
        }
    }

    pub fn member(mut self, name: impl Into<String>) -> Self {
        self.member = Some(name.into());
        self
    }

    pub fn property(mut self, name: impl Into<String>) -> Self {
        self.property = Some(name.into());
        self
    }

    pub fn parameter(mut self, name: impl Into<String>) -> Self {
        self.parameter = Some(name.into());
        self
    }

    pub fn at(mut self, line: Option<usize>, column: Option<usize>) -> Self {
        self.line = line;
        self.column = column;
        self
    }
}

impl fmt::Display for DeclLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.interface)?;
        if let Some(property) = &self.property {
            write!(f, ".{property}")?;
        }
        if let Some(member) = &self.member {
            write!(f, "::{member}")?;
        }
        if let Some(parameter) = &self.parameter {
            write!(f, "({parameter})")?;
        }
        if let Some(line) = self.line {
            write!(f, " at line {line}")?;
            if let Some(column) = self.column {
                write!(f, ":{column}")?;
            }
        }
        Ok(())
    }
}

/// A problem found while analyzing or validating an interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Stable machine-readable code (e.g., "missing_path_parameter")
    pub code: &'static str,
    pub severity: Severity,
    pub location: DeclLocation,
    /// Human-readable description of the problem
    pub message: String,
    /// Optional suggestion for how to fix it
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn new(
        code: &'static str,
        severity: Severity,
        location: DeclLocation,
        message: impl Into<String>,
    ) -> Self {
        Diagnostic {
            code,
            severity,
            location,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn error(code: &'static str, location: DeclLocation, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Error, location, message)
    }

    pub fn warning(code: &'static str, location: DeclLocation, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Warning, location, message)
    }

    pub fn info(code: &'static str, location: DeclLocation, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Info, location, message)
    }

    /// Add a suggestion for fixing the issue
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Errors that name no member invalidate the whole interface.
    pub fn is_type_fatal(&self) -> bool {
        self.is_error() && self.location.member.is_none()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] {}: {}",
            self.severity, self.code, self.location, self.message
        )
    }
}

/// Diagnostic codes, one per rule.
pub mod codes {
    pub const INACCESSIBLE_INTERFACE: &str = "inaccessible_interface";
    pub const UNSUPPORTED_ASSOCIATED_ITEM: &str = "unsupported_associated_item";
    pub const NO_REQUEST_DECLARATIONS: &str = "no_request_declarations";
    pub const MALFORMED_DECLARATION: &str = "malformed_declaration";
    pub const MISPLACED_DECLARATION: &str = "misplaced_declaration";
    pub const UNKNOWN_DECLARATION: &str = "unknown_declaration";
    pub const REDUNDANT_DECLARATION: &str = "redundant_declaration";
    pub const MISSING_REQUEST_DECLARATION: &str = "missing_request_declaration";
    pub const MULTIPLE_REQUEST_DECLARATIONS: &str = "multiple_request_declarations";
    pub const INVALID_PATH_TEMPLATE: &str = "invalid_path_template";
    pub const MISSING_PATH_PARAMETER: &str = "missing_path_parameter";
    pub const UNUSED_PATH_PARAMETER: &str = "unused_path_parameter";
    pub const DUPLICATE_PATH_PARAMETER: &str = "duplicate_path_parameter";
    pub const MULTIPLE_BINDING_ROLES: &str = "multiple_binding_roles";
    pub const MULTIPLE_BODY_PARAMETERS: &str = "multiple_body_parameters";
    pub const INVALID_BODY_ENCODING: &str = "invalid_body_encoding";
    pub const MULTIPLE_CANCELLATION_PARAMETERS: &str = "multiple_cancellation_parameters";
    pub const BINDING_ON_CANCELLATION: &str = "binding_on_cancellation";
    pub const BY_REF_PARAMETER: &str = "by_ref_parameter";
    pub const INVALID_HEADER: &str = "invalid_header";
    pub const HEADER_VALUE_ON_PARAMETER: &str = "header_value_on_parameter";
    pub const DUPLICATE_METHOD: &str = "duplicate_method";
    pub const PROPERTY_ACCESSORS: &str = "property_accessors";
    pub const REQUESTER_PROPERTY: &str = "requester_property";
    pub const MISSING_PROPERTY_BINDING: &str = "missing_property_binding";
    pub const UNUSED_PATH_PROPERTY: &str = "unused_path_property";
    pub const STATIC_METHOD: &str = "static_method";
}

/// Print diagnostics grouped by severity
pub fn print_diagnostics(diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        println!("✅ No issues found!");
        return;
    }

    let errors: Vec<_> = diagnostics.iter().filter(|d| d.severity == Severity::Error).collect();
    let warnings: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Warning)
        .collect();
    let infos: Vec<_> = diagnostics.iter().filter(|d| d.severity == Severity::Info).collect();

    println!("\n📋 Lint Results:");
    println!(
        "   {} error(s), {} warning(s), {} info(s)\n",
        errors.len(),
        warnings.len(),
        infos.len()
    );

    for (title, group) in [
        ("❌ Errors (must fix):", &errors),
        ("⚠️  Warnings (should fix):", &warnings),
        ("ℹ️  Info (best practices):", &infos),
    ] {
        if group.is_empty() {
            continue;
        }
        println!("{title}");
        for d in group.iter() {
            println!("   [{}] {}", d.code, d.location);
            println!("      {}", d.message);
            if let Some(suggestion) = &d.suggestion {
                println!("      💡 Suggestion: {}", suggestion);
            }
        }
        println!();
    }
}
