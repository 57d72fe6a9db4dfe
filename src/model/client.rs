use super::TypeModel;
use crate::descriptor::RequestTemplate;
use crate::validator::Diagnostic;

/// A validated interface, ready to bind.
///
/// Holds the analyzed [`TypeModel`], one compiled [`RequestTemplate`] per
/// surviving method (declaration order), the name of the disposal method if the
/// interface declares one, and every non-fatal diagnostic produced on the way.
#[derive(Debug, Clone)]
pub struct ClientModel {
    pub ty: TypeModel,
    pub(crate) templates: Vec<RequestTemplate>,
    pub disposal: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ClientModel {
    pub fn name(&self) -> &str {
        &self.ty.name
    }

    pub fn template(&self, method: &str) -> Option<&RequestTemplate> {
        self.templates.iter().find(|t| t.method_name() == method)
    }

    pub fn templates(&self) -> &[RequestTemplate] {
        &self.templates
    }

    /// Names of the methods that survived validation.
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.templates.iter().map(|t| t.method_name())
    }

    pub fn is_disposal(&self, method: &str) -> bool {
        self.disposal.as_deref() == Some(method)
    }
}
