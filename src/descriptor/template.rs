//! Path templates: literal text interleaved with `{name}` placeholders.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Placeholder names: identifier-like, dots and dashes allowed after the first char
static PLACEHOLDER_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").expect("placeholder regex should be valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unclosed `{{` at offset {0}")]
    Unclosed(usize),
    #[error("unmatched `}}` at offset {0}")]
    Unopened(usize),
    #[error("empty placeholder at offset {0}")]
    Empty(usize),
    #[error("invalid placeholder name `{0}`")]
    InvalidName(String),
}

/// A parsed path template.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathTemplate {
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.char_indices();

        while let Some((offset, c)) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        match c {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(TemplateError::Unclosed(offset)),
                            c => name.push(c),
                        }
                    }
                    if !closed {
                        return Err(TemplateError::Unclosed(offset));
                    }
                    let name = name.trim().to_string();
                    if name.is_empty() {
                        return Err(TemplateError::Empty(offset));
                    }
                    if !PLACEHOLDER_NAME.is_match(&name) {
                        return Err(TemplateError::InvalidName(name));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                '}' => return Err(TemplateError::Unopened(offset)),
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(PathTemplate { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Placeholder names in order of appearance, repeats included.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Substitute placeholders through `lookup`. A placeholder `lookup` does
    /// not know is written back verbatim.
    pub fn render<F>(&self, mut lookup: F) -> String
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                },
            }
        }
        out
    }
}

impl std::fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render(|_| None))
    }
}

/// Whether a request path ignores the base path.
pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/') || url::Url::parse(path).map(|u| u.has_host()).unwrap_or(false)
}

/// Join base path and method path with exactly one `/` between them.
pub fn join(base: &str, path: &str) -> String {
    match (base.is_empty(), path.is_empty()) {
        (true, _) => path.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        ),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_segments() {
        let template = PathTemplate::parse("users/{id}/posts/{postId}").unwrap();
        assert_eq!(
            template.placeholders().collect::<Vec<_>>(),
            vec!["id", "postId"]
        );
        assert_eq!(template.segments().len(), 4);
    }

    #[test]
    fn test_malformed_templates() {
        assert_eq!(
            PathTemplate::parse("users/{id").unwrap_err(),
            TemplateError::Unclosed(6)
        );
        assert_eq!(
            PathTemplate::parse("users/id}").unwrap_err(),
            TemplateError::Unopened(8)
        );
        assert_eq!(
            PathTemplate::parse("users/{}").unwrap_err(),
            TemplateError::Empty(6)
        );
        assert!(matches!(
            PathTemplate::parse("users/{a b}"),
            Err(TemplateError::InvalidName(_))
        ));
        assert!(PathTemplate::parse("a/{b{c}}").is_err());
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let template = PathTemplate::parse("{a}/{b}").unwrap();
        let out = template.render(|name| (name == "a").then(|| "1".to_string()));
        assert_eq!(out, "1/{b}");
    }

    #[test]
    fn test_absolute_paths() {
        assert!(is_absolute("/users"));
        assert!(is_absolute("https://example.com/users"));
        assert!(!is_absolute("users"));
        assert!(!is_absolute(""));
    }

    #[test]
    fn test_join_uses_single_separator() {
        assert_eq!(join("api/", "/users"), "api/users");
        assert_eq!(join("api", "users"), "api/users");
        assert_eq!(join("api", ""), "api");
        assert_eq!(join("", "users"), "users");
    }
}
