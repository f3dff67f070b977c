use crate::domain::Diagnostic;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Turns a message key and its arguments into the text an oracle records.
pub trait MessageCatalog: Send + Sync {
    fn resolve(&self, key: &str, args: &[String]) -> String;
}

/// Renders a diagnostic as `"<line>: <message>"`.
pub fn canonical_string(diagnostic: &Diagnostic, catalog: &dyn MessageCatalog) -> String {
    format!(
        "{}: {}",
        diagnostic.line,
        catalog.resolve(&diagnostic.message_key, &diagnostic.args)
    )
}

/// Uses the key itself as the message: `key` or `key(arg0, arg1)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyCatalog;

impl MessageCatalog for KeyCatalog {
    fn resolve(&self, key: &str, args: &[String]) -> String {
        if args.is_empty() {
            key.to_string()
        } else {
            format!("{}({})", key, args.join(", "))
        }
    }
}

/// Key to template lookup with `{N}` argument placeholders.
///
/// Unknown keys fall back to [`KeyCatalog`] so a missing catalog entry shows up
/// as a readable mismatch instead of an empty message.
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read message catalog '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse message catalog '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Self::parse(json, Path::new("<inline-catalog>"))
    }

    pub fn with_template(mut self, key: impl Into<String>, template: impl Into<String>) -> Self {
        self.templates.insert(key.into(), template.into());
        self
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    fn parse(json: &str, path: &Path) -> Result<Self, CatalogError> {
        let templates: BTreeMap<String, String> =
            serde_json::from_str(json).map_err(|source| CatalogError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self { templates })
    }
}

impl MessageCatalog for TemplateCatalog {
    fn resolve(&self, key: &str, args: &[String]) -> String {
        match self.templates.get(key) {
            Some(template) => format_template(template, args),
            None => KeyCatalog.resolve(key, args),
        }
    }
}

/// Substitutes `{N}` with `args[N]`. `''` collapses to a single quote; out of
/// range or malformed placeholders are kept verbatim.
fn format_template(template: &str, args: &[String]) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((offset, ch)) = chars.next() {
        match ch {
            '\'' if chars.peek().is_some_and(|(_, next)| *next == '\'') => {
                chars.next();
                rendered.push('\'');
            }
            '{' => {
                let rest = &template[offset + 1..];
                let placeholder = rest
                    .find('}')
                    .map(|end| (&rest[..end], end))
                    .and_then(|(digits, end)| {
                        digits.parse::<usize>().ok().map(|index| (index, end))
                    });
                match placeholder {
                    Some((index, end)) if index < args.len() => {
                        rendered.push_str(&args[index]);
                        // Skip the digits and the closing brace.
                        for _ in 0..=end {
                            chars.next();
                        }
                    }
                    _ => rendered.push('{'),
                }
            }
            other => rendered.push(other),
        }
    }

    rendered
}
