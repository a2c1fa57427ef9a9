//! Award letters: literal `{{key}}` substitution into an HTML template,
//! then conversion to PDF.

mod converter;
mod materials;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub use converter::{CommandConverter, DocumentConverter};
pub use materials::{campus_list_html, material_tables_html};

#[derive(Debug, thiserror::Error)]
pub enum LetterError {
    #[error("letter template not found: {}", .0.display())]
    TemplateMissing(PathBuf),
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("letter conversion failed: {0}")]
    Conversion(String),
}

/// Values substituted into the template. Text is escaped on insert; markup
/// fragments are inserted verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LetterContext {
    values: BTreeMap<String, String>,
}

impl LetterContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&mut self, key: &str, value: impl ToString) -> &mut Self {
        self.values
            .insert(key.to_string(), escape_html(&value.to_string()));
        self
    }

    pub fn markup(&mut self, key: &str, html: impl Into<String>) -> &mut Self {
        self.values.insert(key.to_string(), html.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Replaces every `{{key}}` with its value. Unknown placeholders stay as they
/// are.
pub fn fill_template(template: &str, context: &LetterContext) -> String {
    context
        .values
        .iter()
        .fold(template.to_string(), |html, (key, value)| {
            html.replace(&format!("{{{{{key}}}}}"), value)
        })
}

/// `Carta_Bolsa_<name>.pdf` with spaces turned into underscores.
pub fn letter_file_name(student: &str) -> String {
    format!("Carta_Bolsa_{}.pdf", student.trim().replace(' ', "_"))
}

pub fn letter_mime() -> mime::Mime {
    mime::APPLICATION_PDF
}

/// Template file plus the stylesheet it links, which must sit next to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LetterTemplate {
    path: PathBuf,
    stylesheet: Option<String>,
}

impl LetterTemplate {
    pub fn new(path: impl Into<PathBuf>, stylesheet: Option<String>) -> Self {
        Self {
            path: path.into(),
            stylesheet,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Reads the template, checking the stylesheet is in place first.
    pub fn load(&self) -> Result<String, LetterError> {
        if let Some(stylesheet) = &self.stylesheet {
            let css = self.base_dir().join(stylesheet);
            if !css.is_file() {
                return Err(LetterError::TemplateMissing(css));
            }
        }
        std::fs::read_to_string(&self.path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                LetterError::TemplateMissing(self.path.clone())
            } else {
                LetterError::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        })
    }
}

/// A converted letter ready to hand over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLetter {
    pub file_name: String,
    pub mime: mime::Mime,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub struct LetterRenderer {
    template: LetterTemplate,
    converter: Box<dyn DocumentConverter>,
}

impl LetterRenderer {
    pub fn new(template: LetterTemplate, converter: Box<dyn DocumentConverter>) -> Self {
        Self {
            template,
            converter,
        }
    }

    pub fn template(&self) -> &LetterTemplate {
        &self.template
    }

    /// The template is re-read on every call so edits apply without a restart.
    pub fn render(
        &self,
        student: &str,
        context: &LetterContext,
    ) -> Result<RenderedLetter, LetterError> {
        let template = self.template.load()?;
        let html = fill_template(&template, context);
        let bytes = self.converter.convert(&html, self.template.base_dir())?;
        Ok(RenderedLetter {
            file_name: letter_file_name(student),
            mime: letter_mime(),
            bytes,
        })
    }
}

pub(crate) fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
