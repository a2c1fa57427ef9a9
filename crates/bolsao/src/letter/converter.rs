use std::fmt::Debug;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use super::LetterError;

/// Turns rendered HTML into a paginated document.
pub trait DocumentConverter: Debug + Send + Sync {
    /// `base_dir` resolves relative links such as the stylesheet.
    fn convert(&self, html: &str, base_dir: &Path) -> Result<Vec<u8>, LetterError>;
}

const BASE_URL_PLACEHOLDER: &str = "{base_url}";

/// Pipes the HTML through an external command and reads the PDF from its
/// standard output. `{base_url}` in an argument becomes the template
/// directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandConverter {
    program: String,
    args: Vec<String>,
}

impl CommandConverter {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `weasyprint --base-url <dir> - -`
    pub fn weasyprint(program: impl Into<String>) -> Self {
        Self::new(
            program,
            vec![
                "--base-url".to_string(),
                BASE_URL_PLACEHOLDER.to_string(),
                "-".to_string(),
                "-".to_string(),
            ],
        )
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl DocumentConverter for CommandConverter {
    fn convert(&self, html: &str, base_dir: &Path) -> Result<Vec<u8>, LetterError> {
        let base_url = base_dir.display().to_string();
        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| arg.replace(BASE_URL_PLACEHOLDER, &base_url))
            .collect();

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                LetterError::Conversion(format!("could not start {}: {err}", self.program))
            })?;

        // Feed stdin from another thread so a large document cannot fill the
        // stdout pipe while we are still writing.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| LetterError::Conversion("converter stdin unavailable".to_string()))?;
        let input = html.as_bytes().to_vec();
        let writer = std::thread::spawn(move || stdin.write_all(&input));

        let output = child
            .wait_with_output()
            .map_err(|err| LetterError::Conversion(err.to_string()))?;
        let written = writer.join();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LetterError::Conversion(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        match written {
            Ok(Ok(())) => {}
            // The command may finish without reading all of its input.
            Ok(Err(err)) if err.kind() == std::io::ErrorKind::BrokenPipe => {}
            Ok(Err(err)) => return Err(LetterError::Conversion(err.to_string())),
            Err(_) => {
                return Err(LetterError::Conversion(
                    "converter input thread panicked".to_string(),
                ))
            }
        }
        if output.stdout.is_empty() {
            return Err(LetterError::Conversion(format!(
                "{} produced no output",
                self.program
            )));
        }

        tracing::debug!(
            program = %self.program,
            bytes = output.stdout.len(),
            "converted letter"
        );
        Ok(output.stdout)
    }
}
