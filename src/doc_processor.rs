use std::fs;
use std::io::{Cursor, Read};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

/// Extensions accepted by the upload surface.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["pdf", "txt", "doc", "docx"];

#[derive(Debug, thiserror::Error)]
pub enum DocError {
    #[error("Unsupported file type: .{0}")]
    Unsupported(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Pdf(String),
    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("Word document error: {0}")]
    Word(String),
}

/// File type tag, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Text,
    Word,
}

impl FileKind {
    pub fn from_name(name: &str) -> Result<Self, DocError> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        if !ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(DocError::Unsupported(ext));
        }
        match ext.as_str() {
            "pdf" => Ok(FileKind::Pdf),
            "txt" => Ok(FileKind::Text),
            _ => Ok(FileKind::Word),
        }
    }
}

/// A document attached to the chat session.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub name: String,
    pub media_type: String,
    pub size: usize,
    pub bytes: Vec<u8>,
}

impl UploadedDocument {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        Self {
            media_type: media_type_for(&name).to_string(),
            size: bytes.len(),
            name,
            bytes,
        }
    }

    /// Read a file from disk, rejecting anything outside [`ACCEPTED_EXTENSIONS`].
    pub fn from_path(path: &Path) -> Result<Self, DocError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        FileKind::from_name(&name)?;

        let bytes = fs::read(path)?;
        Ok(Self::new(name, bytes))
    }

    pub fn kind(&self) -> Result<FileKind, DocError> {
        FileKind::from_name(&self.name)
    }

    /// Info block shown after a successful upload.
    pub fn summary(&self) -> String {
        format!(
            "Current Document:\n  Name: {}\n  Type: {}\n  Size: {:.1} KB",
            self.name,
            self.media_type,
            self.size as f64 / 1024.0
        )
    }
}

fn media_type_for(name: &str) -> &'static str {
    match FileKind::from_name(name) {
        Ok(FileKind::Pdf) => "application/pdf",
        Ok(FileKind::Text) => "text/plain",
        Ok(FileKind::Word) if name.to_lowercase().ends_with(".doc") => "application/msword",
        Ok(FileKind::Word) => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Err(_) => "application/octet-stream",
    }
}

/// Extract plain text from an uploaded document.
///
/// Never fails: any error is rendered into the returned string so a bad file
/// cannot stop the conversation.
pub fn extract_text(document: &UploadedDocument) -> String {
    match try_extract(document) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(file = %document.name, error = %e, "document extraction failed");
            format!("Error processing file: {}", e)
        }
    }
}

pub fn try_extract(document: &UploadedDocument) -> Result<String, DocError> {
    match document.kind()? {
        FileKind::Text => Ok(String::from_utf8(document.bytes.clone())?),
        FileKind::Pdf => extract_pdf(&document.bytes),
        FileKind::Word => extract_docx(&document.bytes),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, DocError> {
    // pdf-extract panics on some malformed inputs.
    let pages = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }))
    .map_err(|_| DocError::Pdf("parser panicked on malformed input".into()))?
    .map_err(|e| DocError::Pdf(e.to_string()))?;

    Ok(join_pages(pages))
}

/// Concatenates pages in order, each followed by a newline.
fn join_pages(pages: Vec<String>) -> String {
    let mut content = String::new();
    for page in pages {
        content.push_str(&page);
        content.push('\n');
    }
    content
}

fn paragraph_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<w:p(?:\s[^>]*)?/>|<w:p(?:\s[^>]*)?>(.*?)</w:p>")
            .expect("paragraph pattern is valid")
    })
}

fn run_text_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>").expect("text run pattern is valid")
    })
}

fn extract_docx(bytes: &[u8]) -> Result<String, DocError> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| DocError::Word(e.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| DocError::Word(e.to_string()))?
        .read_to_string(&mut xml)?;

    let paragraphs: Vec<String> = paragraph_re()
        .captures_iter(&xml)
        .map(|p| {
            p.get(1)
                .map(|body| {
                    run_text_re()
                        .captures_iter(body.as_str())
                        .map(|t| unescape_xml(&t[1]))
                        .collect::<String>()
                })
                .unwrap_or_default()
        })
        .collect();

    Ok(paragraphs.join("\n"))
}

fn entity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"&(lt|gt|quot|apos|amp|#[0-9]+|#x[0-9a-fA-F]+);")
            .expect("entity pattern is valid")
    })
}

/// Decodes the predefined XML entities and numeric character references.
/// Unknown or out-of-range references are left as written.
fn unescape_xml(s: &str) -> String {
    entity_re()
        .replace_all(s, |caps: &regex::Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "amp" => Some('&'),
                _ => match entity.strip_prefix("#x") {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => entity[1..].parse::<u32>().ok(),
                }
                .and_then(char::from_u32),
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}
