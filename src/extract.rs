//! Document text extraction for uploads (plain text, PDF, DOCX).
//!
//! The declared MIME type decides how bytes are read; anything outside the
//! allow-list is rejected before a parser is touched. Extraction never
//! returns partial output: it yields trimmed, non-empty text or an
//! [`ExtractError`] whose `Display` is safe to show to users.

use std::io::Read;
use std::path::Path;

use crate::models::UploadedFile;

pub const MIME_TEXT: &str = "text/plain";
pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Upload extensions, mirroring the MIME allow-list.
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["txt", "pdf", "docx"];

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// A document format the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentType {
    PlainText,
    Pdf,
    Docx,
}

impl DocumentType {
    /// Resolves a declared MIME type. Parameters such as `; charset=utf-8`
    /// are ignored; the essence must match exactly.
    pub fn from_mime(mime: &str) -> Result<Self, ExtractError> {
        let essence = mime.split(';').next().unwrap_or("").trim();
        match essence {
            MIME_TEXT => Ok(DocumentType::PlainText),
            MIME_PDF => Ok(DocumentType::Pdf),
            MIME_DOCX => Ok(DocumentType::Docx),
            _ => Err(ExtractError::InvalidFile(mime.to_string())),
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(DocumentType::PlainText),
            "pdf" => Some(DocumentType::Pdf),
            "docx" => Some(DocumentType::Docx),
            _ => None,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            DocumentType::PlainText => MIME_TEXT,
            DocumentType::Pdf => MIME_PDF,
            DocumentType::Docx => MIME_DOCX,
        }
    }
}

/// Extraction failure. Parser details are carried for logging only; the
/// `Display` text is the user-facing message.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Invalid file: only .txt, .pdf, .docx files are allowed")]
    InvalidFile(String),
    #[error("Empty file: the uploaded file has no text")]
    EmptyFile,
    #[error("File too large: {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },
    #[error("Failed to read text file: content is not valid UTF-8")]
    Encoding,
    #[error("Failed to extract text from PDF")]
    Pdf(String),
    #[error("Failed to extract text from DOCX")]
    Docx(String),
    #[error("Document extraction must run inside the async runtime")]
    NoRuntime,
}

/// Rejects uploads larger than `limit` bytes.
pub fn check_size(size: u64, limit: u64) -> Result<(), ExtractError> {
    if size > limit {
        return Err(ExtractError::TooLarge { size, limit });
    }
    Ok(())
}

/// Extracts text from an upload on the blocking pool.
///
/// The declared type is checked first; a disallowed type never reaches a
/// parser. Must be awaited from within a Tokio runtime, otherwise it fails
/// with [`ExtractError::NoRuntime`] on first poll.
pub async fn extract_upload(file: UploadedFile) -> Result<String, ExtractError> {
    let doc_type = DocumentType::from_mime(&file.mime_type)?;
    let handle = tokio::runtime::Handle::try_current().map_err(|_| ExtractError::NoRuntime)?;

    let name = file.file_name.clone();
    let result = match handle
        .spawn_blocking(move || extract_document(doc_type, &file.bytes))
        .await
    {
        Ok(result) => result,
        // pdf-extract panics on some malformed inputs
        Err(e) => Err(match doc_type {
            DocumentType::Docx => ExtractError::Docx(e.to_string()),
            _ => ExtractError::Pdf(e.to_string()),
        }),
    };

    match &result {
        Ok(text) => tracing::debug!(file = %name, chars = text.len(), "extracted upload"),
        Err(ExtractError::Pdf(detail) | ExtractError::Docx(detail)) => {
            tracing::error!(file = %name, error = %detail, "extraction failed")
        }
        Err(e) => tracing::warn!(file = %name, error = %e, "upload rejected"),
    }
    result
}

/// Extracts plain text from `bytes` declared as `content_type`.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, ExtractError> {
    let doc_type = DocumentType::from_mime(content_type)?;
    extract_document(doc_type, bytes)
}

fn extract_document(doc_type: DocumentType, bytes: &[u8]) -> Result<String, ExtractError> {
    let text = match doc_type {
        DocumentType::PlainText => {
            String::from_utf8(bytes.to_vec()).map_err(|_| ExtractError::Encoding)?
        }
        DocumentType::Pdf => extract_pdf(bytes)?,
        DocumentType::Docx => extract_docx(bytes)?,
    };
    if text.trim().is_empty() {
        return Err(ExtractError::EmptyFile);
    }
    Ok(text)
}

/// Page text with fragments joined by single spaces, one line per page.
fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;
    let mut out = String::new();
    for page in pages {
        let fragments: Vec<&str> = page.split_whitespace().collect();
        out.push_str(&fragments.join(" "));
        out.push('\n');
    }
    Ok(out.trim().to_string())
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Docx(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Docx(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let doc_xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    let text = extract_raw_text(&doc_xml)?;
    Ok(text.trim().to_string())
}

/// Raw text of a WordprocessingML body: `<w:t>` runs concatenated,
/// paragraphs ended with a newline, `<w:tab/>` and `<w:br/>` kept as
/// whitespace.
fn extract_raw_text(xml: &[u8]) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    // tab stops inside paragraph properties are not content
    let mut in_props = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"pPr" => in_props = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te.unescape().map_err(|e| ExtractError::Docx(e.to_string()))?;
                out.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"pPr" => in_props = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) if !in_props => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}
