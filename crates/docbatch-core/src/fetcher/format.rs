//! Document format detection: magic bytes, then Content-Type, then URL extension.

use serde::{Deserialize, Serialize};

use crate::retry::FetchError;

const OLE2_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
/// How far into the body to look for `%PDF-` (some servers prepend junk).
const PDF_SCAN_LIMIT: usize = 1024;

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Doc,
    Docx,
    Rtf,
    Zip,
}

impl DocumentFormat {
    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Doc => "doc",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Rtf => "rtf",
            DocumentFormat::Zip => "zip",
        }
    }

    /// Case-insensitive lookup by file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "doc" => Some(DocumentFormat::Doc),
            "docx" => Some(DocumentFormat::Docx),
            "rtf" => Some(DocumentFormat::Rtf),
            "zip" => Some(DocumentFormat::Zip),
            _ => None,
        }
    }

    fn from_content_type(ct: &str) -> Option<Self> {
        let mime = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match mime.as_str() {
            "application/pdf" | "application/x-pdf" => Some(DocumentFormat::Pdf),
            "application/msword" => Some(DocumentFormat::Doc),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(DocumentFormat::Docx)
            }
            "application/rtf" | "text/rtf" => Some(DocumentFormat::Rtf),
            "application/zip" | "application/x-zip-compressed" => Some(DocumentFormat::Zip),
            _ => None,
        }
    }
}

fn sniff(bytes: &[u8]) -> Option<DocumentFormat> {
    let head = &bytes[..bytes.len().min(PDF_SCAN_LIMIT)];
    if head.windows(5).any(|w| w == b"%PDF-") {
        return Some(DocumentFormat::Pdf);
    }
    if bytes.starts_with(OLE2_MAGIC) {
        return Some(DocumentFormat::Doc);
    }
    if bytes.starts_with(ZIP_MAGIC) {
        // Entry names are stored uncompressed in local file headers.
        let is_docx = bytes.windows(5).any(|w| w == b"word/");
        return Some(if is_docx {
            DocumentFormat::Docx
        } else {
            DocumentFormat::Zip
        });
    }
    if bytes.starts_with(b"{\\rtf") {
        return Some(DocumentFormat::Rtf);
    }
    None
}

fn looks_like_html(bytes: &[u8], content_type: Option<&str>) -> bool {
    if content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html")) {
        return true;
    }
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let head: Vec<u8> = bytes[start..]
        .iter()
        .take(15)
        .map(u8::to_ascii_lowercase)
        .collect();
    head.starts_with(b"<!doctype html") || head.starts_with(b"<html")
}

fn from_url_extension(url: &str) -> Option<DocumentFormat> {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string());
    let last = path.rsplit('/').next()?;
    let (_, ext) = last.rsplit_once('.')?;
    DocumentFormat::from_extension(ext)
}

/// Detect the format of a fetched body. HTML pages and unrecognized bodies
/// are `UnsupportedContent`.
pub fn detect_format(
    bytes: &[u8],
    content_type: Option<&str>,
    url: &str,
) -> Result<DocumentFormat, FetchError> {
    if let Some(format) = sniff(bytes) {
        return Ok(format);
    }
    if looks_like_html(bytes, content_type) {
        return Err(FetchError::UnsupportedContent("HTML page".to_string()));
    }
    if let Some(format) = content_type.and_then(DocumentFormat::from_content_type) {
        return Ok(format);
    }
    if let Some(format) = from_url_extension(url) {
        return Ok(format);
    }
    Err(FetchError::UnsupportedContent(
        content_type.unwrap_or("unknown content").to_string(),
    ))
}
