//! PDF text extraction.
//!
//! Uploaded bytes are checked against the accepted MIME type and the size
//! ceiling, then parsed page by page in document order. Extraction is
//! all-or-nothing: a page that fails to decode fails the whole document and
//! nothing is committed to the [`Document`].

use thiserror::Error;

/// The only accepted document format.
pub const MIME_PDF: &str = "application/pdf";

/// Default ceiling on uploaded document size (10 MB).
pub const DEFAULT_MAX_BYTES: usize = 10 * 1024 * 1024;

/// Default ceiling on the number of pages read from one document.
pub const DEFAULT_MAX_PAGES: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("unsupported format: {0} (only {MIME_PDF} is accepted)")]
    UnsupportedFormat(String),

    #[error("document too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("failed to parse PDF: {0}")]
    ParseError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractLimits {
    pub max_bytes: usize,
    pub max_pages: usize,
}

impl Default for ExtractLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub pages_processed: usize,
    pub total_pages: usize,
}

/// An uploaded document. Text is extracted at most once.
#[derive(Debug, Clone)]
pub struct Document {
    name: Option<String>,
    mime: String,
    bytes: Vec<u8>,
    extracted: Option<ExtractedText>,
}

impl Document {
    pub fn new(name: Option<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name,
            mime: mime.into(),
            bytes,
            extracted: None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Extract text on first call; later calls return the committed result
    /// without re-parsing.
    pub fn extract(&mut self, limits: ExtractLimits) -> Result<&ExtractedText, ExtractError> {
        let extracted = match self.extracted.take() {
            Some(done) => done,
            None => extract_text(&self.bytes, &self.mime, limits)?,
        };
        Ok(self.extracted.insert(extracted))
    }

    pub fn extracted(&self) -> Option<&ExtractedText> {
        self.extracted.as_ref()
    }

    pub fn text(&self) -> Option<&str> {
        self.extracted.as_ref().map(|e| e.text.as_str())
    }
}

/// Check the declared type and size, then read up to `limits.max_pages`
/// pages. Each page is terminated with `\n`.
pub fn extract_text(
    bytes: &[u8],
    mime: &str,
    limits: ExtractLimits,
) -> Result<ExtractedText, ExtractError> {
    if !is_pdf_mime(mime) {
        return Err(ExtractError::UnsupportedFormat(mime.to_string()));
    }
    if bytes.len() > limits.max_bytes {
        return Err(ExtractError::TooLarge {
            size: bytes.len(),
            max: limits.max_bytes,
        });
    }

    let pdf = PdfPages::load(bytes)?;
    let total_pages = pdf.page_count();

    let mut text = String::new();
    let mut pages_processed = 0;
    for page in pdf.pages().take(limits.max_pages) {
        text.push_str(&page?);
        text.push('\n');
        pages_processed += 1;
    }

    if total_pages > pages_processed {
        tracing::info!(
            total_pages,
            pages_processed,
            "page ceiling reached, remaining pages skipped"
        );
    }

    Ok(ExtractedText {
        text,
        pages_processed,
        total_pages,
    })
}

/// `application/pdf`, ignoring case and any `;`-parameters.
fn is_pdf_mime(mime: &str) -> bool {
    mime.split(';')
        .next()
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(MIME_PDF))
}

/// A parsed PDF whose page texts are produced lazily, in page order.
pub struct PdfPages {
    doc: lopdf::Document,
    page_numbers: Vec<u32>,
}

impl PdfPages {
    pub fn load(bytes: &[u8]) -> Result<Self, ExtractError> {
        let doc = lopdf::Document::load_mem(bytes)
            .map_err(|e| ExtractError::ParseError(e.to_string()))?;
        // get_pages() is a BTreeMap keyed by 1-based page number
        let page_numbers = doc.get_pages().keys().copied().collect();
        Ok(Self { doc, page_numbers })
    }

    pub fn page_count(&self) -> usize {
        self.page_numbers.len()
    }

    /// Finite sequence of page texts. Nothing is decoded until the iterator
    /// is advanced; calling `pages()` again starts over from page 1.
    pub fn pages(&self) -> impl Iterator<Item = Result<String, ExtractError>> + '_ {
        self.page_numbers.iter().map(move |&number| {
            self.doc
                .extract_text(&[number])
                .map(|raw| join_text_items(&raw))
                .map_err(|e| ExtractError::ParseError(format!("page {number}: {e}")))
        })
    }
}

/// Collapse the text runs of one page into a single space-separated line.
fn join_text_items(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
