//! Plain-text document source.
//!
//! Pages are separated by form feed (`\x0c`), the convention `pdftotext`
//! and most text-mode printers use. Each page is split into word runs that
//! keep their trailing whitespace, so concatenating a page's fragments
//! reproduces the page text exactly.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use quotemark_core::logging::{component, subsystem};
use quotemark_core::{
    DocumentSource, Error, ExtractedFragment, PageNumber, Result, VisualHandle,
};

const PAGE_BREAK: char = '\x0c';

/// A document held in memory as one string per page.
#[derive(Debug, Clone)]
pub struct PlainTextDocument {
    pages: Vec<String>,
}

impl PlainTextDocument {
    /// Split `text` into pages.
    pub fn from_text(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(Error::DocumentLoad("Document contains no text".to_string()));
        }
        let mut pages: Vec<String> = text.split(PAGE_BREAK).map(str::to_string).collect();
        if pages.len() > 1 && pages.last().is_some_and(|p| p.is_empty()) {
            pages.pop();
        }
        Ok(Self { pages })
    }

    /// Read a UTF-8 text file.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::DocumentLoad(format!("{}: {}", path.display(), e)))?;
        let doc = Self::from_text(&text)?;
        debug!(
            subsystem = subsystem::SESSION,
            component = component::SOURCE,
            page_count = doc.pages.len(),
            "Loaded plain-text document"
        );
        Ok(doc)
    }
}

/// Split page text into whitespace-preserving word runs.
///
/// Leading whitespace belongs to the first fragment.
pub fn word_runs(text: &str) -> Vec<&str> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut prev_ws = false;
    for (i, c) in text.char_indices() {
        let ws = c.is_whitespace();
        if prev_ws && !ws && i > start && !text[start..i].trim().is_empty() {
            runs.push(&text[start..i]);
            start = i;
        }
        prev_ws = ws;
    }
    if start < text.len() {
        runs.push(&text[start..]);
    }
    runs
}

#[async_trait]
impl DocumentSource for PlainTextDocument {
    fn page_count(&self) -> PageNumber {
        self.pages.len() as PageNumber
    }

    async fn extract_page(&self, page: PageNumber) -> Result<Vec<ExtractedFragment>> {
        let text = page
            .checked_sub(1)
            .and_then(|i| self.pages.get(i as usize))
            .ok_or_else(|| Error::PageOutOfRange {
                page,
                page_count: self.page_count(),
            })?;

        Ok(word_runs(text)
            .into_iter()
            .enumerate()
            .map(|(i, run)| ExtractedFragment::new(run, VisualHandle::new(format!("p{page}-f{i}"))))
            .collect())
    }
}
