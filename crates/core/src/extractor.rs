use crate::error::IngestError;
use lopdf::Document;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const PROGRESS_EVERY_PAGES: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// Owned page iterator. `next` may block on file I/O and PDF decoding, so
/// async callers drive it from a blocking thread.
pub type PageIter = Box<dyn Iterator<Item = Result<PageText, IngestError>> + Send + 'static>;

/// A document that can be read page by page. Each call to `pages` starts a
/// fresh pass over the document. `pages` itself must stay cheap; loading
/// happens on the first `next`.
pub trait PageSource: Send + Sync {
    fn describe(&self) -> String;

    fn pages(&self) -> Result<PageIter, IngestError>;
}

#[derive(Debug, Clone)]
pub struct PdfSource {
    path: PathBuf,
}

impl PdfSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PageSource for PdfSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn pages(&self) -> Result<PageIter, IngestError> {
        match std::fs::metadata(&self.path) {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => return Err(IngestError::SourceMissing(self.path.clone())),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(IngestError::SourceMissing(self.path.clone()))
            }
            Err(error) => return Err(IngestError::Io(error)),
        }

        Ok(Box::new(PdfPages {
            path: self.path.clone(),
            opened: None,
            failed: false,
            visited: 0,
        }))
    }
}

struct OpenedPdf {
    document: Document,
    page_numbers: std::vec::IntoIter<u32>,
    total: usize,
}

struct PdfPages {
    path: PathBuf,
    opened: Option<OpenedPdf>,
    failed: bool,
    visited: usize,
}

fn load_pdf(path: &Path) -> Result<OpenedPdf, IngestError> {
    let document =
        Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;
    let page_numbers = document.get_pages().into_keys().collect::<Vec<_>>();
    info!(path = %path.display(), pages = page_numbers.len(), "opened pdf");
    Ok(OpenedPdf {
        document,
        total: page_numbers.len(),
        page_numbers: page_numbers.into_iter(),
    })
}

impl Iterator for PdfPages {
    type Item = Result<PageText, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if self.opened.is_none() {
            match load_pdf(&self.path) {
                Ok(opened) => self.opened = Some(opened),
                Err(error) => {
                    self.failed = true;
                    return Some(Err(error));
                }
            }
        }
        let opened = self.opened.as_mut()?;

        for page_no in opened.page_numbers.by_ref() {
            self.visited += 1;
            if self.visited % PROGRESS_EVERY_PAGES == 0 {
                info!(visited = self.visited, total = opened.total, "extracting pages");
            }

            let text = match opened.document.extract_text(&[page_no]) {
                Ok(text) => text,
                Err(error) => return Some(Err(IngestError::PdfParse(error.to_string()))),
            };

            let trimmed = text.trim();
            if trimmed.is_empty() {
                debug!(page = page_no, "skipping page without text");
                continue;
            }

            return Some(Ok(PageText {
                number: page_no,
                text: trimmed.to_string(),
            }));
        }
        None
    }
}

/// Pages held in memory; used for fixtures and for callers that already
/// have extracted text.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pages: Vec<PageText>,
}

impl MemorySource {
    pub fn new(pages: Vec<PageText>) -> Self {
        Self { pages }
    }

    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pages = texts
            .into_iter()
            .enumerate()
            .map(|(index, text)| PageText {
                number: (index + 1) as u32,
                text: text.into(),
            })
            .collect();
        Self { pages }
    }
}

impl PageSource for MemorySource {
    fn describe(&self) -> String {
        format!("memory ({} pages)", self.pages.len())
    }

    fn pages(&self) -> Result<PageIter, IngestError> {
        let pages = self
            .pages
            .iter()
            .filter(|page| !page.text.trim().is_empty())
            .cloned()
            .collect::<Vec<_>>();
        Ok(Box::new(pages.into_iter().map(Ok::<PageText, IngestError>)))
    }
}
