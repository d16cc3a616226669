use crate::error::IngestError;
use crate::models::{Chunk, RagOptions};

const PARAGRAPH_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub max_chars: usize,
}

impl ChunkingConfig {
    pub fn new(max_chars: usize) -> Result<Self, IngestError> {
        if max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "max_chars must be greater than zero".to_string(),
            ));
        }
        Ok(Self { max_chars })
    }
}

impl TryFrom<&RagOptions> for ChunkingConfig {
    type Error = IngestError;

    fn try_from(value: &RagOptions) -> Result<Self, Self::Error> {
        Self::new(value.chunk_max_chars)
    }
}

pub fn chunk_id(page: u32, ordinal: usize) -> String {
    format!("page{page}_chunk{ordinal}")
}

/// Splits text into paragraphs on blank lines. Paragraphs are trimmed and
/// empty ones dropped; line breaks inside a paragraph are kept.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            push_paragraph(&mut paragraphs, &current);
            current.clear();
        } else {
            current.push(line);
        }
    }
    push_paragraph(&mut paragraphs, &current);

    paragraphs
}

fn push_paragraph(paragraphs: &mut Vec<String>, lines: &[&str]) {
    let paragraph = lines
        .join("\n")
        .replace(['\t', '\u{a0}'], " ")
        .trim()
        .to_string();
    if !paragraph.is_empty() {
        paragraphs.push(paragraph);
    }
}

/// Packs the paragraphs of one page into chunks of at most `max_chars`
/// characters. A paragraph that alone exceeds the limit is emitted as its
/// own chunk rather than being cut.
pub fn chunk_page(text: &str, page: u32, config: ChunkingConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for paragraph in split_paragraphs(text) {
        let paragraph_chars = paragraph.chars().count();

        if current.is_empty() {
            current = paragraph;
            current_chars = paragraph_chars;
            continue;
        }

        let joined_chars = current_chars + PARAGRAPH_SEPARATOR.len() + paragraph_chars;
        if joined_chars > config.max_chars {
            let ordinal = chunks.len();
            chunks.push(Chunk {
                id: chunk_id(page, ordinal),
                text: std::mem::replace(&mut current, paragraph),
                page,
            });
            current_chars = paragraph_chars;
        } else {
            current.push_str(PARAGRAPH_SEPARATOR);
            current.push_str(&paragraph);
            current_chars = joined_chars;
        }
    }

    if !current.is_empty() {
        let ordinal = chunks.len();
        chunks.push(Chunk {
            id: chunk_id(page, ordinal),
            text: current,
            page,
        });
    }

    chunks
}
