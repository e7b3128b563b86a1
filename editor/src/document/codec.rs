//! Document parse/serialize capability.
//!
//! Binary formats live outside the engine; these two codecs cover plain text
//! and the engine's own JSON model so the driver and tests have something real
//! to round-trip through.

use std::path::Path;

use super::{Document, Paragraph};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait DocumentCodec: Send + Sync {
    /// Short name used in logs and CLI flags
    fn name(&self) -> &'static str;

    fn parse(&self, raw: &[u8]) -> Result<Document, CodecError>;

    fn serialize(&self, document: &Document) -> Result<Vec<u8>, CodecError>;

    fn load(&self, path: &Path) -> Result<Document, CodecError> {
        let raw = std::fs::read(path)?;
        self.parse(&raw)
    }

    fn save(&self, document: &Document, path: &Path) -> Result<(), CodecError> {
        let raw = self.serialize(document)?;
        std::fs::write(path, raw)?;
        Ok(())
    }
}

/// UTF-8 text, one paragraph per line, one unstyled run per paragraph.
///
/// Line endings are not part of the model: `\r\n` input is written back as
/// `\n`, and output always ends with a newline. Untouched text renders the
/// same but is not byte-identical for such input.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextCodec;

impl DocumentCodec for PlainTextCodec {
    fn name(&self) -> &'static str {
        "text"
    }

    fn parse(&self, raw: &[u8]) -> Result<Document, CodecError> {
        let text = std::str::from_utf8(raw)
            .map_err(|e| CodecError::UnsupportedFormat(format!("not UTF-8 text: {e}")))?;
        let text = text.strip_suffix('\n').unwrap_or(text);
        let paragraphs = text
            .split('\n')
            .map(|line| Paragraph::plain(line.strip_suffix('\r').unwrap_or(line)))
            .collect();
        Ok(Document::new(paragraphs))
    }

    fn serialize(&self, document: &Document) -> Result<Vec<u8>, CodecError> {
        let mut out = document.text();
        out.push('\n');
        Ok(out.into_bytes())
    }
}

/// JSON form of the paragraph/run model, styles included
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl DocumentCodec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn parse(&self, raw: &[u8]) -> Result<Document, CodecError> {
        serde_json::from_slice::<Document>(raw)
            .map_err(|e| CodecError::UnsupportedFormat(format!("invalid document JSON: {e}")))
    }

    fn serialize(&self, document: &Document) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec_pretty(document)
            .map_err(|e| CodecError::UnsupportedFormat(format!("failed to encode document: {e}")))
    }
}
