//! Serializes the finished document. Nothing is written until the whole
//! document has been rendered.

use crate::document::FactDocument;
use crate::error::{FactsError, Result};
use std::io::Write;

/// Pretty-printed JSON text of `doc`.
pub fn serialize(doc: &FactDocument) -> Result<String> {
    serde_json::to_string_pretty(doc).map_err(|e| FactsError::Serialization(e.to_string()))
}

/// Writes `doc` to `out` in one piece, followed by a newline.
pub fn emit<W: Write>(doc: &FactDocument, mut out: W) -> Result<()> {
    let text = serialize(doc)?;
    writeln!(out, "{}", text)?;
    out.flush()?;
    Ok(())
}
