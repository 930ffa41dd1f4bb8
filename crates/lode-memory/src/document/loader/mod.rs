mod pdf;
mod text;
mod web;

pub use pdf::PdfLoader;
#[cfg(test)]
pub(crate) use pdf::fixture_pdf;
pub use text::TextLoader;
pub use web::{DEFAULT_MAX_BODY_BYTES, WebLoader};

use std::path::Path;

/// File stem used as a document title.
pub(crate) fn file_title(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}
