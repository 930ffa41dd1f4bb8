use std::path::{Path, PathBuf};

use super::{
    DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader, PdfLoader, TextLoader,
    WebLoader,
};

/// How a source reference is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Url,
    PdfDirectory,
    SinglePdf,
    TextFile,
    /// A `.txt` file whose lines are URLs to fetch.
    UrlList,
}

fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

async fn read_bounded(path: &Path, max_size: u64) -> Result<String, DocumentError> {
    let meta = tokio::fs::metadata(path).await?;
    if meta.len() > max_size {
        return Err(DocumentError::FileTooLarge(meta.len()));
    }
    Ok(tokio::fs::read_to_string(path).await?)
}

/// Classify a source reference. Rules are checked in order: URL prefix,
/// existing directory, `.pdf` extension, `.txt` extension (URL list if any
/// trimmed line is a URL, plain text otherwise).
///
/// # Errors
///
/// Returns [`DocumentError::UnsupportedSource`] when no rule matches, or an IO
/// error if a `.txt` file cannot be read.
pub async fn classify(reference: &str) -> Result<SourceKind, DocumentError> {
    classify_with_limit(reference, DEFAULT_MAX_FILE_SIZE).await
}

async fn classify_with_limit(reference: &str, max_size: u64) -> Result<SourceKind, DocumentError> {
    if is_url(reference) {
        return Ok(SourceKind::Url);
    }

    let path = Path::new(reference);
    if tokio::fs::metadata(path).await.is_ok_and(|m| m.is_dir()) {
        return Ok(SourceKind::PdfDirectory);
    }
    if has_extension(path, "pdf") {
        return Ok(SourceKind::SinglePdf);
    }
    if has_extension(path, "txt") {
        let content = read_bounded(path, max_size).await?;
        if content.lines().any(|line| is_url(line.trim())) {
            return Ok(SourceKind::UrlList);
        }
        return Ok(SourceKind::TextFile);
    }

    Err(DocumentError::UnsupportedSource(reference.to_owned()))
}

/// Loads heterogeneous source references into documents.
pub struct SourceLoader {
    text: TextLoader,
    pdf: PdfLoader,
    web: WebLoader,
    max_file_size: u64,
}

impl Default for SourceLoader {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_SIZE, WebLoader::default())
    }
}

impl SourceLoader {
    #[must_use]
    pub fn new(max_file_size: u64, web: WebLoader) -> Self {
        Self {
            text: TextLoader { max_file_size },
            pdf: PdfLoader { max_file_size },
            web,
            max_file_size,
        }
    }

    /// Load every source in order and concatenate the documents.
    ///
    /// # Errors
    ///
    /// The first failing source aborts the whole load.
    pub async fn load<S: AsRef<str>>(&self, sources: &[S]) -> Result<Vec<Document>, DocumentError> {
        let mut documents = Vec::new();
        for source in sources {
            let docs = self.load_one(source.as_ref()).await?;
            documents.extend(docs);
        }
        tracing::info!(
            sources = sources.len(),
            documents = documents.len(),
            "sources loaded"
        );
        Ok(documents)
    }

    /// Load a single source reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the reference cannot be classified or loading fails.
    pub async fn load_one(&self, reference: &str) -> Result<Vec<Document>, DocumentError> {
        let kind = classify_with_limit(reference, self.max_file_size).await?;
        tracing::debug!(reference, ?kind, "loading source");

        match kind {
            SourceKind::Url => Ok(vec![self.web.fetch(reference).await?]),
            SourceKind::PdfDirectory => {
                let mut documents = Vec::new();
                for path in pdf_files_in(Path::new(reference)).await? {
                    documents.extend(self.pdf.load(&path).await?);
                }
                Ok(documents)
            }
            SourceKind::SinglePdf => self.pdf.load(Path::new(reference)).await,
            SourceKind::TextFile => self.text.load(Path::new(reference)).await,
            SourceKind::UrlList => {
                let content = read_bounded(Path::new(reference), self.max_file_size).await?;
                let mut documents = Vec::new();
                for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
                    documents.push(self.web.fetch(line).await?);
                }
                Ok(documents)
            }
        }
    }
}

/// Non-hidden `*.pdf` files directly inside `dir`, sorted by file name.
async fn pdf_files_in(dir: &Path) -> Result<Vec<PathBuf>, DocumentError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !hidden && has_extension(&path, "pdf") && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
