//! Render error types

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors from opening documents and rasterizing pages
#[derive(Error, Debug)]
pub enum RenderError {
    /// The document file could not be read
    #[error("Failed to open document '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file was read but is not a document we can paginate
    #[error("Failed to decode document '{path}': {details}")]
    Decode { path: PathBuf, details: String },

    /// Page index outside `[0, page_count)`
    #[error("Page {index} out of range (document has {page_count} pages)")]
    OutOfRange { index: usize, page_count: usize },

    /// Rasterizing one page failed
    #[error("Failed to render page {index}: {details}")]
    Rasterize { index: usize, details: String },

    /// The renderer was closed while the request was pending
    #[error("Renderer closed")]
    Closed,
}

impl RenderError {
    /// Whether this error is an abort caused by closing or switching documents
    pub fn is_abort(&self) -> bool {
        matches!(self, RenderError::Closed)
    }
}

pub type RenderResult<T> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_message() {
        let err = RenderError::OutOfRange {
            index: 4,
            page_count: 2,
        };
        assert_eq!(
            err.to_string(),
            "Page 4 out of range (document has 2 pages)"
        );
    }

    #[test]
    fn test_only_closed_is_abort() {
        assert!(RenderError::Closed.is_abort());
        assert!(!RenderError::Rasterize {
            index: 0,
            details: "bad".to_string()
        }
        .is_abort());
    }
}
