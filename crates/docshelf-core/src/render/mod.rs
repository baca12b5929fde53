//! Page render pipeline
//!
//! Renders the pages of the document on screen into images without
//! blocking the caller, and never lets a page from a previous document
//! reach the current view.
//!
//! ## Architecture
//!
//! - **DocumentLoader / PageSource**: the boundary to the document format.
//!   `FormatLoader` sends PDFs to `PdfLoader` (Pdfium) and images to
//!   `RasterLoader`.
//! - **PageRenderer**: one open document plus its page cache.
//! - **RenderScheduler**: bounded worker pool, cancellation on document
//!   switch, generation-gated delivery.
//! - **UiDispatcher**: where finished pages are applied.

pub mod dispatch;
pub mod error;
pub mod page;
pub mod pdf;
pub mod renderer;
pub mod scheduler;
pub mod source;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatch::{ChannelDispatcher, DirectDispatcher, UiDispatcher, UiTask};
pub use error::{RenderError, RenderResult};
pub use page::{PageImage, RenderSettings};
pub use renderer::PageRenderer;
pub use scheduler::{GenerationGate, PageReady, RenderScheduler, ViewState, ViewTicket};
pub use pdf::PdfLoader;
pub use source::{DocumentLoader, FormatLoader, PageSource, RasterLoader};
