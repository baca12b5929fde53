//! Docshelf Core Library
//!
//! This crate provides the core functionality for Docshelf, a personal
//! document archive: files are copied into archive-managed storage, tagged
//! and described, and their pages rendered for viewing.
//!
//! # Architecture
//!
//! - **Archive store**: owns the in-memory archive, persists a JSON snapshot
//!   after every command and announces changes on the event bus.
//! - **Render pipeline**: renders the pages of the viewed document on a
//!   bounded worker pool, discarding results from documents no longer shown.
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let events = Arc::new(EventBus::new());
//! let mut store = ArchiveStore::open(&config, Arc::clone(&events))?;
//!
//! // Add and tag a document
//! let entries = store.add_files(&["scan.png"])?;
//! store.add_tag(entries[0].id, "invoice")?;
//!
//! // Render its pages
//! let scheduler = RenderScheduler::new(
//!     Handle::current(),
//!     Arc::new(FormatLoader::new()),
//!     Arc::new(DirectDispatcher),
//!     RenderSettings::default(),
//!     config.effective_render_workers(),
//! );
//! scheduler.view_document(&entries[0].absolute_path, |page| show(page))?;
//! ```
//!
//! # Modules
//!
//! - `store`: Archive store service (main entry point)
//! - `models`: Tags, archive entries and the archive aggregate
//! - `events`: Domain events and the event bus
//! - `settings`: User preferences
//! - `storage`: Snapshot persistence
//! - `render`: Page rendering and scheduling
//! - `config`: Application configuration

pub mod config;
pub mod events;
pub mod models;
pub mod render;
pub mod settings;
pub mod storage;
pub mod store;

pub use config::Config;
pub use events::{ArchiveEvent, EventBus, EventKind, EventLog, SubscriptionId};
pub use models::{Archive, ArchiveEntry, Tag};
pub use render::{
    ChannelDispatcher, DirectDispatcher, DocumentLoader, FormatLoader, PageImage, PageReady,
    PageRenderer, PdfLoader, RasterLoader, RenderError, RenderScheduler, RenderSettings,
    UiDispatcher, ViewState, ViewTicket,
};
pub use settings::{ApplicationSettings, SettingsService};
pub use storage::{ArchiveGateway, SettingsGateway, SnapshotPersistence, StorageError};
pub use store::{ArchiveError, ArchiveStore};
