//! End-to-end: archive documents, then render them from the archive copy

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use docshelf_core::{
    ArchiveEvent, ArchiveStore, Config, DirectDispatcher, EventBus, EventKind, EventLog,
    FormatLoader, RenderError, RenderScheduler, RenderSettings, ViewState,
};
use image::codecs::gif::GifEncoder;
use image::{Delay, Frame, ImageBuffer, Rgba, RgbaImage};
use tempfile::TempDir;
use tokio::runtime::Handle;

fn write_scan(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    let buffer: RgbaImage = ImageBuffer::from_pixel(width, height, Rgba([240, 240, 240, 255]));
    buffer.save(&path).unwrap();
    path
}

fn write_multipage(dir: &Path, name: &str, pages: usize) -> PathBuf {
    let path = dir.join(name);
    let mut encoder = GifEncoder::new(std::fs::File::create(&path).unwrap());
    let frames = (0..pages).map(|i| {
        let shade = 50 + (i * 50) as u8;
        let buffer: RgbaImage = ImageBuffer::from_pixel(12, 16, Rgba([shade, shade, shade, 255]));
        Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(100, 1))
    });
    encoder.encode_frames(frames).unwrap();
    path
}

fn scheduler() -> RenderScheduler {
    RenderScheduler::new(
        Handle::current(),
        Arc::new(FormatLoader::new()),
        Arc::new(DirectDispatcher),
        RenderSettings::default(),
        2,
    )
}

async fn wait_until_ready(scheduler: &RenderScheduler) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !matches!(scheduler.state(), ViewState::Ready { .. }) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("rendering did not finish");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_archive_then_render_pages() {
    let temp_dir = TempDir::new().unwrap();
    let incoming = temp_dir.path().join("incoming");
    std::fs::create_dir_all(&incoming).unwrap();
    let config = Config::with_root(temp_dir.path().join("shelf"));
    config.ensure_tenant_dirs().unwrap();

    let bus = Arc::new(EventBus::new());
    let log = EventLog::attach(&bus);
    let mut store = ArchiveStore::open(&config, Arc::clone(&bus)).unwrap();

    let sources = [
        write_multipage(&incoming, "statement.gif", 3),
        write_scan(&incoming, "receipt.png", 20, 30),
    ];
    let entries = store.add_files(&sources).unwrap();
    store.add_tag(entries[0].id, "bank").unwrap();

    assert_eq!(
        log.kinds(),
        vec![
            EventKind::EntryAdded,
            EventKind::EntryAdded,
            EventKind::ArchiveModified,
            EventKind::TagAdded,
            EventKind::AllTagsChanged,
            EventKind::ArchiveModified,
        ]
    );

    // Render the multi-page document from its archive copy
    let scheduler = scheduler();
    let statement = store.get_file_path(entries[0].id).unwrap();
    let pages = Arc::new(Mutex::new(BTreeMap::new()));
    let sink = Arc::clone(&pages);
    let ticket = scheduler
        .view_document(&statement, move |page| {
            sink.lock()
                .unwrap()
                .insert(page.page_index, (page.image.width(), page.image.height()));
        })
        .unwrap();
    wait_until_ready(&scheduler).await;

    assert_eq!(ticket.page_count, 3);
    let pages = pages.lock().unwrap().clone();
    assert_eq!(pages.len(), 3);
    assert!(pages.values().all(|dims| *dims == (24, 32)));

    // Switch to the single-page scan
    let receipt = store.get_file_path(entries[1].id).unwrap();
    let ticket = scheduler.view_document(&receipt, |_| {}).unwrap();
    assert_eq!(ticket.page_count, 1);
    wait_until_ready(&scheduler).await;
    let renderer = scheduler.current_renderer().unwrap();
    let page = renderer.render_page(0).unwrap();
    assert_eq!((page.width(), page.height()), (40, 60));

    // Deleting removes the archive copy; viewing it again fails to open
    scheduler.clear();
    store.delete_document(entries[1].id).unwrap();
    let result = scheduler.view_document(&receipt, |_| {});
    assert!(matches!(result, Err(RenderError::Open { .. })));
    assert_eq!(scheduler.state(), ViewState::Idle);

    // A fresh store sees the same archive
    let expected = store.archive().clone();
    store.shutdown();
    let reopened = ArchiveStore::open(&config, Arc::new(EventBus::new())).unwrap();
    assert_eq!(reopened.archive(), &expected);
    assert_eq!(reopened.list_all().len(), 1);
    assert_eq!(reopened.entries_with_tag("bank")[0].name, "statement.gif");

    assert!(log
        .drain()
        .iter()
        .any(|e| matches!(e, ArchiveEvent::DocumentDeleted(id) if *id == entries[1].id)));
}
