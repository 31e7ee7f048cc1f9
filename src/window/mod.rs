//! Window and page identity.
//!
//! The scheduler needs just two things from the embedder's window layer: a
//! weak handle it can try to upgrade, and the identity of the page the
//! window currently encloses. [`HostWindow`] is that seam; [`Window`] is a
//! minimal concrete implementation for embedders (and tests) that do not
//! bring their own window type.
//!
//! Teardown is explicit: whoever owns a window calls
//! `JobManager::shutdown()` when closing it. The manager only ever holds the
//! weak back-reference, so an otherwise-unreferenced window stays
//! collectible even while external code keeps the manager alive.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

static NEXT_PAGE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_WINDOW_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one loaded page. Fresh per load, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId(u64);

impl PageId {
    /// Allocate a fresh page identity.
    pub fn next() -> Self {
        Self(NEXT_PAGE_ID.fetch_add(1, Ordering::SeqCst))
    }
}

/// Identity of one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(u64);

impl WindowId {
    /// Allocate a fresh window identity.
    pub fn next() -> Self {
        Self(NEXT_WINDOW_ID.fetch_add(1, Ordering::SeqCst))
    }
}

/// The window surface the scheduler depends on.
pub trait HostWindow: Send + Sync {
    /// The page this window currently encloses.
    fn enclosed_page(&self) -> PageId;
}

/// Minimal concrete window: an identity plus the currently enclosed page.
pub struct Window {
    id: WindowId,
    page: Mutex<PageId>,
}

impl Window {
    /// Open a window showing `page`.
    pub fn open(page: PageId) -> Self {
        Self {
            id: WindowId::next(),
            page: Mutex::new(page),
        }
    }

    /// This window's identity.
    pub fn id(&self) -> WindowId {
        self.id
    }

    /// Navigate: replace the enclosed page. Jobs scheduled against the old
    /// page stop being accepted by the scheduler's origin check.
    pub fn load_page(&self, page: PageId) {
        *self.page.lock().unwrap() = page;
    }
}

impl HostWindow for Window {
    fn enclosed_page(&self) -> PageId {
        *self.page.lock().unwrap()
    }
}
