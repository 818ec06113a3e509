//! Preferences Window
//!
//! The host's settings window is an ordered list of pages. Plugins add a page
//! when enabled and remove it when disabled; the window fires `show` when a
//! page becomes visible and `apply`/`ok` when the user commits edits.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{HostError, HostResult};

// ─────────────────────────────────────────────────────────────────────────────
// Page Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A page embedded in the preferences window
#[async_trait]
pub trait PreferencesPage: Send + Sync + 'static {
    /// Title shown in the page list; unique within the window
    fn title(&self) -> &str;

    /// Called when the page becomes visible
    async fn on_show(&self) -> HostResult<()>;

    /// Called when the user applies the preferences
    async fn on_apply(&self) -> HostResult<()>;

    /// Called when the user confirms and closes the window
    async fn on_ok(&self) -> HostResult<()> {
        self.on_apply().await
    }

    /// Called once the page has been removed from the window
    fn on_destroy(&self) {}
}

/// Shared reference to a page
pub type PageRef = Arc<dyn PreferencesPage>;

// ─────────────────────────────────────────────────────────────────────────────
// Preferences
// ─────────────────────────────────────────────────────────────────────────────

/// The preferences window page container
#[derive(Default)]
pub struct Preferences {
    pages: RwLock<Vec<PageRef>>,
}

impl Preferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a page, returning the stored reference
    pub fn add_page(&self, page: PageRef) -> HostResult<PageRef> {
        let mut pages = self.pages.write();

        if pages.iter().any(|p| p.title() == page.title()) {
            return Err(HostError::PageExists(page.title().to_string()));
        }

        tracing::debug!(title = page.title(), "Added preferences page");
        pages.push(Arc::clone(&page));
        Ok(page)
    }

    /// Remove a page by title and destroy it
    pub fn remove_page(&self, title: &str) -> HostResult<()> {
        let removed = {
            let mut pages = self.pages.write();
            let index = pages
                .iter()
                .position(|p| p.title() == title)
                .ok_or_else(|| HostError::PageNotFound(title.to_string()))?;
            pages.remove(index)
        };

        removed.on_destroy();
        tracing::debug!(title, "Removed preferences page");
        Ok(())
    }

    /// Get a page by title
    pub fn page(&self, title: &str) -> Option<PageRef> {
        self.pages.read().iter().find(|p| p.title() == title).cloned()
    }

    /// Page titles in display order
    pub fn titles(&self) -> Vec<String> {
        self.pages.read().iter().map(|p| p.title().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.pages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.read().is_empty()
    }

    /// Make a page visible, firing its show hook
    pub async fn show(&self, title: &str) -> HostResult<()> {
        let page = self
            .page(title)
            .ok_or_else(|| HostError::PageNotFound(title.to_string()))?;
        page.on_show().await
    }

    /// Apply every page; all pages run, the first error is returned
    pub async fn apply(&self) -> HostResult<()> {
        let mut first_error = None;
        for page in self.snapshot() {
            if let Err(e) = page.on_apply().await {
                tracing::warn!(title = page.title(), error = %e, "Failed to apply page");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Confirm every page; all pages run, the first error is returned
    pub async fn ok(&self) -> HostResult<()> {
        let mut first_error = None;
        for page in self.snapshot() {
            if let Err(e) = page.on_ok().await {
                tracing::warn!(title = page.title(), error = %e, "Failed to confirm page");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    // Pages are cloned out so no lock is held across page hooks
    fn snapshot(&self) -> Vec<PageRef> {
        self.pages.read().clone()
    }
}
