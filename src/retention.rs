//! Retention: which artifacts to delete so only the newest N remain

use crate::destinations::BackupItem;

/// Keep only the `keep_only` most recent artifacts per destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub keep_only: i64,
}

impl RetentionPolicy {
    pub fn new(keep_only: i64) -> Self {
        Self { keep_only }
    }

    /// Pruning is disabled for non-positive counts
    pub fn is_enabled(&self) -> bool {
        self.keep_only > 0
    }

    /// Items to delete, oldest first
    ///
    /// Items are ordered by modification time; equal timestamps keep their
    /// listing order. When `keep_only` covers every item nothing is selected.
    pub fn select_for_deletion(&self, items: &[BackupItem]) -> Vec<BackupItem> {
        if !self.is_enabled() {
            return Vec::new();
        }

        let keep = usize::try_from(self.keep_only).unwrap_or(usize::MAX);
        if keep >= items.len() {
            return Vec::new();
        }

        let mut sorted = items.to_vec();
        sorted.sort_by_key(|item| item.modified);
        sorted.truncate(items.len() - keep);
        sorted
    }
}
