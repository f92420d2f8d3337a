//! Page windows over listings

use serde::{Deserialize, Serialize};

/// Requested page of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// One-based page number
    pub page: u32,
    /// Items per page
    pub per_page: u32,
}

impl Pagination {
    /// Normalize caller input: page at least 1, size defaulted and capped
    #[must_use]
    pub fn new(page: Option<u32>, per_page: Option<u32>, default_per_page: u32, max_per_page: u32) -> Self {
        let max = max_per_page.max(1);
        let per_page = match per_page {
            Some(0) | None => default_per_page,
            Some(size) => size,
        };
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.clamp(1, max),
        }
    }

    /// Number of items before this page
    #[must_use]
    pub fn offset(&self) -> usize {
        (self.page as usize - 1).saturating_mul(self.per_page as usize)
    }

    /// Slice of `items` that falls on this page
    #[must_use]
    pub fn window<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = self.offset().min(items.len());
        let end = start.saturating_add(self.per_page as usize).min(items.len());
        &items[start..end]
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None, 20, 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let page = Pagination::default();
        assert_eq!(page, Pagination { page: 1, per_page: 20 });
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn caps_and_floors() {
        assert_eq!(Pagination::new(Some(0), Some(500), 20, 100), Pagination { page: 1, per_page: 100 });
        assert_eq!(Pagination::new(Some(3), Some(0), 20, 100).per_page, 20);
    }

    #[test]
    fn windows() {
        let items: Vec<u32> = (0..45).collect();
        let third = Pagination::new(Some(3), Some(20), 20, 100);
        assert_eq!(third.window(&items), &items[40..45]);

        let beyond = Pagination::new(Some(9), Some(20), 20, 100);
        assert!(beyond.window(&items).is_empty());
    }
}
