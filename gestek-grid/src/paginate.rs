//! Pagination Slicer

use serde::Serialize;

/// One page of rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub page: usize,
    pub total_pages: usize,
    pub total_rows: usize,
}

/// `max(1, ceil(len / page_size))`; a zero page size counts as 1.
pub fn total_pages(len: usize, page_size: usize) -> usize {
    len.div_ceil(page_size.max(1)).max(1)
}

/// Clamp a requested page into `[1, total_pages]`.
pub fn clamp_page(page: usize, total_pages: usize) -> usize {
    page.clamp(1, total_pages.max(1))
}

/// Slice `rows` to the 1-based `page`.
///
/// No clamping: page 0 or a page past the end yields an empty slice.
pub fn paginate<T: Clone>(rows: &[T], page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total = total_pages(rows.len(), page_size);
    let slice = match page.checked_sub(1) {
        Some(index) => {
            let start = index.saturating_mul(page_size).min(rows.len());
            let end = start.saturating_add(page_size).min(rows.len());
            rows[start..end].to_vec()
        }
        None => Vec::new(),
    };
    Page {
        rows: slice,
        page,
        total_pages: total,
        total_rows: rows.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_partial_page() {
        let rows: Vec<usize> = (1..=23).collect();
        let page = paginate(&rows, 3, 10);
        assert_eq!(page.rows, vec![21, 22, 23]);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn test_empty_rows_have_one_page() {
        let rows: Vec<usize> = Vec::new();
        let page = paginate(&rows, 1, 10);
        assert!(page.rows.is_empty());
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn test_out_of_range_pages_are_empty() {
        let rows: Vec<usize> = (1..=5).collect();
        assert!(paginate(&rows, 0, 2).rows.is_empty());
        assert!(paginate(&rows, 9, 2).rows.is_empty());
        assert_eq!(paginate(&rows, usize::MAX, 2).rows, Vec::<usize>::new());
    }

    #[test]
    fn test_clamp_page() {
        assert_eq!(clamp_page(0, 3), 1);
        assert_eq!(clamp_page(7, 3), 3);
        assert_eq!(clamp_page(2, 0), 1);
    }
}
