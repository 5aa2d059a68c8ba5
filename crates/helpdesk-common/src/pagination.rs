use serde::{Deserialize, Serialize};

/// A 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub per_page: i64,
}

impl PageRequest {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self { page, per_page }
    }

    /// Number of rows to skip before this page starts. Saturates for pages
    /// far past the end.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

/// Pagination block returned in `meta.pagination` by every list endpoint.
///
/// `from` and `to` are 1-based row positions of the first and last item on
/// the page, or `null` when the page is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub current_page: i64,
    pub per_page: i64,
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub total: i64,
    pub last_page: i64,
}

impl Pagination {
    pub fn compute(request: PageRequest, total: i64, item_count: usize) -> Self {
        let item_count = item_count as i64;
        let per_page = request.per_page.max(1);
        let last_page = if total == 0 {
            1
        } else {
            (total - 1) / per_page + 1
        };
        let (from, to) = if item_count == 0 {
            (None, None)
        } else {
            let from = request.offset().saturating_add(1);
            (Some(from), Some(from.saturating_add(item_count - 1)))
        };
        Self {
            current_page: request.page,
            per_page: request.per_page,
            from,
            to,
            total,
            last_page,
        }
    }
}

/// One page of items together with its pagination block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: i64) -> Self {
        let pagination = Pagination::compute(request, total, items.len());
        Self { items, pagination }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_is_zero_on_first_page() {
        assert_eq!(PageRequest::new(1, 10).offset(), 0);
        assert_eq!(PageRequest::new(3, 25).offset(), 50);
    }

    #[test]
    fn test_full_page() {
        let p = Pagination::compute(PageRequest::new(1, 10), 23, 10);
        assert_eq!(p.from, Some(1));
        assert_eq!(p.to, Some(10));
        assert_eq!(p.total, 23);
        assert_eq!(p.last_page, 3);
    }

    #[test]
    fn test_last_page_is_partial() {
        let p = Pagination::compute(PageRequest::new(3, 10), 23, 3);
        assert_eq!(p.current_page, 3);
        assert_eq!(p.from, Some(21));
        assert_eq!(p.to, Some(23));
    }

    #[test]
    fn test_empty_result_has_one_page_and_no_bounds() {
        let p = Pagination::compute(PageRequest::new(1, 10), 0, 0);
        assert_eq!(p.last_page, 1);
        assert_eq!(p.from, None);
        assert_eq!(p.to, None);
    }

    #[test]
    fn test_page_past_the_end() {
        let p = Pagination::compute(PageRequest::new(9, 10), 15, 0);
        assert_eq!(p.last_page, 2);
        assert_eq!(p.from, None);
        assert_eq!(p.to, None);
    }

    #[test]
    fn test_exact_multiple_of_page_size() {
        let p = Pagination::compute(PageRequest::new(2, 5), 10, 5);
        assert_eq!(p.last_page, 2);
        assert_eq!(p.to, Some(10));
    }

    #[test]
    fn test_huge_page_does_not_overflow() {
        let request = PageRequest::new(i64::MAX, 100);
        assert_eq!(request.offset(), i64::MAX);
        let p = Pagination::compute(request, 3, 0);
        assert_eq!(p.current_page, i64::MAX);
        assert_eq!(p.from, None);
        assert_eq!(p.last_page, 1);
    }

    #[test]
    fn test_non_positive_page_size_is_treated_as_one() {
        let p = Pagination::compute(PageRequest::new(1, 0), 3, 0);
        assert_eq!(p.last_page, 3);
    }

    #[test]
    fn test_page_map_keeps_pagination() {
        let page = Page::new(vec![1, 2, 3], PageRequest::new(1, 3), 7);
        let mapped = page.map(|n| n * 10);
        assert_eq!(mapped.items, vec![10, 20, 30]);
        assert_eq!(mapped.pagination.last_page, 3);
    }
}
