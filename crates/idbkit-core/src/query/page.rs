use serde::Serialize;

/// One page of a query plus the size of the whole result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number.
    pub page_number: usize,
    pub page_size: usize,
    /// Items in the whole sequence, not just this page.
    pub total_count: usize,
}

impl<T> Page<T> {
    pub fn page_count(&self) -> usize {
        if self.page_size == 0 {
            0
        } else {
            self.total_count.div_ceil(self.page_size)
        }
    }

    pub fn has_next(&self) -> bool {
        self.page_number < self.page_count()
    }

    pub fn has_previous(&self) -> bool {
        self.page_number > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(page_number: usize, page_size: usize, total_count: usize) -> Page<u8> {
        Page {
            items: Vec::new(),
            page_number,
            page_size,
            total_count,
        }
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page(1, 10, 25).page_count(), 3);
        assert_eq!(page(1, 10, 30).page_count(), 3);
        assert_eq!(page(1, 10, 0).page_count(), 0);
        assert_eq!(page(1, 0, 25).page_count(), 0);
    }

    #[test]
    fn test_navigation() {
        assert!(page(2, 10, 25).has_next());
        assert!(!page(3, 10, 25).has_next());
        assert!(page(2, 10, 25).has_previous());
        assert!(!page(1, 10, 25).has_previous());
    }
}
