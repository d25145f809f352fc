use serde::{Deserialize, Serialize};

use crate::config;

/// Page request as received in query strings (`?page=2&per_page=50`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageParams {
    /// 1-based page number
    pub fn page(&self) -> u32 {
        self.page.filter(|p| *p > 0).unwrap_or(1)
    }

    /// Page size clamped to the configured bounds
    pub fn per_page(&self) -> u32 {
        let api = &config::config().api;
        clamp_page_size(self.per_page, api.default_page_size, api.max_page_size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page())
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page() - 1) * self.limit()
    }
}

fn clamp_page_size(requested: Option<u32>, default: u32, max: u32) -> u32 {
    match requested {
        Some(0) | None => default,
        Some(n) => n.min(max),
    }
}

/// One page of results plus the totals the dashboard needs for its pager
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, params: &PageParams) -> Self {
        let per_page = params.per_page();
        let total_pages = if total <= 0 {
            0
        } else {
            ((total as u64).div_ceil(u64::from(per_page))) as u32
        };

        Self {
            items,
            total,
            page: params.page(),
            per_page,
            total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_clamped() {
        assert_eq!(clamp_page_size(None, 50, 200), 50);
        assert_eq!(clamp_page_size(Some(0), 50, 200), 50);
        assert_eq!(clamp_page_size(Some(10), 50, 200), 10);
        assert_eq!(clamp_page_size(Some(5000), 50, 200), 200);
    }

    #[test]
    fn zero_page_means_first_page() {
        let params = PageParams { page: Some(0), per_page: Some(10) };
        assert_eq!(params.page(), 1);
        assert_eq!(params.offset(), 0);

        let params = PageParams { page: Some(3), per_page: Some(10) };
        assert_eq!(params.offset(), 20);
    }

    #[test]
    fn total_pages_rounds_up() {
        let params = PageParams { page: Some(1), per_page: Some(10) };
        let page = Page::new(vec![1, 2, 3], 21, &params);
        assert_eq!(page.total_pages, 3);

        let empty: Page<i32> = Page::new(vec![], 0, &params);
        assert_eq!(empty.total_pages, 0);
    }
}
