use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema, IntoParams)]
pub struct PaginationParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl PaginationParams {
    /// 1-based page number.
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    /// Zero-based page index, as sea-orm's paginator expects it.
    pub fn page_index(&self) -> u64 {
        self.page() - 1
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, params: &PaginationParams, total: u64) -> Self {
        let page_size = params.page_size();
        Self {
            items,
            page: params.page(),
            page_size,
            total,
            total_pages: total.div_ceil(page_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_clamps() {
        let p = PaginationParams::default();
        assert_eq!(p.page(), 1);
        assert_eq!(p.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(p.page_index(), 0);

        let p = PaginationParams {
            page: Some(0),
            page_size: Some(10_000),
        };
        assert_eq!(p.page(), 1);
        assert_eq!(p.page_size(), MAX_PAGE_SIZE);
    }

    #[test]
    fn total_pages_rounds_up() {
        let p = PaginationParams {
            page: Some(2),
            page_size: Some(20),
        };
        let resp = PaginatedResponse::new(vec![1, 2, 3], &p, 41);
        assert_eq!(resp.total_pages, 3);
        assert_eq!(resp.page, 2);

        let empty: PaginatedResponse<i32> = PaginatedResponse::new(vec![], &p, 0);
        assert_eq!(empty.total_pages, 0);
    }
}
