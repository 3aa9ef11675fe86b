use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 { 1 }
fn default_per_page() -> u64 { 20 }

impl PaginationParams {
    /// Saturates at `i64::MAX` so a huge page number yields an empty page
    /// instead of a negative OFFSET.
    pub fn offset(&self) -> i64 {
        let skipped = (self.page.max(1) - 1).saturating_mul(self.limit() as u64);
        i64::try_from(skipped).unwrap_or(i64::MAX)
    }

    pub fn limit(&self) -> i64 {
        self.per_page.clamp(1, 100) as i64
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, per_page: 20 }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Paginated<T: Serialize> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl<T: Serialize> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, params: &PaginationParams) -> Self {
        let per_page = params.limit();
        let total_pages = if total <= 0 { 0 } else { (total + per_page - 1) / per_page };
        Self {
            items,
            total,
            page: params.page.max(1),
            per_page,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_zero_is_treated_as_first_page() {
        let params = PaginationParams { page: 0, per_page: 10 };
        assert_eq!(params.offset(), 0);
        let params = PaginationParams { page: 3, per_page: 10 };
        assert_eq!(params.offset(), 20);
    }

    #[test]
    fn huge_page_never_produces_a_negative_offset() {
        let params = PaginationParams { page: u64::MAX, per_page: 20 };
        assert_eq!(params.offset(), i64::MAX);
        let params = PaginationParams { page: u64::MAX / 50, per_page: 100 };
        assert!(params.offset() >= 0);
    }

    #[test]
    fn per_page_is_clamped() {
        assert_eq!(PaginationParams { page: 1, per_page: 500 }.limit(), 100);
        assert_eq!(PaginationParams { page: 1, per_page: 0 }.limit(), 1);
    }

    #[test]
    fn total_pages_rounds_up() {
        let params = PaginationParams { page: 1, per_page: 20 };
        let page = Paginated::new(vec![1, 2, 3], 41, &params);
        assert_eq!(page.total_pages, 3);
        let empty: Paginated<i32> = Paginated::new(vec![], 0, &params);
        assert_eq!(empty.total_pages, 0);
    }
}
