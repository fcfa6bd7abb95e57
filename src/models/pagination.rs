use serde::Serialize;

use crate::error::AppError;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 50;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + limit - 1) / limit
        };

        Self {
            current_page: page,
            total_pages,
            total,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

/// Validates page/limit query parameters and returns (page, limit, offset).
pub fn page_params(page: Option<i64>, limit: Option<i64>) -> Result<(i64, i64, i64), AppError> {
    let page = page.unwrap_or(1);
    if page < 1 {
        return Err(AppError::Validation(
            "Page must be a positive integer".to_string(),
        ));
    }

    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(AppError::Validation(
            "Limit must be between 1 and 50".to_string(),
        ));
    }

    Ok((page, limit, (page - 1) * limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_is_ceiling() {
        assert_eq!(Pagination::new(1, 10, 0).total_pages, 0);
        assert_eq!(Pagination::new(1, 10, 1).total_pages, 1);
        assert_eq!(Pagination::new(1, 10, 10).total_pages, 1);
        assert_eq!(Pagination::new(1, 10, 11).total_pages, 2);
        assert_eq!(Pagination::new(1, 3, 7).total_pages, 3);
    }

    #[test]
    fn has_next_false_only_on_last_page_or_empty() {
        let empty = Pagination::new(1, 10, 0);
        assert!(!empty.has_next);
        assert!(!empty.has_prev);

        let first = Pagination::new(1, 10, 25);
        assert!(first.has_next);
        assert!(!first.has_prev);

        let last = Pagination::new(3, 10, 25);
        assert!(!last.has_next);
        assert!(last.has_prev);
    }

    #[test]
    fn page_params_defaults_and_bounds() {
        assert_eq!(page_params(None, None).unwrap(), (1, 10, 0));
        assert_eq!(page_params(Some(3), Some(20)).unwrap(), (3, 20, 40));

        assert!(page_params(Some(0), None).is_err());
        assert!(page_params(None, Some(0)).is_err());
        assert!(page_params(None, Some(51)).is_err());
        assert!(page_params(None, Some(50)).is_ok());
    }
}
