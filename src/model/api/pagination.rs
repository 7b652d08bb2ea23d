use serde::{Deserialize, Serialize};

/// Largest page a client may ask for.
pub const MAX_PAGE_SIZE: usize = 500;

/// The `page_num` and `page_size` query parameters of a list request.
/// Pages are numbered from 1.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromForm, UriDisplayQuery)]
pub struct PaginationRequest {
    #[field(default = 1, validate = range(1..))]
    pub page_num: usize,
    #[field(default = 50, validate = range(1..=MAX_PAGE_SIZE as isize))]
    pub page_size: usize,
}

impl Default for PaginationRequest {
    fn default() -> Self {
        Self {
            page_num: 1,
            page_size: 50,
        }
    }
}

impl PaginationRequest {
    /// Number of items before the requested page.
    pub fn skip(&self) -> usize {
        self.page_num.saturating_sub(1).saturating_mul(self.page_size)
    }

    /// Cut the requested page out of a complete, already ordered list.
    /// Pages past the end are empty.
    pub fn paginate<T>(&self, items: Vec<T>) -> Paginated<T> {
        let total = items.len();
        let items = items
            .into_iter()
            .skip(self.skip())
            .take(self.page_size)
            .collect();
        Paginated {
            pagination: PaginationResult {
                page_num: self.page_num,
                page_size: self.page_size,
                total,
            },
            items,
        }
    }
}

/// Where a page sits in the whole list.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationResult {
    pub page_num: usize,
    pub page_size: usize,
    /// Length of the whole list.
    pub total: usize,
}

/// One page of a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub pagination: PaginationResult,
    pub items: Vec<T>,
}
