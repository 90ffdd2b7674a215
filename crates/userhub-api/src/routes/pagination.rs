//! Listing parameters and page links

use axum::http::Uri;
use serde::Serialize;
use url::form_urlencoded;
use userhub_db::SortField;

use crate::error::{ApiError, FieldError};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_ITEMS_PER_PAGE: u32 = 25;
pub const MAX_ITEMS_PER_PAGE: u32 = 100;

/// Validated page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub items_per_page: u32,
}

impl PageRequest {
    pub fn from_query(page: Option<u32>, items_per_page: Option<u32>) -> Result<Self, ApiError> {
        let page = page.unwrap_or(DEFAULT_PAGE);
        let items_per_page = items_per_page.unwrap_or(DEFAULT_ITEMS_PER_PAGE);

        let mut errors = Vec::new();
        if page < 1 {
            errors.push(FieldError::new("page must be at least 1", &["page"]));
        }
        if !(1..=MAX_ITEMS_PER_PAGE).contains(&items_per_page) {
            errors.push(FieldError::new(
                format!("itemsPerPage must be between 1 and {}", MAX_ITEMS_PER_PAGE),
                &["itemsPerPage"],
            ));
        }
        if !errors.is_empty() {
            return Err(ApiError::validation("Request validation failed", errors));
        }

        Ok(Self {
            page,
            items_per_page,
        })
    }

    /// Last page number for `total` items; never below 1
    pub fn last_page(&self, total: i64) -> u32 {
        let total = total.max(0) as u64;
        let per_page = u64::from(self.items_per_page);
        (total.div_ceil(per_page).max(1)).min(u64::from(u32::MAX)) as u32
    }
}

/// Parse a `sortBy` value such as `last_name,-created_at`
pub fn parse_sort_by(sort_by: Option<&str>) -> Result<Vec<SortField>, ApiError> {
    let Some(sort_by) = sort_by else {
        return Ok(Vec::new());
    };

    sort_by
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<SortField>().map_err(|e| {
                ApiError::validation(
                    "Request validation failed",
                    vec![FieldError::new(e, &["sortBy"])],
                )
            })
        })
        .collect()
}

/// Links for the `x-page-links` header
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PageLinks {
    pub first: String,
    pub last: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
}

impl PageLinks {
    /// Build links by rewriting the `page` parameter of the request URI
    pub fn build(uri: &Uri, request: PageRequest, total: i64) -> Self {
        let last = request.last_page(total);
        let link = |page: u32| page_link(uri, page);

        PageLinks {
            first: link(1),
            last: link(last),
            next: (request.page < last).then(|| link(request.page + 1)),
            prev: (request.page > 1).then(|| link((request.page - 1).min(last))),
        }
    }
}

fn page_link(uri: &Uri, page: u32) -> String {
    let query = uri.query().unwrap_or_default();
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if key != "page" {
            serializer.append_pair(&key, &value);
        }
    }
    serializer.append_pair("page", &page.to_string());

    format!("{}?{}", uri.path(), serializer.finish())
}
