use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Wire format of every timestamp in API responses.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Serde helper rendering a UTC timestamp as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn serialize_timestamp<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&dt.format(TIMESTAMP_FORMAT))
}

/// Pagination metadata included in list responses.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PageMeta {
    /// Current page number (1-based).
    #[schema(example = 1)]
    pub page: u64,
    /// Number of items per page.
    #[schema(example = 20)]
    pub per_page: u64,
    /// Total number of pages.
    #[schema(example = 3)]
    pub pages: u64,
    /// Total number of matching items across all pages.
    #[schema(example = 47)]
    pub total: u64,
    #[schema(example = "/api/v1/builds?page=1&per_page=20")]
    pub first: String,
    #[schema(example = "/api/v1/builds?page=3&per_page=20")]
    pub last: String,
    /// Link to the next page, null on the last page.
    #[schema(example = "/api/v1/builds?page=2&per_page=20")]
    pub next: Option<String>,
    /// Link to the previous page, null on the first page.
    pub previous: Option<String>,
}

impl PageMeta {
    /// Build the metadata for one page of `total` items.
    ///
    /// `base` is the collection URL without a query string and `filters` the
    /// active query parameters, which every link carries along.
    pub fn new(base: &str, filters: &[(&str, String)], page: u64, per_page: u64, total: u64) -> Self {
        let pages = total.div_ceil(per_page);
        let last_page = pages.max(1);
        let link = |p: u64| page_link(base, filters, p, per_page);

        Self {
            page,
            per_page,
            pages,
            total,
            first: link(1),
            last: link(last_page),
            next: (page < pages).then(|| link(page + 1)),
            // Past the end, step back onto the last real page.
            previous: (page > 1).then(|| link((page - 1).min(last_page))),
        }
    }
}

/// Render one pagination link.
///
/// Filter values reaching this point are validated tokens (state names,
/// booleans), so they are emitted without further escaping.
pub fn page_link(base: &str, filters: &[(&str, String)], page: u64, per_page: u64) -> String {
    let mut url = format!("{base}?page={page}&per_page={per_page}");
    for (key, value) in filters {
        url.push('&');
        url.push_str(key);
        url.push('=');
        url.push_str(value);
    }
    url
}
