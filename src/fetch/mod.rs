//! Paginated fetch accumulation - drain a paged data source page by page.
//!
//! The accumulator owns only the offset arithmetic and the termination rule;
//! authentication, retries and transport belong to the [`PageSource`]
//! implementation. Pages within one fetch are strictly sequential so the
//! upstream API's rate limits are never hit by parallel page requests.

use serde_json::{json, Value};
use tracing::info;

/// Offset/limit state for one paged fetch. The offset only ever increases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub offset: u64,
    pub limit: usize,
}

impl PageCursor {
    pub fn new(limit: usize) -> Self {
        PageCursor { offset: 0, limit }
    }

    pub fn advance(&mut self) {
        self.offset += self.limit as u64;
    }
}

/// One logical request to a paged endpoint, minus the cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub endpoint: String,
    pub params: Vec<(String, String)>,
    /// Optional JSON body for search-style endpoints.
    pub body: Option<Value>,
}

impl PageRequest {
    pub fn new(endpoint: impl Into<String>) -> Self {
        PageRequest {
            endpoint: endpoint.into(),
            params: Vec::new(),
            body: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Filter on a change-data-capture field within `[start, end]`, sorted
    /// ascending on that field so page boundaries stay stable between calls.
    pub fn with_cdc_window(mut self, cdc_field: &str, start: &str, end: &str) -> Self {
        self.body = Some(json!({
            "filterCriteria": [{
                "field": cdc_field,
                "operator": "BETWEEN",
                "value": start,
                "secondValue": end,
            }],
            "sortingCriteria": {
                "field": cdc_field,
                "order": "ASC",
            },
        }));
        self
    }

    /// Drop the sorting criteria; some search endpoints reject them.
    pub fn without_sorting(mut self) -> Self {
        if let Some(Value::Object(body)) = &mut self.body {
            body.remove("sortingCriteria");
        }
        self
    }
}

/// A paged data source. Implementations return at most `cursor.limit`
/// records per call and surface transport failures through their own error
/// type, which the accumulator propagates unchanged - no catching, no
/// retrying here.
pub trait PageSource {
    type Error;

    fn fetch_page(&mut self, request: &PageRequest, cursor: &PageCursor)
        -> Result<Vec<Value>, Self::Error>;
}

/// Fetch every page of `request`, concatenating results in page order.
///
/// Terminates the first time a page holds strictly fewer records than
/// `page_size` - including zero - and on no other signal; no total-count
/// metadata is trusted. No deduplication is performed: the source's
/// pagination is trusted not to overlap.
pub fn fetch_all<S: PageSource>(
    source: &mut S,
    request: &PageRequest,
    page_size: usize,
) -> Result<Vec<Value>, S::Error> {
    let mut cursor = PageCursor::new(page_size);
    let mut accumulated = Vec::new();

    loop {
        let page = source.fetch_page(request, &cursor)?;
        let received = page.len();
        accumulated.extend(page);
        info!(
            endpoint = request.endpoint.as_str(),
            offset = cursor.offset,
            received,
            accumulated = accumulated.len(),
            "fetched page"
        );

        if received < page_size {
            break;
        }
        cursor.advance();
    }

    Ok(accumulated)
}

/// Run one full paginated fetch per segment value and concatenate the
/// results in segment order. Used for endpoints that must be queried once
/// per account type or account state.
pub fn fetch_all_segments<S, I, V>(
    source: &mut S,
    base: &PageRequest,
    segment_param: &str,
    segments: I,
    page_size: usize,
) -> Result<Vec<Value>, S::Error>
where
    S: PageSource,
    I: IntoIterator<Item = V>,
    V: Into<String>,
{
    let mut accumulated = Vec::new();
    for segment in segments {
        let segment = segment.into();
        info!(
            endpoint = base.endpoint.as_str(),
            segment = segment.as_str(),
            "fetching segment"
        );
        let request = base.clone().with_param(segment_param, segment);
        accumulated.extend(fetch_all(source, &request, page_size)?);
    }
    Ok(accumulated)
}
