//! Walks a vendor listing page by page, starting at a watermark.
//!
//! Two pagination styles are supported:
//! - [PaginationStyle::OffsetLimit]: the response carries a total `count`, the records and an
//!   optional `next` link. A zero count ends the walk, as does a missing `next`.
//! - [PaginationStyle::NextToken]: the response carries the records and an optional opaque token
//!   for the following page. An empty page ends the walk, even when it carries a token.
//!
//! The [Paginator] checks its cancellation token before each call and while the call is in
//! flight, so a stop request never waits for a slow vendor.

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{Error, Record, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationStyle {
    OffsetLimit { limit: usize },
    NextToken { max_results: usize },
}

/// One call to the vendor listing. `since` is inclusive.
#[derive(Debug, Clone, PartialEq)]
pub enum PageRequest {
    Offset {
        since: DateTime<Utc>,
        limit: usize,
        offset: u64,
        /// Link returned with the previous page, if any.
        next: Option<String>,
    },
    Token {
        since: DateTime<Utc>,
        max_results: usize,
        page_token: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageResponse {
    Offset {
        count: u64,
        results: Vec<Record>,
        next: Option<String>,
    },
    Token {
        items: Vec<Record>,
        next_page_token: Option<String>,
    },
}

/// Listing capability of a vendor.
///
/// Implementations return [Error::TransientFetch] for failures worth retrying on the next cycle,
/// [Error::MalformedResponse] for a body that could not be understood, and an empty page when
/// there is no data.
#[trait_variant::make(VendorClient: Send)]
pub trait LocalVendorClient {
    fn name(&self) -> &str;

    async fn list(&self, request: PageRequest) -> Result<PageResponse>;
}

pub struct Paginator<'a, C> {
    client: &'a C,
    since: DateTime<Utc>,
    style: PaginationStyle,
    cancel: CancellationToken,
    offset: u64,
    next: Option<String>,
    page_token: Option<String>,
    exhausted: bool,
}

impl<'a, C> Paginator<'a, C>
where
    C: VendorClient,
{
    pub fn new(
        client: &'a C,
        since: DateTime<Utc>,
        style: PaginationStyle,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            since,
            style,
            cancel,
            offset: 0,
            next: None,
            page_token: None,
            exhausted: false,
        }
    }

    /// Starts an offset walk at `offset` instead of the first record.
    pub fn resume_at(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Offset of the first record not yet returned.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns the next non-empty page, or `None` once the listing, or the walk, is over.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Record>>> {
        if self.exhausted {
            return Ok(None);
        }
        if self.cancel.is_cancelled() {
            debug!(vendor = self.client.name(), "Pagination cancelled");
            self.exhausted = true;
            return Ok(None);
        }

        let request = self.request();
        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(vendor = self.client.name(), "Pagination cancelled during fetch");
                self.exhausted = true;
                return Ok(None);
            }
            response = self.client.list(request) => response,
        };

        let response = match response {
            Ok(response) => response,
            Err(Error::MalformedResponse(reason)) => {
                warn!(vendor = self.client.name(), %reason, "Malformed page, ending pass");
                self.exhausted = true;
                return Ok(None);
            }
            Err(e) => {
                self.exhausted = true;
                return Err(e);
            }
        };

        Ok(self.accept(response))
    }

    fn request(&self) -> PageRequest {
        match self.style {
            PaginationStyle::OffsetLimit { limit } => PageRequest::Offset {
                since: self.since,
                limit,
                offset: self.offset,
                next: self.next.clone(),
            },
            PaginationStyle::NextToken { max_results } => PageRequest::Token {
                since: self.since,
                max_results,
                page_token: self.page_token.clone(),
            },
        }
    }

    fn accept(&mut self, response: PageResponse) -> Option<Vec<Record>> {
        match (self.style, response) {
            (PaginationStyle::OffsetLimit { .. }, PageResponse::Offset { count, results, next }) => {
                // an offset past the end still reports the total count
                if count == 0 || results.is_empty() {
                    self.exhausted = true;
                    return None;
                }
                self.offset += results.len() as u64;
                match next {
                    Some(next) => self.next = Some(next),
                    None => self.exhausted = true,
                }
                Some(results)
            }
            (PaginationStyle::NextToken { .. }, PageResponse::Token { items, next_page_token }) => {
                if items.is_empty() {
                    if let Some(token) = next_page_token {
                        warn!(
                            vendor = self.client.name(),
                            page_token = %token,
                            "Empty page with a next page token, ending pass"
                        );
                    }
                    self.exhausted = true;
                    return None;
                }
                match next_page_token {
                    Some(token) => self.page_token = Some(token),
                    None => self.exhausted = true,
                }
                Some(items)
            }
            (style, _) => {
                warn!(
                    vendor = self.client.name(),
                    ?style,
                    "Page does not match the pagination style, ending pass"
                );
                self.exhausted = true;
                None
            }
        }
    }
}
