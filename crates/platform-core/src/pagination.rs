//! Cursor-advance protocol for paged list endpoints
//!
//! List endpoints return one window of results together with a
//! [`Pagination`] describing the window after it. [`drain_all`] follows
//! those `next` windows one request at a time until the server reports
//! that no further results exist.
//!
//! Object listings page with opaque continuation tokens instead;
//! [`drain_tokens`] applies the same protocol to a [`TokenPageSource`].
//!
//! [`Pagination`]: crate::Pagination

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::{ListResponse, Result};

/// A data source that can return a single page of results
#[async_trait]
pub trait PageSource<T>: Send + Sync {
    /// Fetch one page
    ///
    /// `start` and `limit` are forwarded to the server as given; `None`
    /// leaves the choice to the server. A `limit` of zero is not treated
    /// specially.
    async fn fetch_page(&self, start: Option<u64>, limit: Option<u64>) -> Result<ListResponse<T>>;
}

/// Fetch every page of a listing and concatenate the items in response order
///
/// The first request carries no cursor. Each following request uses the
/// `start` and `limit` of the previous response's `next` page. Errors are
/// returned immediately; nothing is retried.
#[instrument(skip(source))]
pub async fn drain_all<T, S>(source: &S) -> Result<Vec<T>>
where
    T: Send,
    S: PageSource<T> + ?Sized,
{
    let mut response = source.fetch_page(None, None).await?;
    let mut items = std::mem::take(&mut response.items);
    let mut pages = 1usize;

    while let Some(next) = response.pagination.next {
        debug!(start = next.start, limit = next.limit, "Fetching next page");
        response = source.fetch_page(Some(next.start), Some(next.limit)).await?;
        items.append(&mut response.items);
        pages += 1;
    }

    debug!(pages, count = items.len(), "Drained listing");
    Ok(items)
}

/// One page of a token-paged listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPage<T> {
    pub items: Vec<T>,
    /// Token for the following page; `None` on the last page
    pub next_page_token: Option<String>,
}

/// A data source paged by opaque continuation tokens
#[async_trait]
pub trait TokenPageSource<T>: Send + Sync {
    async fn fetch_page(&self, page_token: Option<&str>) -> Result<TokenPage<T>>;
}

/// Fetch every page of a token-paged listing, in response order
pub async fn drain_tokens<T, S>(source: &S) -> Result<Vec<T>>
where
    T: Send,
    S: TokenPageSource<T> + ?Sized,
{
    let mut items = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = source.fetch_page(page_token.as_deref()).await?;
        items.extend(page.items);
        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    Ok(items)
}
