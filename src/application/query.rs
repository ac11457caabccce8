//! Listing query composition and paginated fetches.
//!
//! Filter state is merged into the listings URL when a fresh query starts.
//! Cursor links issued by the server are treated as opaque: under the
//! default policy they are followed byte-for-byte.

use std::sync::Arc;

use url::form_urlencoded;

use crate::domain::{
    AppConfig, Cursor, CursorPolicy, FilterState, Listing, MarketApi, Page, Result,
};

use super::retry::{retry_with_backoff, RetryPolicy};

/// Listings endpoint, relative to the API base URL.
pub const LISTINGS_PATH: &str = "/api/listings/";

/// Splits `url` into the part before `?` and the query string, if any.
#[must_use]
pub fn split_url(url: &str) -> (&str, Option<&str>) {
    match url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (url, None),
    }
}

/// Merge filter state into an existing query string.
///
/// Parameters already in `existing_query` keep their order. A filter whose
/// key is already present replaces the first occurrence and drops any
/// duplicates; other filters are appended. Applying the function to its own
/// output with the same filters returns the same URL.
#[must_use]
pub fn build_query(base_url: &str, existing_query: Option<&str>, filters: &FilterState) -> String {
    let mut pairs = parse_pairs(existing_query);
    for (key, value) in filters.query_pairs() {
        set_param(&mut pairs, key, value);
    }
    join_url(base_url, &pairs)
}

/// Layer only the filter keys that `url`'s query does not already carry.
///
/// The existing query text is kept byte-for-byte and the missing pairs are
/// appended after it. Returns `url` unchanged when nothing is missing.
#[must_use]
pub fn fill_missing(url: &str, filters: &FilterState) -> String {
    let (_, query) = split_url(url);
    let present = parse_pairs(query);

    let mut extra = form_urlencoded::Serializer::new(String::new());
    let mut added = false;
    for (key, value) in filters.query_pairs() {
        if !present.iter().any(|(k, _)| k == key) {
            extra.append_pair(key, &value);
            added = true;
        }
    }
    if !added {
        return url.to_string();
    }

    let separator = match query {
        None => "?",
        Some(q) if q.is_empty() || q.ends_with('&') => "",
        Some(_) => "&",
    };
    format!("{url}{separator}{}", extra.finish())
}

fn parse_pairs(query: Option<&str>) -> Vec<(String, String)> {
    query
        .map(|q| q.trim_start_matches('?'))
        .filter(|q| !q.is_empty())
        .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

fn set_param(pairs: &mut Vec<(String, String)>, key: &str, value: String) {
    let Some(index) = pairs.iter().position(|(k, _)| k == key) else {
        pairs.push((key.to_string(), value));
        return;
    };

    pairs[index].1 = value;
    let mut seen_first = false;
    pairs.retain(|(k, _)| {
        if k != key {
            return true;
        }
        let keep = !seen_first;
        seen_first = true;
        keep
    });
}

fn join_url(base_url: &str, pairs: &[(String, String)]) -> String {
    if pairs.is_empty() {
        return base_url.to_string();
    }
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    format!("{base_url}?{query}")
}

/// What page of listings to load.
#[derive(Debug, Clone, PartialEq)]
pub enum PageRequest {
    /// First page of the listings feed under the given filters.
    Fresh { filters: FilterState },
    /// First page of one seller's listings.
    ByAuthor { author_id: u64, filters: FilterState },
    /// A `next`/`previous` link from an earlier page. `filters` is the
    /// current filter state, consulted only under
    /// [`CursorPolicy::FillMissing`].
    Follow { cursor: Cursor, filters: FilterState },
}

/// Builds listing URLs and fetches pages through the retry wrapper.
pub struct QueryComposer {
    api: Arc<dyn MarketApi>,
    retry: RetryPolicy,
    cursor_policy: CursorPolicy,
}

impl QueryComposer {
    #[must_use]
    pub fn new(api: Arc<dyn MarketApi>, retry: RetryPolicy, cursor_policy: CursorPolicy) -> Self {
        Self {
            api,
            retry,
            cursor_policy,
        }
    }

    #[must_use]
    pub fn from_config(api: Arc<dyn MarketApi>, config: &AppConfig) -> Self {
        Self::new(
            api,
            RetryPolicy::from_config(&config.retry),
            config.query.cursor_policy,
        )
    }

    /// The URL a request resolves to.
    #[must_use]
    pub fn url_for(&self, request: &PageRequest) -> String {
        match request {
            PageRequest::Fresh { filters } => build_query(LISTINGS_PATH, None, filters),
            PageRequest::ByAuthor { author_id, filters } => {
                let existing = format!("author_id={author_id}");
                build_query(LISTINGS_PATH, Some(&existing), filters)
            }
            PageRequest::Follow { cursor, filters } => match self.cursor_policy {
                CursorPolicy::Authoritative => cursor.as_str().to_string(),
                CursorPolicy::FillMissing => fill_missing(cursor.as_str(), filters),
            },
        }
    }

    /// Resolve and fetch a page.
    ///
    /// # Errors
    /// Returns the error left after retries; never a partial page.
    pub async fn fetch(&self, request: &PageRequest) -> Result<Page<Listing>> {
        let url = self.url_for(request);
        self.fetch_page(&url).await
    }

    /// Fetch one page from `url`.
    ///
    /// # Errors
    /// Returns the error left after retries; never a partial page.
    pub async fn fetch_page(&self, url: &str) -> Result<Page<Listing>> {
        tracing::debug!(url, "Fetching listings page");
        let page = retry_with_backoff(&self.retry, || self.api.fetch_listings(url)).await?;
        tracing::debug!(
            items = page.items.len(),
            has_next = page.next.is_some(),
            has_previous = page.previous.is_some(),
            "Listings page loaded"
        );
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{sample_listing, FakeMarket};
    use crate::domain::{AppError, Condition, SortOption};
    use std::collections::HashSet;
    use std::time::Duration;

    fn query_keys(url: &str) -> Vec<String> {
        let (_, query) = split_url(url);
        parse_pairs(query).into_iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn test_min_price_and_condition() {
        let filters = FilterState::default()
            .with_min_price(10.0)
            .with_condition(Condition::Fair);

        let url = build_query(LISTINGS_PATH, None, &filters);

        let (base, query) = split_url(&url);
        assert_eq!(base, "/api/listings/");
        let pairs: HashSet<(String, String)> = parse_pairs(query).into_iter().collect();
        let expected: HashSet<(String, String)> = [
            ("min_price".to_string(), "10".to_string()),
            ("condition".to_string(), "Fair".to_string()),
        ]
        .into_iter()
        .collect();
        assert_eq!(pairs, expected);
        assert_eq!(url, "/api/listings/?min_price=10&condition=Fair");
    }

    #[test]
    fn test_build_query_is_idempotent() {
        let filters = FilterState::default()
            .with_search("desk lamp")
            .with_max_price(25.5)
            .with_condition(Condition::FactoryNew)
            .with_sort(SortOption::PriceDesc);

        let once = build_query(LISTINGS_PATH, Some("page=2"), &filters);
        let (base, query) = split_url(&once);
        let twice = build_query(base, query, &filters);

        assert_eq!(once, twice);
        let keys = query_keys(&twice);
        let unique: HashSet<&String> = keys.iter().collect();
        assert_eq!(keys.len(), unique.len());
    }

    #[test]
    fn test_filter_overrides_existing_key_in_place() {
        let filters = FilterState::default().with_search("bike");
        let url = build_query(
            LISTINGS_PATH,
            Some("search=old&cursor=cD0y&search=older"),
            &filters,
        );
        assert_eq!(url, "/api/listings/?search=bike&cursor=cD0y");
    }

    #[test]
    fn test_existing_params_survive_without_filters() {
        let url = build_query(LISTINGS_PATH, Some("author_id=4"), &FilterState::default());
        assert_eq!(url, "/api/listings/?author_id=4");
        assert_eq!(
            build_query(LISTINGS_PATH, None, &FilterState::default()),
            LISTINGS_PATH
        );
    }

    #[test]
    fn test_build_query_does_not_mutate_filters() {
        let filters = FilterState::default().with_search("chair");
        let snapshot = filters.clone();
        let _ = build_query(LISTINGS_PATH, Some("search=x"), &filters);
        assert_eq!(filters, snapshot);
    }

    #[test]
    fn test_authoritative_cursor_passes_through() {
        let composer = QueryComposer::new(
            Arc::new(FakeMarket::default()),
            RetryPolicy::no_retry(),
            CursorPolicy::Authoritative,
        );
        let cursor = Cursor::new("http://api.test/api/listings/?cursor=cD0yMDI0&search=old");
        let request = PageRequest::Follow {
            cursor: cursor.clone(),
            filters: FilterState::default().with_search("new").with_min_price(5.0),
        };
        assert_eq!(composer.url_for(&request), cursor.as_str());
    }

    #[test]
    fn test_fill_missing_keeps_cursor_params() {
        let composer = QueryComposer::new(
            Arc::new(FakeMarket::default()),
            RetryPolicy::no_retry(),
            CursorPolicy::FillMissing,
        );
        let request = PageRequest::Follow {
            cursor: Cursor::new("/api/listings/?cursor=abc&search=old"),
            filters: FilterState::default().with_search("new").with_min_price(5.0),
        };
        assert_eq!(
            composer.url_for(&request),
            "/api/listings/?cursor=abc&search=old&min_price=5"
        );

        let untouched = "/api/listings/?cursor=a%2Bb&search=old";
        assert_eq!(
            fill_missing(untouched, &FilterState::default().with_search("new")),
            untouched
        );
    }

    #[test]
    fn test_fill_missing_preserves_cursor_encoding() {
        let filters = FilterState::default().with_min_price(5.0);
        assert_eq!(
            fill_missing("/api/listings/?cursor=a%2Bb&search=desk%20lamp", &filters),
            "/api/listings/?cursor=a%2Bb&search=desk%20lamp&min_price=5"
        );
        assert_eq!(
            fill_missing("/api/listings/", &filters.clone().with_search("desk lamp")),
            "/api/listings/?search=desk+lamp&min_price=5"
        );
        assert_eq!(
            fill_missing("/api/listings/?", &filters),
            "/api/listings/?min_price=5"
        );
    }

    #[test]
    fn test_by_author_request() {
        let composer = QueryComposer::new(
            Arc::new(FakeMarket::default()),
            RetryPolicy::no_retry(),
            CursorPolicy::Authoritative,
        );
        let request = PageRequest::ByAuthor {
            author_id: 9,
            filters: FilterState::default().with_sort(SortOption::Newest),
        };
        assert_eq!(
            composer.url_for(&request),
            "/api/listings/?author_id=9&ordering=-created_at"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_page_retries_unavailable() {
        let market = Arc::new(FakeMarket::default());
        market.push_listings(Err(AppError::from_status(503, "busy")));
        market.push_listings(Ok(Page {
            items: vec![sample_listing(1)],
            next: Some(Cursor::new("/api/listings/?cursor=n")),
            previous: None,
        }));
        let composer = QueryComposer::new(
            Arc::clone(&market) as Arc<dyn MarketApi>,
            RetryPolicy::new(3, Duration::from_millis(500), 2.0),
            CursorPolicy::Authoritative,
        );

        let page = composer
            .fetch(&PageRequest::Fresh {
                filters: FilterState::default().with_condition(Condition::Fair),
            })
            .await
            .unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.next.unwrap().as_str(), "/api/listings/?cursor=n");
        assert_eq!(
            market.requested_urls(),
            vec!["/api/listings/?condition=Fair"; 2]
        );
    }

    #[tokio::test]
    async fn test_fetch_page_surfaces_client_error() {
        let market = Arc::new(FakeMarket::default());
        market.push_listings(Err(AppError::from_status(400, "bad ordering")));
        let composer = QueryComposer::new(
            Arc::clone(&market) as Arc<dyn MarketApi>,
            RetryPolicy::default(),
            CursorPolicy::Authoritative,
        );

        let err = composer.fetch_page(LISTINGS_PATH).await.unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert_eq!(market.requested_urls().len(), 1);
    }
}
