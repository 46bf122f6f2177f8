//! Page-token pagination
//!
//! Listing endpoints return a page of items plus an opaque token for the next
//! page. An absent or empty token means the listing is exhausted.

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::stream::{self, Stream};
use crate::Result;

/// One page of a listing
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_page_token: Option<String>) -> Self {
        Self { items, next_page_token }
    }

    /// The continuation token, with empty tokens treated as absent
    pub fn next_token(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Something that can load a page given a token and a size
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send;

    async fn load_page(&self, page_token: Option<String>, page_size: u32) -> Result<Page<Self::Item>>;
}

type LoadFn<T> = Box<dyn Fn(Option<String>, u32) -> BoxFuture<'static, Result<Page<T>>> + Send + Sync>;

/// [`PageSource`] backed by a closure
pub struct FnSource<T> {
    load: LoadFn<T>,
}

impl<T> FnSource<T> {
    pub fn new<F>(load: F) -> Self
    where
        F: Fn(Option<String>, u32) -> BoxFuture<'static, Result<Page<T>>> + Send + Sync + 'static,
    {
        Self { load: Box::new(load) }
    }
}

#[async_trait]
impl<T: Send + 'static> PageSource for FnSource<T> {
    type Item = T;

    async fn load_page(&self, page_token: Option<String>, page_size: u32) -> Result<Page<T>> {
        (self.load)(page_token, page_size).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Cursor {
    Start,
    At(String),
    Exhausted,
}

/// Walks a [`PageSource`] page by page.
///
/// A failed load leaves the cursor untouched, so calling
/// [`next_page`](Pager::next_page) again retries the same page.
pub struct Pager<S: PageSource> {
    source: S,
    page_size: u32,
    cursor: Cursor,
}

impl<S: PageSource> Pager<S> {
    pub fn new(source: S, page_size: u32) -> Self {
        Self { source, page_size: page_size.max(1), cursor: Cursor::Start }
    }

    /// Resume from a token handed out by an earlier listing
    pub fn starting_at(source: S, page_size: u32, page_token: Option<String>) -> Self {
        let mut pager = Self::new(source, page_size);
        if let Some(token) = page_token.filter(|t| !t.is_empty()) {
            pager.cursor = Cursor::At(token);
        }
        pager
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor == Cursor::Exhausted
    }

    /// Token that would load the next page, if any remain
    pub fn next_token(&self) -> Option<&str> {
        match &self.cursor {
            Cursor::At(token) => Some(token.as_str()),
            _ => None,
        }
    }

    /// Load the next page; `None` once exhausted
    pub async fn next_page(&mut self) -> Result<Option<Vec<S::Item>>> {
        let token = match &self.cursor {
            Cursor::Exhausted => return Ok(None),
            Cursor::Start => None,
            Cursor::At(token) => Some(token.clone()),
        };

        let page = self.source.load_page(token, self.page_size).await?;

        self.cursor = match page.next_token() {
            Some(next) => Cursor::At(next.to_string()),
            None => Cursor::Exhausted,
        };
        Ok(Some(page.items))
    }

    /// Concatenate every remaining page
    pub async fn collect_all(mut self) -> Result<Vec<S::Item>> {
        let mut all = Vec::new();
        while let Some(items) = self.next_page().await? {
            all.extend(items);
        }
        Ok(all)
    }

    /// Remaining pages as a stream; it ends after the first error
    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<S::Item>>> {
        stream::unfold(Some(self), |state| async move {
            let mut pager = state?;
            match pager.next_page().await {
                Ok(Some(items)) => Some((Ok(items), Some(pager))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use futures_util::{FutureExt, StreamExt};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Serves `total` integers in pages, encoding the offset in the token
    struct Numbers {
        total: u32,
        fail_on_call: Mutex<Option<usize>>,
        calls: AtomicUsize,
        final_token: Option<String>,
    }

    impl Numbers {
        fn new(total: u32) -> Self {
            Self { total, fail_on_call: Mutex::new(None), calls: AtomicUsize::new(0), final_token: None }
        }
    }

    #[async_trait]
    impl PageSource for Numbers {
        type Item = u32;

        async fn load_page(&self, page_token: Option<String>, page_size: u32) -> Result<Page<u32>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            {
                let mut fail = self.fail_on_call.lock().unwrap();
                if *fail == Some(call) {
                    *fail = None;
                    return Err(Error::GoogleCloudApi("transient".to_string()));
                }
            }

            let start: u32 = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
            let end = (start + page_size).min(self.total);
            let next = if end < self.total { Some(end.to_string()) } else { self.final_token.clone() };
            Ok(Page::new((start..end).collect(), next))
        }
    }

    #[tokio::test]
    async fn test_collect_all_concatenates_pages() {
        let all = Pager::new(Numbers::new(23), 5).collect_all().await.unwrap();
        assert_eq!(all, (0..23).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_exact_multiple_of_page_size() {
        let source = Numbers::new(10);
        let mut pager = Pager::new(source, 5);

        assert_eq!(pager.next_page().await.unwrap(), Some(vec![0, 1, 2, 3, 4]));
        assert_eq!(pager.next_token(), Some("5"));
        assert_eq!(pager.next_page().await.unwrap(), Some(vec![5, 6, 7, 8, 9]));
        assert!(pager.is_exhausted());
        assert_eq!(pager.next_page().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_token_terminates() {
        let mut source = Numbers::new(3);
        source.final_token = Some(String::new());
        let mut pager = Pager::new(source, 10);

        assert_eq!(pager.next_page().await.unwrap(), Some(vec![0, 1, 2]));
        assert!(pager.is_exhausted());
    }

    #[tokio::test]
    async fn test_empty_listing() {
        let all = Pager::new(Numbers::new(0), 5).collect_all().await.unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn test_failed_page_keeps_cursor() {
        let source = Numbers::new(12);
        *source.fail_on_call.lock().unwrap() = Some(1);
        let mut pager = Pager::new(source, 5);

        let mut loaded = pager.next_page().await.unwrap().unwrap();
        assert!(pager.next_page().await.is_err());
        assert_eq!(pager.next_token(), Some("5"));

        while let Some(items) = pager.next_page().await.unwrap() {
            loaded.extend(items);
        }
        assert_eq!(loaded, (0..12).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_starting_at_token() {
        let pager = Pager::starting_at(Numbers::new(8), 4, Some("4".to_string()));
        assert_eq!(pager.collect_all().await.unwrap(), vec![4, 5, 6, 7]);
    }

    #[tokio::test]
    async fn test_stream_stops_after_error() {
        let source = Numbers::new(20);
        *source.fail_on_call.lock().unwrap() = Some(2);

        let pages: Vec<_> = Pager::new(source, 5).into_stream().collect().await;

        assert_eq!(pages.len(), 3);
        assert!(pages[0].is_ok());
        assert!(pages[1].is_ok());
        assert!(pages[2].is_err());
    }

    #[tokio::test]
    async fn test_fn_source() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let source = FnSource::new(move |token: Option<String>, size| {
            log.lock().unwrap().push((token.clone(), size));
            async move {
                Ok(match token.as_deref() {
                    None => Page::new(vec!["a", "b"], Some("t2".to_string())),
                    _ => Page::new(vec!["c"], None),
                })
            }
            .boxed()
        });

        let all = Pager::new(source, 2).collect_all().await.unwrap();

        assert_eq!(all, vec!["a", "b", "c"]);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(None, 2), (Some("t2".to_string()), 2)]
        );
    }
}
