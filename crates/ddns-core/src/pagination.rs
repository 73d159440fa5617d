//! Lazy pagination over numbered pages
//!
//! Providers hand [`paginate`] a closure that fetches page `n` (1-based) and
//! get back a [`PageStream`] that pulls pages only as the consumer drains the
//! buffered items.

use futures::TryStreamExt;
use futures::stream;
use std::collections::VecDeque;
use std::future::Future;

use crate::Result;
use crate::traits::PageStream;

/// One page of a listing
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total item count across all pages, when the provider reports it
    pub total: Option<u64>,
}

struct Cursor<T, F> {
    fetch: F,
    buffer: VecDeque<T>,
    next_page: u32,
    seen: u64,
    done: bool,
}

/// Turn a page fetcher into a stream of items
///
/// Stops after an empty page, or once the running item count reaches the
/// reported total. A fetch error is yielded once and ends the stream.
pub fn paginate<'a, T, F, Fut>(fetch: F) -> PageStream<'a, T>
where
    T: Send + 'a,
    F: FnMut(u32) -> Fut + Send + 'a,
    Fut: Future<Output = Result<Page<T>>> + Send + 'a,
{
    let cursor = Cursor {
        fetch,
        buffer: VecDeque::new(),
        next_page: 1,
        seen: 0,
        done: false,
    };

    Box::pin(stream::unfold(cursor, |mut cursor| async move {
        loop {
            if let Some(item) = cursor.buffer.pop_front() {
                return Some((Ok(item), cursor));
            }
            if cursor.done {
                return None;
            }

            let page_number = cursor.next_page;
            match (cursor.fetch)(page_number).await {
                Ok(page) => {
                    cursor.next_page += 1;
                    if page.items.is_empty() {
                        cursor.done = true;
                        continue;
                    }
                    cursor.seen += page.items.len() as u64;
                    if matches!(page.total, Some(total) if cursor.seen >= total) {
                        cursor.done = true;
                    }
                    cursor.buffer.extend(page.items);
                }
                Err(err) => {
                    tracing::debug!("Page {} failed: {}", page_number, err);
                    cursor.done = true;
                    return Some((Err(err), cursor));
                }
            }
        }
    }))
}

/// Drain a stream, stopping at the first error
pub async fn collect_all<T>(stream: PageStream<'_, T>) -> Result<Vec<T>> {
    stream.try_collect().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_stream::StreamExt;

    fn pages_of(items: Vec<u32>, per_page: usize, report_total: bool) -> Vec<Page<u32>> {
        let total = report_total.then_some(items.len() as u64);
        items
            .chunks(per_page)
            .map(|chunk| Page {
                items: chunk.to_vec(),
                total,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_stops_at_reported_total() {
        let pages = Arc::new(pages_of((1..=5).collect(), 2, true));
        let fetches = Arc::new(AtomicU32::new(0));

        let counter = fetches.clone();
        let stream = paginate(move |n| {
            let pages = pages.clone();
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(pages[(n - 1) as usize].clone()) }
        });

        let items = collect_all(stream).await.unwrap();
        assert_eq!(items, vec![1, 2, 3, 4, 5]);
        assert_eq!(fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stops_at_empty_page_without_total() {
        let pages = Arc::new(pages_of((1..=4).collect(), 2, false));

        let stream = paginate(move |n| {
            let pages = pages.clone();
            async move {
                Ok(pages.get((n - 1) as usize).cloned().unwrap_or(Page {
                    items: Vec::new(),
                    total: None,
                }))
            }
        });

        assert_eq!(collect_all(stream).await.unwrap(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_fetches_lazily() {
        let fetches = Arc::new(AtomicU32::new(0));

        let counter = fetches.clone();
        let mut stream = paginate(move |n| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(Page {
                    items: vec![n * 10, n * 10 + 1],
                    total: Some(6),
                })
            }
        });

        assert_eq!(fetches.load(Ordering::SeqCst), 0);
        assert_eq!(stream.next().await.unwrap().unwrap(), 10);
        assert_eq!(stream.next().await.unwrap().unwrap(), 11);
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(stream.next().await.unwrap().unwrap(), 20);
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_error_is_terminal() {
        let mut stream = paginate(|n| async move {
            if n == 1 {
                Ok(Page {
                    items: vec![1u32],
                    total: Some(10),
                })
            } else {
                Err(Error::transport("connection reset"))
            }
        });

        assert_eq!(stream.next().await.unwrap().unwrap(), 1);
        assert!(matches!(stream.next().await, Some(Err(Error::Transport(_)))));
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_empty_listing() {
        let stream = paginate(|_| async {
            Ok(Page::<u32> {
                items: Vec::new(),
                total: Some(0),
            })
        });
        let items = tokio_test::block_on(collect_all(stream)).unwrap();
        assert!(items.is_empty());
    }
}
