use std::future::Future;

use super::errors::Result;

/// Drain a page-numbered listing.
///
/// Pages are requested from 1 upward. Fetching stops at the first page that
/// returns fewer than `page_size` items, so a listing of exactly
/// `k * page_size` items costs one extra (empty) request.
pub async fn paginate<T, F, Fut>(page_size: usize, mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let page_size = page_size.max(1);
    let mut all = Vec::new();
    let mut page = 1u32;

    loop {
        let items = fetch_page(page).await?;
        let count = items.len();
        all.extend(items);

        tracing::trace!(page, count, total = all.len(), "Fetched page");

        if count < page_size {
            break;
        }
        page += 1;
    }

    Ok(all)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::service::{ServiceError, ServiceKind};

    #[tokio::test]
    async fn stops_on_short_page() {
        let calls = AtomicU32::new(0);
        let sizes = [100usize, 100, 37];

        let items = paginate(100, |page| {
            calls.fetch_add(1, Ordering::SeqCst);
            let size = sizes[(page - 1) as usize];
            async move { Ok((0..size).collect::<Vec<_>>()) }
        })
        .await
        .expect("pagination succeeds");

        assert_eq!(items.len(), 237);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn full_last_page_costs_one_empty_request() {
        let calls = AtomicU32::new(0);

        let items = paginate(2, |page| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(match page {
                    1 | 2 => vec![page, page],
                    _ => Vec::new(),
                })
            }
        })
        .await
        .expect("pagination succeeds");

        assert_eq!(items, vec![1, 1, 2, 2]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn errors_stop_pagination() {
        let result: Result<Vec<u32>> = paginate(10, |page| async move {
            if page == 2 {
                Err(ServiceError::Transport {
                    service: ServiceKind::Clockify,
                    message: "connection reset".to_string(),
                })
            } else {
                Ok(vec![0; 10])
            }
        })
        .await;

        assert!(matches!(result, Err(ServiceError::Transport { .. })));
    }
}
