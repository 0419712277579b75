//! Offset/limit pagination over listing endpoints.
//!
//! Listing endpoints answer `{meta: {total}, data: [...]}` and accept
//! `offset`/`limit`. [`paginate`] walks them page by page until a short page
//! comes back and stitches the pages into one [`ListResponse`].

use std::future::Future;

use tracing::debug;

use yuque_export_shared::{ListMeta, ListResponse, Result};

/// Fixed page size requested from listing endpoints.
pub const PAGE_SIZE: usize = 100;

/// Collect every page of a listing into a single response.
///
/// `fetch_page(offset, limit)` is called with `offset = 0, 100, 200, ...`
/// until it returns fewer than [`PAGE_SIZE`] items. The returned
/// `meta.total` is the sum of the per-page totals, not the last page's value.
pub async fn paginate<T, F, Fut>(mut fetch_page: F) -> Result<ListResponse<T>>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = Result<ListResponse<T>>>,
{
    let mut offset = 0;
    let mut total = 0u64;
    let mut data = Vec::new();

    loop {
        let page = fetch_page(offset, PAGE_SIZE).await?;
        let received = page.data.len();

        total += page.meta.total;
        data.extend(page.data);
        debug!(offset, received, "fetched listing page");

        if received < PAGE_SIZE {
            break;
        }
        offset += PAGE_SIZE;
    }

    Ok(ListResponse {
        meta: ListMeta { total },
        data,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use yuque_export_shared::ExportError;

    use super::*;

    /// Serve pages with the given sizes; each page reports its own length as total.
    fn page(offset: usize, size: usize) -> ListResponse<usize> {
        ListResponse {
            meta: ListMeta { total: size as u64 },
            data: (offset..offset + size).collect(),
        }
    }

    #[tokio::test]
    async fn concatenates_until_short_page() {
        let sizes = [100, 100, 37];
        let calls = RefCell::new(Vec::new());

        let result = paginate(|offset, limit| {
            calls.borrow_mut().push((offset, limit));
            let size = sizes[offset / limit];
            async move { Ok(page(offset, size)) }
        })
        .await
        .expect("paginate");

        assert_eq!(result.data.len(), 237);
        assert_eq!(result.meta.total, 237);
        assert_eq!(result.data[236], 236);
        assert_eq!(*calls.borrow(), vec![(0, 100), (100, 100), (200, 100)]);
    }

    #[tokio::test]
    async fn sums_reported_totals() {
        // Every page reports the endpoint's stable total; the sum is kept as-is.
        let sizes = [100, 5];
        let result = paginate(|offset, limit| {
            let size = sizes[offset / limit];
            async move {
                Ok(ListResponse {
                    meta: ListMeta { total: 105 },
                    data: vec![(); size],
                })
            }
        })
        .await
        .expect("paginate");

        assert_eq!(result.data.len(), 105);
        assert_eq!(result.meta.total, 210);
    }

    #[tokio::test]
    async fn full_last_page_needs_an_empty_page() {
        let sizes = [100, 0];
        let calls = RefCell::new(0);

        let result = paginate(|offset, limit| {
            *calls.borrow_mut() += 1;
            let size = sizes[offset / limit];
            async move { Ok(page(offset, size)) }
        })
        .await
        .expect("paginate");

        assert_eq!(result.data.len(), 100);
        assert_eq!(*calls.borrow(), 2);
    }

    #[tokio::test]
    async fn propagates_page_errors() {
        let result: Result<ListResponse<usize>> = paginate(|offset, _limit| async move {
            if offset == 0 {
                Ok(page(0, 100))
            } else {
                Err(ExportError::fetch("https://example.com/docs", "connection reset"))
            }
        })
        .await;

        assert!(matches!(result, Err(ExportError::Fetch { .. })));
    }
}
