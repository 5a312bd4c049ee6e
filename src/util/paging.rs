use crate::models::page::{DEFAULT_PAGE_SIZE, Page, PageRequest, PageWindow};

/// Resolve a page request into limit/offset. An empty or unparsable token is
/// treated as the first page. The index is clamped so `offset + limit` stays
/// within `i64`.
pub fn window(req: &PageRequest, default_size: i64) -> PageWindow {
    let limit = if req.page_size > 0 {
        req.page_size
    } else if default_size > 0 {
        default_size
    } else {
        DEFAULT_PAGE_SIZE
    };

    let index = req
        .page_token
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|i| *i >= 0)
        .unwrap_or(0)
        .min((i64::MAX - limit) / limit);

    PageWindow {
        index,
        limit,
        offset: index.saturating_mul(limit),
    }
}

/// Wrap one page of results, emitting a next token only if more rows remain.
pub fn page<T>(items: Vec<T>, total_size: i64, w: PageWindow) -> Page<T> {
    let more = w.offset.checked_add(w.limit).is_some_and(|end| end < total_size);
    let next_page_token = if more {
        Some((w.index + 1).to_string())
    } else {
        None
    };

    Page {
        items,
        total_size,
        next_page_token,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_hundred_and_first_page() {
        let w = window(&PageRequest::default(), 0);
        assert_eq!(w, PageWindow { index: 0, limit: 100, offset: 0 });
    }

    #[test]
    fn token_selects_offset() {
        let w = window(&PageRequest::new(25, "3"), 100);
        assert_eq!(w.offset, 75);
        assert_eq!(w.limit, 25);
    }

    #[test]
    fn garbage_token_is_first_page() {
        assert_eq!(window(&PageRequest::new(10, "abc"), 100).offset, 0);
        assert_eq!(window(&PageRequest::new(10, "-2"), 100).offset, 0);
    }

    #[test]
    fn next_token_only_when_rows_remain() {
        let w = window(&PageRequest::new(10, "1"), 100);
        assert_eq!(page(vec![0; 10], 30, w).next_page_token.as_deref(), Some("2"));
        assert_eq!(page(vec![0; 10], 20, w).next_page_token, None);
        assert_eq!(page(Vec::<u8>::new(), 0, window(&PageRequest::default(), 100)).next_page_token, None);
    }

    #[test]
    fn huge_token_is_clamped_past_the_end() {
        let w = window(&PageRequest::new(10, "9223372036854775807"), 100);
        assert!(w.offset.checked_add(w.limit).is_some());
        assert_eq!(page(Vec::<u8>::new(), 42, w).next_page_token, None);

        let w = window(&PageRequest::new(i64::MAX, "1"), 100);
        assert_eq!(w.offset, 0);
        assert_eq!(page(Vec::<u8>::new(), 42, w).next_page_token, None);
    }
}
