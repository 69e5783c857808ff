//! Offset pagination over the merged feed
//!
//! Each kind is over-fetched from the start of its stream so that
//! post-fetch filtering still leaves enough items to fill the requested
//! window once all kinds are merged.

/// Rows requested from each kind's store
///
/// # Examples
/// ```
/// use bizlink_feed::pagination::buffer_limit;
///
/// // first page of 40 with the default factor
/// assert_eq!(buffer_limit(0, 40, 2), 80);
/// // third page needs the two pages before it as well
/// assert_eq!(buffer_limit(80, 40, 2), 240);
/// ```
pub fn buffer_limit(offset: usize, limit: usize, buffer_factor: usize) -> usize {
    offset
        .saturating_add(limit)
        .saturating_mul(buffer_factor.max(1))
}

/// Take the `[offset, offset + limit)` window, clamped to the list
pub fn page<T>(items: Vec<T>, offset: usize, limit: usize) -> Vec<T> {
    items.into_iter().skip(offset).take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_window() {
        let items: Vec<u32> = (0..10).collect();
        assert_eq!(page(items.clone(), 0, 3), vec![0, 1, 2]);
        assert_eq!(page(items.clone(), 8, 5), vec![8, 9]);
        assert!(page(items, 20, 5).is_empty());
    }

    #[test]
    fn test_buffer_factor_floor() {
        assert_eq!(buffer_limit(0, 10, 0), 10);
    }

    #[test]
    fn test_buffer_saturates() {
        assert_eq!(buffer_limit(usize::MAX, 1, 2), usize::MAX);
    }
}
