//! Token splitting and list growth shared by the decoders.

use crate::error::{Result, SentinelError};

/// Split `source` on every occurrence of `delim`, dropping zero-length tokens.
///
/// Both arguments must be non-empty: an empty payload means the data collected so far
/// is being thrown away, which callers treat as a decode failure.
pub fn split_tokens<'a>(source: &'a str, delim: &str) -> Result<Vec<&'a str>> {
    if source.is_empty() {
        return Err(SentinelError::InvalidInput("empty source string".to_string()));
    }
    if delim.is_empty() {
        return Err(SentinelError::InvalidInput("empty delimiter".to_string()));
    }

    Ok(source.split(delim).filter(|t| !t.is_empty()).collect())
}

/// Grow `list` to exactly `size` elements, filling new slots with `T::default()`.
///
/// Never shrinks: a `size` below the current length leaves the list untouched.
pub fn grow_list<T: Default>(list: &mut Vec<T>, size: usize) {
    if size > list.len() {
        list.resize_with(size, T::default);
    }
}

/// Append one element by growing the list a slot and filling it. Returns its index.
pub fn append<T: Default>(list: &mut Vec<T>, item: T) -> usize {
    let idx = list.len();
    grow_list(list, idx + 1);
    list[idx] = item;
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_lines() {
        let tokens = split_tokens("ver=1.0\r\nRecint=10\r\nSN=ABC123\r\n", "\r\n").unwrap();
        assert_eq!(tokens, vec!["ver=1.0", "Recint=10", "SN=ABC123"]);
    }

    #[test]
    fn test_split_drops_empty_tokens() {
        let tokens = split_tokens(",,a,,b,", ",").unwrap();
        assert_eq!(tokens, vec!["a", "b"]);

        let tokens = split_tokens("\r\n\r\n", "\r\n").unwrap();
        assert!(tokens.is_empty());
    }

    #[test]
    fn test_split_multi_byte_delimiter() {
        let tokens = split_tokens("4010, 79, 0, 560, 1", ", ").unwrap();
        assert_eq!(tokens, vec!["4010", "79", "0", "560", "1"]);
    }

    #[test]
    fn test_split_single_token_is_unchanged() {
        for delim in [",", " ", "\r\n", "d\r\n"] {
            let tokens = split_tokens("ABC123", delim).unwrap();
            assert_eq!(tokens, vec!["ABC123"]);
        }
    }

    #[test]
    fn test_split_rejects_empty_input() {
        assert!(matches!(
            split_tokens("", ","),
            Err(SentinelError::InvalidInput(_))
        ));
        assert!(matches!(
            split_tokens("a,b", ""),
            Err(SentinelError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_grow_list_preserves_existing() {
        let mut list = vec![7, 8];
        grow_list(&mut list, 4);
        assert_eq!(list, vec![7, 8, 0, 0]);

        grow_list(&mut list, 1);
        assert_eq!(list.len(), 4);
    }

    #[test]
    fn test_append() {
        let mut list: Vec<String> = Vec::new();
        assert_eq!(append(&mut list, "a".to_string()), 0);
        assert_eq!(append(&mut list, "b".to_string()), 1);
        assert_eq!(list, vec!["a", "b"]);
    }
}
