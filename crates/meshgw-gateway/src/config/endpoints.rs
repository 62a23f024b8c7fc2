//! Endpoint-list grammar (§6): `[v1,v2,lo-hi,...]`, values `0..=255`, ranges
//! inclusive.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EndpointListError {
    #[error("endpoint list `{0}` is missing its enclosing brackets")]
    MissingBrackets(String),
    #[error("endpoint value `{0}` is out of range 0..=255")]
    OutOfRange(String),
    #[error("endpoint range `{0}` has its low bound above its high bound")]
    InvertedRange(String),
    #[error("endpoint term `{0}` is neither a value nor a `lo-hi` range")]
    MalformedTerm(String),
}

/// Parses `[1,2,10-20]` into the flattened, deduplicated set of `u8`
/// endpoints it denotes. An empty `[]` parses to an empty list.
pub fn parse_endpoint_list(raw: &str) -> Result<Vec<u8>, EndpointListError> {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| EndpointListError::MissingBrackets(raw.to_string()))?;

    let mut endpoints = Vec::new();
    for term in inner.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match term.split_once('-') {
            Some((lo, hi)) => {
                let lo: u8 = lo
                    .trim()
                    .parse()
                    .map_err(|_| EndpointListError::MalformedTerm(term.to_string()))?;
                let hi: u8 = hi
                    .trim()
                    .parse()
                    .map_err(|_| EndpointListError::MalformedTerm(term.to_string()))?;
                if lo > hi {
                    return Err(EndpointListError::InvertedRange(term.to_string()));
                }
                endpoints.extend(lo..=hi);
            }
            None => {
                let value: u16 = term
                    .parse()
                    .map_err(|_| EndpointListError::MalformedTerm(term.to_string()))?;
                if value > 255 {
                    return Err(EndpointListError::OutOfRange(term.to_string()));
                }
                endpoints.push(value as u8);
            }
        }
    }
    Ok(endpoints)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_parses_to_nothing() {
        assert_eq!(parse_endpoint_list("[]").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn mixed_values_and_ranges_flatten_in_order() {
        assert_eq!(parse_endpoint_list("[1,2,10-12]").unwrap(), vec![1, 2, 10, 11, 12]);
    }

    #[test]
    fn missing_brackets_is_rejected() {
        assert!(parse_endpoint_list("1,2").is_err());
    }

    #[test]
    fn out_of_range_value_is_rejected() {
        assert!(parse_endpoint_list("[300]").is_err());
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert!(parse_endpoint_list("[20-10]").is_err());
    }
}
