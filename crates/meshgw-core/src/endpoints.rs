//! Endpoint filters (§3 "Endpoint filters").

use std::collections::HashSet;

use thiserror::Error;

#[derive(Debug, Error)]
#[error("ignored and whitened endpoint sets overlap: {0:?}")]
pub struct EndpointFilterOverlap(pub Vec<u8>);

/// The two sets of destination-endpoint integers that shape uplink
/// forwarding: *ignored* endpoints drop the event entirely, *whitened*
/// endpoints forward it with the payload elided. The sets must be disjoint;
/// overlap is a startup fatal (§3, §8.2).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EndpointFilters {
    ignored: HashSet<u8>,
    whitened: HashSet<u8>,
}

impl EndpointFilters {
    pub fn new(
        ignored: impl IntoIterator<Item = u8>,
        whitened: impl IntoIterator<Item = u8>,
    ) -> Result<Self, EndpointFilterOverlap> {
        let ignored: HashSet<u8> = ignored.into_iter().collect();
        let whitened: HashSet<u8> = whitened.into_iter().collect();
        let overlap: Vec<u8> = ignored.intersection(&whitened).copied().collect();
        if !overlap.is_empty() {
            return Err(EndpointFilterOverlap(overlap));
        }
        Ok(Self { ignored, whitened })
    }

    pub fn is_ignored(&self, endpoint: u8) -> bool {
        self.ignored.contains(&endpoint)
    }

    pub fn is_whitened(&self, endpoint: u8) -> bool {
        self.whitened.contains(&endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn disjoint_sets_construct_fine() {
        let filters = EndpointFilters::new([1, 2], [3, 4]).unwrap();
        assert!(filters.is_ignored(1));
        assert!(filters.is_whitened(3));
        assert!(!filters.is_whitened(1));
    }

    #[test]
    fn overlapping_sets_are_rejected() {
        let err = EndpointFilters::new([1, 2], [2, 3]).unwrap_err();
        assert_eq!(err.0, vec![2]);
    }

    proptest! {
        #[test]
        fn any_shared_endpoint_is_rejected(
            ignored in proptest::collection::hash_set(0u8..=255, 0..8),
            whitened in proptest::collection::hash_set(0u8..=255, 0..8),
        ) {
            let expect_overlap = ignored.intersection(&whitened).next().is_some();
            let result = EndpointFilters::new(ignored.clone(), whitened.clone());
            prop_assert_eq!(result.is_err(), expect_overlap);
        }
    }
}
