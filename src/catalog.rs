//! Static catalog of the logical upstream data sources.
//!
//! Each entry names one lane-worthy query against the upstream API. The
//! scanner walks the catalog round-robin for rotation lanes and samples
//! random subsets for batch scan shapes.

use rand::seq::SliceRandom;

/// One logical data source: a stable name (used as lane key) and the
/// upstream request path relative to the API base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub path: String,
}

impl Endpoint {
    fn search(term: &str) -> Self {
        Self {
            name: format!("search-{}", term.to_lowercase()),
            path: format!("search?q={term}"),
        }
    }

    fn tokens(name: &str, address: &str) -> Self {
        Self {
            name: format!("tokens-{name}"),
            path: format!("tokens/{address}"),
        }
    }
}

/// Fixed, ordered list of logical endpoints.
#[derive(Debug, Clone)]
pub struct EndpointCatalog {
    entries: Vec<Endpoint>,
}

impl Default for EndpointCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl EndpointCatalog {
    /// The standard production catalog (24 entries).
    pub fn standard() -> Self {
        let mut entries = Vec::with_capacity(24);

        for term in [
            "SOL", "ETH", "BNB", "PEPE", "DOGE", "SHIB", "WIF", "BONK", "FLOKI", "MEME", "AI",
            "MOON", "PUMP", "CAT", "INU", "APE", "FROG", "BABY", "CHAD", "TURBO",
        ] {
            entries.push(Endpoint::search(term));
        }

        entries.push(Endpoint::tokens(
            "weth",
            "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
        ));
        entries.push(Endpoint::tokens(
            "wbnb",
            "0xbb4CdB9CBd36B01bD1cBaEF60aF814a3f6F0Ee75",
        ));
        entries.push(Endpoint::tokens(
            "wmatic",
            "0x0d500B1d8E8eF31E21C99d1Db9A6444d3ADf1270",
        ));
        entries.push(Endpoint::tokens(
            "wsol",
            "So11111111111111111111111111111111111111112",
        ));

        Self { entries }
    }

    /// Custom catalog, mainly for tests and reduced deployments.
    pub fn with_entries(entries: Vec<Endpoint>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Endpoint] {
        &self.entries
    }

    /// Entry at `index mod len`; rotation order is catalog order.
    /// `None` only for an empty catalog.
    pub fn at_cycle(&self, index: usize) -> Option<&Endpoint> {
        if self.entries.is_empty() {
            return None;
        }
        Some(&self.entries[index % self.entries.len()])
    }

    pub fn by_name(&self, name: &str) -> Option<&Endpoint> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Uniform random sample of `n` distinct endpoints, no replacement,
    /// no weighting. `n` larger than the catalog yields the whole catalog
    /// in random order.
    pub fn random_subset(&self, n: usize) -> Vec<Endpoint> {
        let mut rng = rand::thread_rng();
        self.entries
            .choose_multiple(&mut rng, n.min(self.entries.len()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn standard_catalog_has_24_distinct_entries() {
        let cat = EndpointCatalog::standard();
        assert_eq!(cat.len(), 24);

        let names: HashSet<_> = cat.entries().iter().map(|e| e.name.clone()).collect();
        assert_eq!(names.len(), 24, "endpoint names must be unique");
    }

    #[test]
    fn cycle_walks_catalog_in_order() {
        let cat = EndpointCatalog::standard();
        let n = cat.len();

        for i in 0..n {
            assert_eq!(cat.at_cycle(i).unwrap().name, cat.entries()[i].name);
        }
        // Wraps back to the start.
        assert_eq!(cat.at_cycle(n).unwrap().name, cat.entries()[0].name);
    }

    #[test]
    fn empty_catalog_cycles_to_none() {
        let cat = EndpointCatalog::with_entries(vec![]);
        assert!(cat.at_cycle(0).is_none());
        assert!(cat.at_cycle(7).is_none());
        assert!(cat.random_subset(3).is_empty());
    }

    #[test]
    fn subset_larger_than_catalog_is_clamped() {
        let cat = EndpointCatalog::standard();
        let sample = cat.random_subset(1_000);
        assert_eq!(sample.len(), cat.len());
    }

    proptest! {
        /// Samples draw distinct members of the catalog, never duplicates,
        /// never foreign entries. Ordering is deliberately unasserted.
        #[test]
        fn subset_has_no_replacement(n in 0usize..24) {
            let cat = EndpointCatalog::standard();
            let sample = cat.random_subset(n);

            prop_assert_eq!(sample.len(), n);

            let names: HashSet<_> = sample.iter().map(|e| e.name.clone()).collect();
            prop_assert_eq!(names.len(), n);

            for e in &sample {
                prop_assert!(cat.by_name(&e.name).is_some());
            }
        }
    }

    #[test]
    fn repeated_sampling_covers_catalog() {
        // Distributional smoke test: over many draws every endpoint should
        // appear at least once.
        let cat = EndpointCatalog::standard();
        let mut seen = HashSet::new();

        for _ in 0..400 {
            for e in cat.random_subset(4) {
                seen.insert(e.name);
            }
        }

        assert_eq!(seen.len(), cat.len());
    }
}
