use crate::parser::extract_id;
use std::collections::{BTreeMap, BTreeSet};

/// Listing URLs discovered across search pages, deduplicated
#[derive(Debug, Default)]
pub struct CrawlFrontier {
    links: BTreeSet<String>,
}

impl CrawlFrontier {
    /// Add links, returning how many were not seen before
    pub fn extend(&mut self, links: impl IntoIterator<Item = String>) -> usize {
        let before = self.links.len();
        self.links.extend(links);
        self.links.len() - before
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Listing ID to URL. When two URLs carry the same ID the first in
    /// sort order is kept.
    pub fn by_id(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for link in &self.links {
            if let Some(id) = extract_id(link) {
                out.entry(id).or_insert_with(|| link.clone());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_only_new_links() {
        let mut frontier = CrawlFrontier::default();
        let first = vec![
            "https://www.101evler.com/kibris/satilik-emlak/villa-iskele-101.html".to_string(),
            "https://www.101evler.com/kibris/satilik-emlak/villa-iskele-102.html".to_string(),
        ];
        assert_eq!(frontier.extend(first.clone()), 2);
        assert_eq!(frontier.extend(first), 0);
        assert_eq!(
            frontier.extend(vec!["https://www.101evler.com/kibris/satilik-emlak/ev-103.html".to_string()]),
            1
        );
        assert_eq!(frontier.len(), 3);
    }

    #[test]
    fn maps_ids_to_urls() {
        let mut frontier = CrawlFrontier::default();
        frontier.extend(vec![
            "https://h/kibris/satilik-emlak/a-7.html".to_string(),
            "https://h/kibris/satilik-emlak/b-7.html".to_string(),
            "https://h/kibris/satilik-emlak/c-8.html".to_string(),
        ]);
        let ids = frontier.by_id();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids["7"], "https://h/kibris/satilik-emlak/a-7.html");
    }
}
