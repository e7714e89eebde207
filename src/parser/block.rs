/// Classifies fetched HTML as an anti-bot block page
#[derive(Debug, Clone)]
pub struct BlockDetector {
    phrases: Vec<String>,
}

impl BlockDetector {
    pub fn new(phrases: &[String]) -> Self {
        Self {
            phrases: phrases.iter().filter(|p| !p.is_empty()).cloned().collect(),
        }
    }

    /// Empty HTML is a fetch failure, not a block
    pub fn is_blocked(&self, html: &str) -> bool {
        !html.is_empty() && self.phrases.iter().any(|phrase| html.contains(phrase.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_BLOCK_PHRASES;

    fn detector() -> BlockDetector {
        let phrases: Vec<String> = DEFAULT_BLOCK_PHRASES.iter().map(|s| s.to_string()).collect();
        BlockDetector::new(&phrases)
    }

    #[test]
    fn detects_block_pages() {
        let html = r#"<h1 data-translate="block_headline">Sorry, you have been blocked</h1>"#;
        assert!(detector().is_blocked(html));
    }

    #[test]
    fn normal_and_empty_pages_are_not_blocked() {
        assert!(!detector().is_blocked("<html><body>Villa for sale</body></html>"));
        assert!(!detector().is_blocked(""));
    }
}
