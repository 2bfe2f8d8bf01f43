//! Web search: provider abstraction, query fan-out, and result deduplication.

use crate::error::SearchError;
use crate::types::SearchHit;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{info, warn};

/// Separator line between serialized search results.
pub const RESULT_SEPARATOR: &str = "\n---\n";

/// Trait for web search providers.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError>;
}

/// Build one query per suffix from the first `topic_chars` characters of `prompt`.
///
/// Whitespace runs in the topic collapse to single spaces.
pub fn build_search_queries(prompt: &str, topic_chars: usize, suffixes: &[String]) -> Vec<String> {
    let head: String = prompt.chars().take(topic_chars).collect();
    let topic = head.split_whitespace().collect::<Vec<_>>().join(" ");
    suffixes
        .iter()
        .map(|suffix| format!("{topic} {suffix}").trim().to_string())
        .collect()
}

/// Run all queries concurrently. One failing query never cancels the others.
pub async fn parallel_search(
    provider: &dyn SearchProvider,
    queries: &[String],
) -> Vec<Result<Vec<SearchHit>, SearchError>> {
    info!(queries = queries.len(), "Starting parallel web search");
    let start = Instant::now();
    let batches =
        futures::future::join_all(queries.iter().map(|q| provider.search(q.as_str()))).await;
    info!(
        elapsed_secs = format!("{:.1}", start.elapsed().as_secs_f64()),
        "Web search finished"
    );
    batches
}

/// Merge search batches into one context string, keeping the first hit per URL.
///
/// Failed batches are logged and skipped. Hits with an empty URL are dropped.
/// Each kept hit becomes a `Title:`/`URL:`/`Content:` block; blocks are joined
/// by [`RESULT_SEPARATOR`] in order of first appearance.
pub fn dedup_results(batches: &[Result<Vec<SearchHit>, SearchError>]) -> String {
    let mut seen_urls: HashSet<&str> = HashSet::new();
    let mut blocks: Vec<String> = Vec::new();

    for batch in batches {
        let hits = match batch {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "Search query failed");
                continue;
            }
        };
        for hit in hits {
            let url = hit.url.trim();
            if url.is_empty() || !seen_urls.insert(url) {
                continue;
            }
            blocks.push(format!(
                "Title: {}\nURL: {}\nContent: {}",
                hit.title, url, hit.content
            ));
        }
    }

    info!(results = blocks.len(), "Search collected unique results");
    blocks.join(RESULT_SEPARATOR)
}

/// A mock search provider for tests.
///
/// Answers by query suffix: the first scripted suffix the query ends with
/// decides the outcome. Unscripted queries return no hits.
#[derive(Default)]
pub struct MockSearchProvider {
    scripted: Vec<(String, Result<Vec<SearchHit>, String>)>,
    queries: Mutex<Vec<String>>,
}

impl MockSearchProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `hits` for queries ending with `suffix`.
    pub fn with_hits(mut self, suffix: &str, hits: Vec<SearchHit>) -> Self {
        self.scripted.push((suffix.to_string(), Ok(hits)));
        self
    }

    /// Fail queries ending with `suffix`.
    pub fn with_failure(mut self, suffix: &str, message: &str) -> Self {
        self.scripted
            .push((suffix.to_string(), Err(message.to_string())));
        self
    }

    /// Queries received so far, in arrival order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        self.queries.lock().unwrap().push(query.to_string());
        match self.scripted.iter().find(|(suffix, _)| query.ends_with(suffix.as_str())) {
            Some((_, Ok(hits))) => Ok(hits.clone()),
            Some((_, Err(message))) => Err(SearchError::Request {
                query: query.to_string(),
                message: message.clone(),
            }),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn url_occurrences(context: &str) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for line in context.lines() {
            if let Some(url) = line.strip_prefix("URL: ") {
                *counts.entry(url.to_string()).or_insert(0) += 1;
            }
        }
        counts
    }

    fn suffixes() -> Vec<String> {
        vec![
            "latest news today".to_string(),
            "breakthroughs announcements".to_string(),
            "funding partnerships".to_string(),
        ]
    }

    #[test]
    fn test_build_search_queries() {
        let queries = build_search_queries("AI industry\n\ndevelopments", 200, &suffixes());
        assert_eq!(
            queries,
            vec![
                "AI industry developments latest news today",
                "AI industry developments breakthroughs announcements",
                "AI industry developments funding partnerships",
            ]
        );
    }

    #[test]
    fn test_build_search_queries_truncates_topic_by_chars() {
        let prompt = "é".repeat(300);
        let queries = build_search_queries(&prompt, 200, &suffixes());
        let topic = queries[0].trim_end_matches(" latest news today");
        assert_eq!(topic.chars().count(), 200);
    }

    #[test]
    fn test_dedup_first_occurrence_wins() {
        let batches = vec![
            Ok(vec![
                SearchHit::new("https://a.example", "A", "first"),
                SearchHit::new("https://b.example", "B", "bee"),
            ]),
            Ok(vec![
                SearchHit::new("https://a.example", "A again", "second"),
                SearchHit::new("https://c.example", "C", "sea"),
            ]),
        ];
        let context = dedup_results(&batches);
        assert_eq!(url_occurrences(&context)["https://a.example"], 1);
        assert!(context.contains("Content: first"));
        assert!(!context.contains("Content: second"));

        let a = context.find("https://a.example").unwrap();
        let b = context.find("https://b.example").unwrap();
        let c = context.find("https://c.example").unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_dedup_block_format() {
        let batches = vec![Ok(vec![
            SearchHit::new("https://a.example", "A", "alpha"),
            SearchHit::new("https://b.example", "B", "beta"),
        ])];
        assert_eq!(
            dedup_results(&batches),
            "Title: A\nURL: https://a.example\nContent: alpha\n---\nTitle: B\nURL: https://b.example\nContent: beta"
        );
    }

    #[test]
    fn test_dedup_skips_failed_batches_and_empty_urls() {
        let batches = vec![
            Err(SearchError::Request {
                query: "q".into(),
                message: "HTTP 500".into(),
            }),
            Ok(vec![
                SearchHit::new("", "No URL", "dropped"),
                SearchHit::new("https://kept.example", "Kept", "kept"),
            ]),
        ];
        let context = dedup_results(&batches);
        assert!(!context.contains("dropped"));
        assert!(context.contains("https://kept.example"));
    }

    #[test]
    fn test_dedup_all_failed_is_empty() {
        let batches = vec![Err(SearchError::ResponseParse {
            message: "bad".into(),
        })];
        assert_eq!(dedup_results(&batches), "");
    }

    #[tokio::test]
    async fn test_parallel_search_tolerates_partial_failure() {
        let provider = MockSearchProvider::new()
            .with_hits(
                "latest news today",
                vec![SearchHit::new("https://a.example", "A", "a")],
            )
            .with_failure("funding partnerships", "timeout");
        let queries = build_search_queries("AI", 200, &suffixes());
        let batches = parallel_search(&provider, &queries).await;

        assert_eq!(batches.len(), 3);
        assert!(batches[0].is_ok());
        assert!(batches[1].as_ref().unwrap().is_empty());
        assert!(batches[2].is_err());
        assert_eq!(provider.queries().len(), 3);
    }
}
