pub mod cache;

use crate::config::schema::SearchConfig;
use crate::error::{DeltaError, Result};
use cache::BoundedCache;
use serde::Deserialize;

/// Knowledge source used to augment a query with context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextSource {
    Wikipedia,
    Arxiv,
    DuckDuckGo,
}

impl ContextSource {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Wikipedia => "Wikipedia",
            Self::Arxiv => "arXiv",
            Self::DuckDuckGo => "DuckDuckGo",
        }
    }
}

/// Short text snippet fetched from a knowledge source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSnippet {
    pub summary: String,
    pub citations: Vec<String>,
    pub url: Option<String>,
}

/// Context-retrieval client with a bounded per-session result cache
pub struct SearchClient {
    client: reqwest::Client,
    cache: BoundedCache<(ContextSource, String), Option<ContextSnippet>>,
    snippet_chars: usize,
    max_results: usize,
}

impl SearchClient {
    #[must_use]
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            cache: BoundedCache::new(config.cache_capacity),
            snippet_chars: config.snippet_chars,
            max_results: config.max_results,
        }
    }

    /// Fetch context for `query` from `source`, consulting the cache first
    ///
    /// `Ok(None)` means the source had nothing relevant; that outcome is
    /// cached too so a fruitless query is not retried within the session.
    pub async fn fetch(
        &mut self,
        source: ContextSource,
        query: &str,
    ) -> Result<Option<ContextSnippet>> {
        let key = (source, query.to_string());
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!("Context cache hit for {:?}", key);
            return Ok(cached.clone());
        }

        let snippet = match source {
            ContextSource::Wikipedia => self.fetch_wikipedia(query).await?,
            ContextSource::Arxiv => self.fetch_arxiv(query).await?,
            ContextSource::DuckDuckGo => self.fetch_duckduckgo(query).await?,
        };

        self.cache.insert(key, snippet.clone());
        Ok(snippet)
    }

    async fn fetch_wikipedia(&self, query: &str) -> Result<Option<ContextSnippet>> {
        // Two-step: title search, then the summary endpoint for the top hit.
        let search: WikiSearchResponse = self
            .client
            .get("https://en.wikipedia.org/w/rest.php/v1/search/page")
            .query(&[("q", query), ("limit", "1")])
            .send()
            .await
            .map_err(|e| DeltaError::Search(format!("Wikipedia search failed: {e}")))?
            .json()
            .await
            .map_err(|e| DeltaError::Search(format!("Wikipedia search response: {e}")))?;

        let Some(page) = search.pages.into_iter().next() else {
            return Ok(None);
        };

        let summary: WikiSummaryResponse = self
            .client
            .get(format!(
                "https://en.wikipedia.org/api/rest_v1/page/summary/{}",
                page.key
            ))
            .send()
            .await
            .map_err(|e| DeltaError::Search(format!("Wikipedia summary failed: {e}")))?
            .json()
            .await
            .map_err(|e| DeltaError::Search(format!("Wikipedia summary response: {e}")))?;

        Ok(snippet_from_wiki(summary, self.snippet_chars))
    }

    async fn fetch_arxiv(&self, query: &str) -> Result<Option<ContextSnippet>> {
        let atom = self
            .client
            .get("https://export.arxiv.org/api/query")
            .query(&[
                ("search_query", format!("all:{query}").as_str()),
                ("max_results", "1"),
                ("sortBy", "relevance"),
            ])
            .send()
            .await
            .map_err(|e| DeltaError::Search(format!("arXiv query failed: {e}")))?
            .text()
            .await
            .map_err(|e| DeltaError::Search(format!("arXiv response: {e}")))?;

        Ok(snippet_from_arxiv_atom(&atom, self.snippet_chars))
    }

    async fn fetch_duckduckgo(&self, query: &str) -> Result<Option<ContextSnippet>> {
        let answer: DdgResponse = self
            .client
            .get("https://api.duckduckgo.com/")
            .query(&[("q", query), ("format", "json"), ("no_html", "1")])
            .send()
            .await
            .map_err(|e| DeltaError::Search(format!("DuckDuckGo query failed: {e}")))?
            .json()
            .await
            .map_err(|e| DeltaError::Search(format!("DuckDuckGo response: {e}")))?;

        Ok(snippet_from_ddg(answer, self.snippet_chars, self.max_results))
    }
}

// Response shapes, limited to the fields the snippets need.

#[derive(Debug, Deserialize)]
struct WikiSearchResponse {
    #[serde(default)]
    pages: Vec<WikiSearchPage>,
}

#[derive(Debug, Deserialize)]
struct WikiSearchPage {
    key: String,
}

#[derive(Debug, Deserialize)]
struct WikiSummaryResponse {
    #[serde(default)]
    title: String,
    #[serde(default)]
    extract: String,
    #[serde(default)]
    content_urls: Option<WikiContentUrls>,
}

#[derive(Debug, Deserialize)]
struct WikiContentUrls {
    desktop: WikiDesktopUrls,
}

#[derive(Debug, Deserialize)]
struct WikiDesktopUrls {
    page: String,
}

#[derive(Debug, Deserialize)]
struct DdgResponse {
    #[serde(default, rename = "AbstractText")]
    abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    #[serde(default, rename = "RelatedTopics")]
    related_topics: Vec<DdgTopic>,
}

#[derive(Debug, Deserialize)]
struct DdgTopic {
    #[serde(default, rename = "Text")]
    text: String,
    #[serde(default, rename = "FirstURL")]
    first_url: String,
}

fn snippet_from_wiki(summary: WikiSummaryResponse, max_chars: usize) -> Option<ContextSnippet> {
    if summary.extract.is_empty() {
        return None;
    }

    let url = summary.content_urls.map(|u| u.desktop.page);
    let mut text = format!("{}: ", summary.title);
    text.push_str(&truncate_snippet(&summary.extract, max_chars));

    Some(ContextSnippet {
        summary: text,
        citations: url.iter().cloned().collect(),
        url,
    })
}

/// Minimal Atom extraction: only the first entry's title, summary, and id
/// are needed, so a full XML parser would be dead weight here.
fn snippet_from_arxiv_atom(atom: &str, max_chars: usize) -> Option<ContextSnippet> {
    let entry = extract_between(atom, "<entry>", "</entry>")?;
    let title = extract_between(entry, "<title>", "</title>")?;
    let summary = extract_between(entry, "<summary>", "</summary>")?;
    let id = extract_between(entry, "<id>", "</id>")?;

    let title = collapse_whitespace(title);
    let summary = collapse_whitespace(summary);
    let id = id.trim().to_string();

    Some(ContextSnippet {
        summary: format!("{title}: {}", truncate_snippet(&summary, max_chars)),
        citations: vec![id.clone()],
        url: Some(id),
    })
}

fn snippet_from_ddg(
    answer: DdgResponse,
    max_chars: usize,
    max_results: usize,
) -> Option<ContextSnippet> {
    if !answer.abstract_text.is_empty() {
        let url = (!answer.abstract_url.is_empty()).then_some(answer.abstract_url);
        return Some(ContextSnippet {
            summary: truncate_snippet(&answer.abstract_text, max_chars),
            citations: url.iter().cloned().collect(),
            url,
        });
    }

    let mut summary = String::new();
    let mut citations = Vec::new();

    for (i, topic) in answer
        .related_topics
        .iter()
        .filter(|t| !t.text.is_empty())
        .take(max_results)
        .enumerate()
    {
        summary.push_str(&format!(
            "Result {}: {}\n",
            i + 1,
            truncate_snippet(&topic.text, max_chars)
        ));
        if !topic.first_url.is_empty() {
            citations.push(topic.first_url.clone());
        }
    }

    if summary.is_empty() {
        return None;
    }

    let url = citations.first().cloned();
    Some(ContextSnippet {
        summary,
        citations,
        url,
    })
}

/// Truncate to `max_chars` characters, appending an ellipsis when cut
fn truncate_snippet(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

fn extract_between<'a>(haystack: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = haystack.find(open)? + open.len();
    let end = haystack[start..].find(close)? + start;
    Some(&haystack[start..end])
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_snippet_short_text_unchanged() {
        assert_eq!(truncate_snippet("short", 300), "short");
        assert_eq!(truncate_snippet("  padded  ", 300), "padded");
    }

    #[test]
    fn test_truncate_snippet_cuts_with_ellipsis() {
        let long = "a".repeat(400);
        let cut = truncate_snippet(&long, 300);
        assert_eq!(cut.chars().count(), 303);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_extract_between() {
        let xml = "<entry><title>Paper</title></entry>";
        assert_eq!(extract_between(xml, "<title>", "</title>"), Some("Paper"));
        assert_eq!(extract_between(xml, "<summary>", "</summary>"), None);
    }

    #[test]
    fn test_snippet_from_arxiv_atom() {
        let atom = r"<feed>
            <title>ArXiv Query Results</title>
            <entry>
                <id>http://arxiv.org/abs/1234.5678v1</id>
                <title>Attention Is All
                   You Need</title>
                <summary>
                   The dominant sequence transduction models are based on
                   complex recurrent networks.
                </summary>
            </entry>
        </feed>";

        let snippet = snippet_from_arxiv_atom(atom, 300).unwrap();
        assert!(snippet
            .summary
            .starts_with("Attention Is All You Need: The dominant sequence"));
        assert_eq!(
            snippet.citations,
            vec!["http://arxiv.org/abs/1234.5678v1".to_string()]
        );
        assert_eq!(
            snippet.url.as_deref(),
            Some("http://arxiv.org/abs/1234.5678v1")
        );
    }

    #[test]
    fn test_snippet_from_arxiv_atom_no_entries() {
        let atom = "<feed><title>ArXiv Query Results</title></feed>";
        assert!(snippet_from_arxiv_atom(atom, 300).is_none());
    }

    #[test]
    fn test_snippet_from_wiki() {
        let summary = WikiSummaryResponse {
            title: "Rust (programming language)".to_string(),
            extract: "Rust is a general-purpose programming language.".to_string(),
            content_urls: Some(WikiContentUrls {
                desktop: WikiDesktopUrls {
                    page: "https://en.wikipedia.org/wiki/Rust_(programming_language)".to_string(),
                },
            }),
        };

        let snippet = snippet_from_wiki(summary, 300).unwrap();
        assert!(snippet.summary.starts_with("Rust (programming language): Rust is"));
        assert_eq!(snippet.citations.len(), 1);
    }

    #[test]
    fn test_snippet_from_wiki_empty_extract() {
        let summary = WikiSummaryResponse {
            title: "Missing".to_string(),
            extract: String::new(),
            content_urls: None,
        };
        assert!(snippet_from_wiki(summary, 300).is_none());
    }

    #[test]
    fn test_snippet_from_ddg_prefers_abstract() {
        let answer = DdgResponse {
            abstract_text: "DuckDuckGo is a search engine.".to_string(),
            abstract_url: "https://duckduckgo.com/about".to_string(),
            related_topics: vec![DdgTopic {
                text: "ignored".to_string(),
                first_url: "https://example.com".to_string(),
            }],
        };

        let snippet = snippet_from_ddg(answer, 300, 2).unwrap();
        assert_eq!(snippet.summary, "DuckDuckGo is a search engine.");
        assert_eq!(snippet.url.as_deref(), Some("https://duckduckgo.com/about"));
    }

    #[test]
    fn test_snippet_from_ddg_related_topics_fallback() {
        let answer = DdgResponse {
            abstract_text: String::new(),
            abstract_url: String::new(),
            related_topics: vec![
                DdgTopic {
                    text: "First result".to_string(),
                    first_url: "https://a.example".to_string(),
                },
                DdgTopic {
                    text: "Second result".to_string(),
                    first_url: "https://b.example".to_string(),
                },
                DdgTopic {
                    text: "Third result".to_string(),
                    first_url: "https://c.example".to_string(),
                },
            ],
        };

        let snippet = snippet_from_ddg(answer, 300, 2).unwrap();
        assert!(snippet.summary.contains("Result 1: First result"));
        assert!(snippet.summary.contains("Result 2: Second result"));
        assert!(!snippet.summary.contains("Third"));
        assert_eq!(snippet.citations.len(), 2);
        assert_eq!(snippet.url.as_deref(), Some("https://a.example"));
    }

    #[test]
    fn test_snippet_from_ddg_empty() {
        let answer = DdgResponse {
            abstract_text: String::new(),
            abstract_url: String::new(),
            related_topics: vec![],
        };
        assert!(snippet_from_ddg(answer, 300, 2).is_none());
    }
}
