//! arXiv Atom API retriever

use std::time::Duration;

use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use reqwest::Client;
use url::Url;

use super::{PaperSource, RetrieverError, normalize_whitespace};
use crate::model::{ArxivConfig, PaperCandidate};

/// arXiv query category for a research field tag
fn field_category(field: &str) -> Option<&'static str> {
    let normalized = field.trim().to_lowercase().replace([' ', '-'], "_");
    match normalized.as_str() {
        "computer_science" => Some("cs.*"),
        "physics" => Some("physics.*"),
        "mathematics" => Some("math.*"),
        "biology" | "medicine" => Some("q-bio.*"),
        "neuroscience" | "psychology" => Some("q-bio.NC"),
        "chemistry" => Some("physics.chem-ph"),
        _ => None,
    }
}

/// Client for the arXiv search API
pub struct ArxivClient {
    client: Client,
    base_url: String,
}

impl ArxivClient {
    /// Create a new arXiv client
    pub fn new(config: &ArxivConfig) -> Result<Self, RetrieverError> {
        let base_url = config.base_url.clone();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("research-gap-finder/0.1")
            .build()?;

        tracing::info!(base_url = %base_url, "arXiv client initialized");

        Ok(Self { client, base_url })
    }

    fn search_url(&self, topic: &str, field: &str, limit: usize) -> Result<Url, RetrieverError> {
        let mut query = format!("all:{}", topic.trim());
        if let Some(category) = field_category(field) {
            query.push_str(&format!(" AND cat:{}", category));
        }

        Ok(Url::parse_with_params(
            &self.base_url,
            &[
                ("search_query", query.as_str()),
                ("start", "0"),
                ("max_results", &limit.to_string()),
                ("sortBy", "relevance"),
            ],
        )?)
    }
}

#[async_trait]
impl PaperSource for ArxivClient {
    async fn fetch(
        &self,
        topic: &str,
        field: &str,
        limit: usize,
    ) -> Result<Vec<PaperCandidate>, RetrieverError> {
        let url = self.search_url(topic, field, limit)?;

        tracing::debug!(topic = %topic, field = %field, url = %url, "Fetching papers from arXiv");

        let response = self.client.get(url.as_str()).send().await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(topic = %topic, "arXiv rate limited");
            return Err(RetrieverError::RateLimited);
        }

        if !response.status().is_success() {
            return Err(RetrieverError::ParseError(format!(
                "HTTP {}: {}",
                response.status(),
                url
            )));
        }

        let body = response.text().await?;
        let mut papers = parse_feed(&body)?;
        papers.truncate(limit);

        tracing::info!(topic = %topic, papers = papers.len(), "Fetched papers from arXiv");

        Ok(papers)
    }

    fn name(&self) -> &'static str {
        "arxiv"
    }
}

#[derive(Default)]
struct EntryBuilder {
    title: String,
    summary: String,
    id: String,
    published: String,
    authors: Vec<String>,
    author_name: String,
    categories: Vec<String>,
}

impl EntryBuilder {
    fn build(self) -> Option<PaperCandidate> {
        let id = self.id.trim().to_string();
        // arXiv reports query errors as entries
        if id.contains("/api/errors") {
            tracing::warn!(error = %normalize_whitespace(&self.summary), "arXiv returned an error entry");
            return None;
        }

        let title = normalize_whitespace(&self.title);
        let abstract_text = normalize_whitespace(&self.summary);
        if title.is_empty() || abstract_text.is_empty() {
            return None;
        }

        let published = self.published.trim();
        Some(PaperCandidate {
            title,
            authors: self.authors,
            abstract_text,
            url: (!id.is_empty()).then_some(id),
            published: (!published.is_empty()).then(|| published.to_string()),
            categories: self.categories,
        })
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn category_term(e: &BytesStart<'_>) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == b"term")
        .and_then(|attr| attr.unescape_value().ok())
        .map(|term| term.trim().to_string())
        .filter(|term| !term.is_empty())
}

/// Parse an arXiv Atom feed into paper candidates
fn parse_feed(xml: &str) -> Result<Vec<PaperCandidate>, RetrieverError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut entry: Option<EntryBuilder> = None;
    let mut papers = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = local_name(e);
                if name == "entry" {
                    entry = Some(EntryBuilder::default());
                } else if name == "category"
                    && let Some(current) = entry.as_mut()
                    && let Some(term) = category_term(e)
                {
                    current.categories.push(term);
                }
                stack.push(name);
            }
            Ok(Event::Empty(ref e)) => {
                if local_name(e) == "category"
                    && let Some(current) = entry.as_mut()
                    && let Some(term) = category_term(e)
                {
                    current.categories.push(term);
                }
            }
            Ok(Event::End(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                stack.pop();
                match name.as_str() {
                    "entry" => {
                        if let Some(paper) = entry.take().and_then(EntryBuilder::build) {
                            papers.push(paper);
                        }
                    }
                    "author" => {
                        if let Some(current) = entry.as_mut() {
                            let author = normalize_whitespace(&current.author_name);
                            if !author.is_empty() {
                                current.authors.push(author);
                            }
                            current.author_name.clear();
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                if let Some(current) = entry.as_mut() {
                    let text = e
                        .unescape()
                        .map_err(|e| RetrieverError::ParseError(e.to_string()))?;
                    append_text(current, &stack, &text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(current) = entry.as_mut() {
                    let bytes = e.into_inner();
                    append_text(current, &stack, &String::from_utf8_lossy(&bytes));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(RetrieverError::ParseError(format!(
                    "Invalid Atom feed at position {}: {}",
                    reader.error_position(),
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(papers)
}

/// Route element text to the entry field it belongs to
fn append_text(entry: &mut EntryBuilder, stack: &[String], text: &str) {
    let Some(current) = stack.last() else {
        return;
    };
    let parent = stack
        .len()
        .checked_sub(2)
        .and_then(|i| stack.get(i))
        .map(String::as_str);

    let target = match (parent, current.as_str()) {
        (Some("entry"), "title") => &mut entry.title,
        (Some("entry"), "summary") => &mut entry.summary,
        (Some("entry"), "id") => &mut entry.id,
        (Some("entry"), "published") => &mut entry.published,
        (Some("author"), "name") => &mut entry.author_name,
        _ => return,
    };
    target.push_str(text);
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title type="html">ArXiv Query: search_query=all:sleep</title>
  <id>http://arxiv.org/api/abc</id>
  <entry>
    <id>http://arxiv.org/abs/2401.00001v1</id>
    <published>2024-01-01T00:00:00Z</published>
    <title>Sleep Spindles and
      Memory &amp; Learning</title>
    <summary>  We study spindles
      in 40 adults.  </summary>
    <author><name>Ada Lovelace</name></author>
    <author><name> Alan Turing </name><arxiv:affiliation>Cambridge</arxiv:affiliation></author>
    <arxiv:primary_category term="q-bio.NC" scheme="http://arxiv.org/schemas/atom"/>
    <category term="q-bio.NC" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2401.00002v1</id>
    <title>No abstract here</title>
    <summary>   </summary>
  </entry>
  <entry>
    <id>http://arxiv.org/api/errors#incorrect_id_format</id>
    <title>Error</title>
    <summary>incorrect id format</summary>
  </entry>
</feed>"#;

    #[test]
    fn test_parses_feed_entries() {
        let papers = parse_feed(FEED).unwrap();

        assert_eq!(papers.len(), 1);
        let paper = &papers[0];
        assert_eq!(paper.title, "Sleep Spindles and Memory & Learning");
        assert_eq!(paper.abstract_text, "We study spindles in 40 adults.");
        assert_eq!(paper.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(paper.url.as_deref(), Some("http://arxiv.org/abs/2401.00001v1"));
        assert_eq!(paper.published.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(paper.categories, vec!["q-bio.NC", "cs.LG"]);
    }

    #[test]
    fn test_empty_feed_has_no_papers() {
        let feed = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>empty</title></feed>"#;
        assert!(parse_feed(feed).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_feed_is_error() {
        assert!(matches!(
            parse_feed("<feed><entry><title>x</entry></feed>"),
            Err(RetrieverError::ParseError(_))
        ));
    }

    #[test]
    fn test_search_url_includes_category() {
        let client = ArxivClient {
            client: Client::new(),
            base_url: "http://export.arxiv.org/api/query".to_string(),
        };

        let url = client.search_url("sleep memory", "neuroscience", 5).unwrap();
        let params: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(params.contains(&(
            "search_query".to_string(),
            "all:sleep memory AND cat:q-bio.NC".to_string()
        )));
        assert!(params.contains(&("max_results".to_string(), "5".to_string())));

        let url = client.search_url("graphs", "general", 3).unwrap();
        let query = url
            .query_pairs()
            .find(|(k, _)| k == "search_query")
            .map(|(_, v)| v.into_owned());
        assert_eq!(query.as_deref(), Some("all:graphs"));
    }

    #[tokio::test]
    #[ignore = "requires network access to export.arxiv.org"]
    async fn test_fetch_live() {
        let client = ArxivClient::new(&ArxivConfig::default()).unwrap();
        let papers = client.fetch("sleep memory consolidation", "neuroscience", 3).await.unwrap();
        assert!(papers.len() <= 3);
    }
}
