use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Fetches a URL and reduces it to plain text for summarization (§4.4 step
/// 2). The core's `Analyzer` handler only needs this narrow trait, so a test
/// double can stand in without a network.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<String, ExtractError>;
}

/// `reqwest` + `scraper` adapter: GET with redirects followed, a standard
/// User-Agent, and a 30s timeout (§4.4 step 2), then a readability-style
/// strip of script/style/nav/footer boilerplate before flattening to text.
pub struct HtmlExtractor {
    client: reqwest::Client,
}

impl HtmlExtractor {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("ravedigest-analyzer/1.0 (+https://github.com/ravedigest)")
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .expect("reqwest client configuration is static and valid");
        Self { client }
    }
}

impl Default for HtmlExtractor {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl ContentExtractor for HtmlExtractor {
    async fn extract(&self, url: &str) -> Result<String, ExtractError> {
        let response = self.client.get(url).send().await?;
        let body = response.text().await?;
        Ok(html_to_text(&body))
    }
}

/// Strips script/style/nav/footer/header/aside elements, then concatenates
/// the remaining text nodes with whitespace normalized. An empty result is
/// permissible per §4.4 step 2.
fn html_to_text(body: &str) -> String {
    let document = Html::parse_document(body);
    let skip_selector = Selector::parse("script, style, nav, footer, header, aside, noscript")
        .expect("static selector is valid");
    let skip_ids: std::collections::HashSet<_> = document
        .select(&skip_selector)
        .flat_map(|el| el.descendants().map(|n| n.id()))
        .collect();

    let mut text = String::new();
    for node in document.root_element().descendants() {
        if skip_ids.contains(&node.id()) {
            continue;
        }
        if let Some(t) = node.value().as_text() {
            let trimmed = t.trim();
            if !trimmed.is_empty() {
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(trimmed);
            }
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_and_style() {
        let html = r#"
            <html><body>
                <script>var x = 1;</script>
                <style>.a { color: red; }</style>
                <p>Hello world</p>
            </body></html>
        "#;
        let text = html_to_text(html);
        assert!(text.contains("Hello world"));
        assert!(!text.contains("var x"));
        assert!(!text.contains("color: red"));
    }

    #[test]
    fn empty_body_yields_empty_text() {
        assert_eq!(html_to_text("<html><body></body></html>"), "");
    }

    #[test]
    fn drops_nav_and_footer_boilerplate() {
        let html = r#"
            <html><body>
                <nav>Home About Contact</nav>
                <article><p>The actual article content.</p></article>
                <footer>Copyright 2026</footer>
            </body></html>
        "#;
        let text = html_to_text(html);
        assert!(text.contains("actual article content"));
        assert!(!text.contains("Home About Contact"));
        assert!(!text.contains("Copyright"));
    }
}
