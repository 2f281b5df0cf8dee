//! Minijinja template rendering for digest Markdown bodies.
//!
//! Templates are arbitrary strings (not pre-registered), so a fresh
//! [`minijinja::Environment`] is created per render call — the same choice
//! the teacher's notification templating makes, since these templates are
//! rendered at most a few times a day and the simplicity of not caching a
//! long-lived environment outweighs the per-call setup cost.

use ravedigest_core::domain::RankedArticle;
use serde::Serialize;

use crate::error::DigestError;

/// Context data available to the digest Markdown template.
#[derive(Debug, Clone, Serialize)]
pub struct DigestContext {
    pub title: String,
    pub articles: Vec<RankedArticle>,
}

/// The default digest template: one numbered section per article, each with
/// a `**Source:**` and `**Summary:**` line, matching the structural
/// validation rules in [`crate::parser::validate_markdown`].
pub const DEFAULT_TEMPLATE: &str = "\
# {{ title }}

{% for article in articles -%}
## {{ loop.index }}. [{{ article.title }}]({{ article.url }})

**Source:** {{ article.source }}
**Summary:** {{ article.summary }}

---

{% endfor %}";

/// Renders digest templates using minijinja.
#[derive(Debug, Default)]
pub struct TemplateRenderer {
    _private: (),
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self { _private: () }
    }

    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        env.add_filter("round", round_filter);
        env
    }

    /// Render a template string with the given context.
    pub fn render(&self, template_str: &str, ctx: &DigestContext) -> Result<String, DigestError> {
        let env = Self::build_env();
        env.render_str(template_str, ctx)
            .map_err(|e| DigestError::Template(e.to_string()))
    }

    /// Validate that a template string parses without errors.
    pub fn validate(&self, template_str: &str) -> Result<(), DigestError> {
        let env = Self::build_env();
        env.template_from_str(template_str)
            .map_err(|e| DigestError::Template(e.to_string()))?;
        Ok(())
    }
}

fn round_filter(value: f64, decimals: Option<u32>) -> String {
    let n = decimals.unwrap_or(0);
    format!("{:.prec$}", value, prec = n as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_context() -> DigestContext {
        DigestContext {
            title: "Developer Digest — 2026-07-27".to_string(),
            articles: vec![
                RankedArticle {
                    title: "Async Rust Gets Faster".to_string(),
                    url: "https://example.com/a".to_string(),
                    source: "example-feed".to_string(),
                    summary: "A deep dive into scheduler improvements.".to_string(),
                    relevance_score: 0.92,
                },
                RankedArticle {
                    title: "Kubernetes 1.31 Released".to_string(),
                    url: "https://example.com/b".to_string(),
                    source: "example-feed".to_string(),
                    summary: "New features for workload autoscaling.".to_string(),
                    relevance_score: 0.81,
                },
            ],
        }
    }

    #[test]
    fn renders_default_template_with_numbered_sections() {
        let renderer = TemplateRenderer::new();
        let rendered = renderer.render(DEFAULT_TEMPLATE, &sample_context()).unwrap();
        assert!(rendered.contains("## 1. [Async Rust Gets Faster]"));
        assert!(rendered.contains("## 2. [Kubernetes 1.31 Released]"));
        assert!(rendered.contains("**Summary:** A deep dive"));
    }

    #[test]
    fn render_round_filter() {
        let renderer = TemplateRenderer::new();
        let template = "{{ articles.0.relevance_score | round(1) }}";
        let result = renderer.render(template, &sample_context()).unwrap();
        assert_eq!(result, "0.9");
    }

    #[test]
    fn invalid_template_produces_error() {
        let renderer = TemplateRenderer::new();
        let result = renderer.render("{{ unclosed", &sample_context());
        assert!(result.is_err());
    }

    #[test]
    fn validate_catches_syntax_errors_without_rendering() {
        let renderer = TemplateRenderer::new();
        assert!(renderer.validate(DEFAULT_TEMPLATE).is_ok());
        assert!(renderer.validate("{% for x in %}").is_err());
    }
}
