use crate::error::DigestError;

/// Validates rendered digest Markdown (§4.5 step 5): non-empty, contains at
/// least one `## N.` heading, contains `**Summary:**`, and has no stray
/// `[[`/`]]` (a template substitution gone wrong).
pub fn validate_markdown(markdown: &str) -> Result<(), DigestError> {
    if markdown.trim().is_empty() {
        return Err(DigestError::InvalidMarkdown("markdown is empty".into()));
    }
    if !markdown.lines().any(is_numbered_heading) {
        return Err(DigestError::InvalidMarkdown("missing a '## N.' heading".into()));
    }
    if !markdown.contains("**Summary:**") {
        return Err(DigestError::InvalidMarkdown("missing a '**Summary:**' line".into()));
    }
    if markdown.contains("[[") || markdown.contains("]]") {
        return Err(DigestError::InvalidMarkdown("contains stray '[[' or ']]'".into()));
    }
    Ok(())
}

fn is_numbered_heading(line: &str) -> bool {
    let Some(rest) = line.strip_prefix("## ") else { return false };
    let digits_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    digits_end > 0 && rest[digits_end..].starts_with('.')
}

/// One article's fields recovered from a rendered digest section.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleBlock {
    pub title: String,
    pub url: String,
    pub source: String,
    pub summary: String,
}

/// A block to post to the knowledge base: either a text paragraph or a
/// visual divider between articles.
#[derive(Debug, Clone, PartialEq)]
pub enum KbBlock {
    Paragraph(String),
    Divider,
}

/// Parses the rendered Markdown into per-article fields (§4.6 step 4):
/// split on `\n## N. `, then pull `[title](url)`, `**Source:** …`, and
/// `**Summary:** …` out of each section.
pub fn parse_sections(markdown: &str) -> Vec<ArticleBlock> {
    markdown
        .split("\n## ")
        .skip(1)
        .filter_map(parse_section)
        .collect()
}

fn parse_section(section: &str) -> Option<ArticleBlock> {
    let mut lines = section.lines();
    let heading = lines.next()?;
    let (title, url) = extract_link(heading)?;

    let mut source = String::new();
    let mut summary = String::new();
    for line in lines {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("**Source:**") {
            source = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("**Summary:**") {
            summary = rest.trim().to_string();
        }
    }
    Some(ArticleBlock { title, url, source, summary })
}

fn extract_link(line: &str) -> Option<(String, String)> {
    let open_bracket = line.find('[')?;
    let close_bracket = open_bracket + line[open_bracket..].find(']')?;
    let open_paren = close_bracket + line[close_bracket..].find('(')?;
    let close_paren = open_paren + line[open_paren..].find(')')?;
    let title = line[open_bracket + 1..close_bracket].to_string();
    let url = line[open_paren + 1..close_paren].to_string();
    Some((title, url))
}

/// Converts the parsed sections into the knowledge-base's block list: a
/// title/link paragraph, a source paragraph, a summary paragraph (truncated
/// separately by the publisher before the HTTP call), and a trailing divider
/// per article (§4.6 step 4).
pub fn to_kb_blocks(markdown: &str) -> Vec<KbBlock> {
    let mut blocks = Vec::new();
    for article in parse_sections(markdown) {
        blocks.push(KbBlock::Paragraph(format!("{} ({})", article.title, article.url)));
        blocks.push(KbBlock::Paragraph(format!("Source: {}", article.source)));
        blocks.push(KbBlock::Paragraph(format!("Summary: {}", article.summary)));
        blocks.push(KbBlock::Divider);
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# Developer Digest

## 1. [Async Rust Gets Faster](https://example.com/a)

**Source:** example-feed
**Summary:** A deep dive into scheduler improvements.

---

## 2. [Kubernetes 1.31 Released](https://example.com/b)

**Source:** example-feed
**Summary:** New features for workload autoscaling.

---
";

    #[test]
    fn valid_markdown_passes() {
        assert!(validate_markdown(SAMPLE).is_ok());
    }

    #[test]
    fn empty_markdown_fails() {
        assert!(validate_markdown("   ").is_err());
    }

    #[test]
    fn missing_summary_marker_fails() {
        let bad = "## 1. [a](b)\n**Source:** s\n";
        assert!(validate_markdown(bad).is_err());
    }

    #[test]
    fn stray_double_brackets_fail() {
        let bad = format!("{}\n[[unrendered_var]]", SAMPLE);
        assert!(validate_markdown(&bad).is_err());
    }

    #[test]
    fn parses_two_article_sections() {
        let sections = parse_sections(SAMPLE);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "Async Rust Gets Faster");
        assert_eq!(sections[0].url, "https://example.com/a");
        assert_eq!(sections[0].source, "example-feed");
        assert_eq!(sections[0].summary, "A deep dive into scheduler improvements.");
    }

    #[test]
    fn kb_blocks_include_divider_per_article() {
        let blocks = to_kb_blocks(SAMPLE);
        let dividers = blocks.iter().filter(|b| matches!(b, KbBlock::Divider)).count();
        assert_eq!(dividers, 2);
        assert_eq!(blocks.len(), 8);
    }
}
