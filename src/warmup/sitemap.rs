use super::WarmupError;

/// A parsed sitemap: either page URLs or links to further sitemaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    UrlSet(Vec<String>),
    Index(Vec<String>),
}

impl SitemapDocument {
    pub fn locations(&self) -> &[String] {
        match self {
            Self::UrlSet(locs) | Self::Index(locs) => locs,
        }
    }
}

/// Extracts every `<loc>` from a sitemap or sitemap index.
pub fn parse_sitemap(xml: &str) -> Result<SitemapDocument, WarmupError> {
    let locs = extract_locs(xml)?;
    if xml.contains("<sitemapindex") {
        Ok(SitemapDocument::Index(locs))
    } else if xml.contains("<urlset") || !locs.is_empty() {
        Ok(SitemapDocument::UrlSet(locs))
    } else {
        Err(WarmupError::Sitemap(
            "expected a <urlset> or <sitemapindex> document".to_string(),
        ))
    }
}

fn extract_locs(xml: &str) -> Result<Vec<String>, WarmupError> {
    const OPEN: &str = "<loc>";
    const CLOSE: &str = "</loc>";

    let mut locs = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find(OPEN) {
        let after = &rest[start + OPEN.len()..];
        let end = after
            .find(CLOSE)
            .ok_or_else(|| WarmupError::Sitemap("unterminated <loc>".to_string()))?;
        let value = unescape(strip_cdata(after[..end].trim()));
        if !value.is_empty() {
            locs.push(value);
        }
        rest = &after[end + CLOSE.len()..];
    }
    Ok(locs)
}

fn strip_cdata(raw: &str) -> &str {
    raw.strip_prefix("<![CDATA[")
        .and_then(|inner| inner.strip_suffix("]]>"))
        .map(str::trim)
        .unwrap_or(raw)
}

fn unescape(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
