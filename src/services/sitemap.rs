use crate::error::{CoreError, CoreResult};
use log::debug;
use quick_xml::Reader;
use quick_xml::events::Event;

/// Paths probed in order on a project's main domain; the first one that
/// returns a parseable sitemap wins. Matches the common generator
/// conventions (Yoast, WordPress core) rather than relying on robots.txt.
const SITEMAP_CANDIDATES: [&str; 4] = [
    "/sitemap_index.xml",
    "/sitemap-index.xml",
    "/sitemap.xml",
    "/wp-sitemap.xml",
];

#[derive(Debug, Clone)]
pub struct SitemapEntry {
    pub loc: String,
    pub url_count: usize,
}

/// Read-only sitemap discovery: never a submission channel, only a way to
/// enumerate a project's candidate URLs. Recurses exactly one level into a
/// sitemap index (child sitemap indices are not followed further).
pub async fn discover_sitemap_index(client: &reqwest::Client, domain: &str) -> CoreResult<Option<Vec<SitemapEntry>>> {
    for path in SITEMAP_CANDIDATES {
        let url = format!("https://{}{}", domain, path);
        let response = match client.get(&url).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(_) => continue,
            Err(e) => {
                debug!("sitemap probe failed for {}: {}", url, e);
                continue;
            }
        };
        let body = match response.text().await {
            Ok(b) => b,
            Err(_) => continue,
        };

        match parse_sitemap_document(&body) {
            Ok(SitemapDocument::Index(locs)) if !locs.is_empty() => {
                let mut entries = Vec::with_capacity(locs.len());
                for loc in locs {
                    let count = fetch_sitemap_url_count(client, &loc).await.unwrap_or(0);
                    entries.push(SitemapEntry { loc, url_count: count });
                }
                return Ok(Some(entries));
            }
            Ok(SitemapDocument::UrlSet(locs)) => {
                return Ok(Some(vec![SitemapEntry {
                    loc: url,
                    url_count: locs.len(),
                }]));
            }
            _ => continue,
        }
    }

    Ok(None)
}

/// Fetches every `<loc>` URL from a sitemap, recursing into child sitemaps
/// when the document is an index.
pub async fn fetch_sitemap_urls(client: &reqwest::Client, sitemap_url: &str) -> CoreResult<Vec<String>> {
    let mut urls = Vec::new();
    let mut visited = std::collections::HashSet::new();
    fetch_sitemap_recursive(client, sitemap_url, &mut urls, &mut visited).await?;
    Ok(urls)
}

fn fetch_sitemap_recursive<'a>(
    client: &'a reqwest::Client,
    sitemap_url: &'a str,
    urls: &'a mut Vec<String>,
    visited: &'a mut std::collections::HashSet<String>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = CoreResult<()>> + Send + 'a>> {
    Box::pin(async move {
        if !visited.insert(sitemap_url.to_string()) {
            return Ok(());
        }

        let response = client.get(sitemap_url).send().await?;
        let body = response.text().await.map_err(|e| CoreError::Transport(e.to_string()))?;

        match parse_sitemap_document(&body)? {
            SitemapDocument::Index(locs) => {
                for loc in locs {
                    fetch_sitemap_recursive(client, &loc, urls, visited).await?;
                }
            }
            SitemapDocument::UrlSet(locs) => urls.extend(locs),
        }
        Ok(())
    })
}

async fn fetch_sitemap_url_count(client: &reqwest::Client, sitemap_url: &str) -> CoreResult<usize> {
    let response = client.get(sitemap_url).send().await?;
    if !response.status().is_success() {
        return Ok(0);
    }
    let body = response.text().await.map_err(|e| CoreError::Transport(e.to_string()))?;
    match parse_sitemap_document(&body)? {
        SitemapDocument::UrlSet(locs) => Ok(locs.len()),
        SitemapDocument::Index(locs) => Ok(locs.len()),
    }
}

enum SitemapDocument {
    Index(Vec<String>),
    UrlSet(Vec<String>),
}

/// Parses a sitemap XML document (either a `<sitemapindex>` or a
/// `<urlset>`) into a flat list of `<loc>` text contents, ignoring the
/// `http://www.sitemaps.org/schemas/sitemap/0.9` namespace prefix the way
/// the source's `tag.split("}")[-1]` strip did.
fn parse_sitemap_document(xml: &str) -> CoreResult<SitemapDocument> {
    let mut reader = Reader::from_str(xml.trim_start());
    reader.config_mut().trim_text = true;

    let mut is_index = false;
    let mut locs = Vec::new();
    let mut in_loc = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(e.name().as_ref());
                match name {
                    "sitemapindex" => is_index = true,
                    "loc" => in_loc = true,
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                if local_name(e.name().as_ref()) == "loc" {
                    in_loc = false;
                }
            }
            Ok(Event::Text(e)) => {
                if in_loc {
                    let text = e
                        .unescape()
                        .map_err(|err| CoreError::Validation(format!("malformed sitemap XML: {}", err)))?
                        .trim()
                        .to_string();
                    if !text.is_empty() {
                        locs.push(text);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(CoreError::Validation(format!("malformed sitemap XML: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(if is_index {
        SitemapDocument::Index(locs)
    } else {
        SitemapDocument::UrlSet(locs)
    })
}

fn local_name(qname: &[u8]) -> &str {
    let s = std::str::from_utf8(qname).unwrap_or("");
    s.rsplit(':').next().unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_urlset_locs() {
        let xml = r#"<?xml version="1.0"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
            <url><loc>https://example.com/a</loc></url>
            <url><loc>https://example.com/b</loc></url>
        </urlset>"#;
        match parse_sitemap_document(xml).unwrap() {
            SitemapDocument::UrlSet(locs) => assert_eq!(locs, vec!["https://example.com/a", "https://example.com/b"]),
            _ => panic!("expected urlset"),
        }
    }

    #[test]
    fn parses_sitemapindex_locs() {
        let xml = r#"<?xml version="1.0"?>
        <sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
            <sitemap><loc>https://example.com/sitemap-1.xml</loc></sitemap>
        </sitemapindex>"#;
        match parse_sitemap_document(xml).unwrap() {
            SitemapDocument::Index(locs) => assert_eq!(locs, vec!["https://example.com/sitemap-1.xml"]),
            _ => panic!("expected index"),
        }
    }
}
