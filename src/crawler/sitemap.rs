//! Sitemap discovery
//!
//! Seeds a job from the usual sitemap locations under the origin (`sitemap.xml`,
//! `sitemap_index.xml`, `sitemapindex.xml` and their `.gz` forms) and any sitemaps announced
//! in robots.txt. Both `<urlset>` and `<sitemapindex>` documents are understood, gzipped or
//! not; child sitemaps are followed a bounded number of levels. Every document goes through the [`FetcherPool`], so robots rules
//! and per-host politeness apply to sitemap requests too.

use crate::crawler::FetcherPool;
use crate::url::{canonicalize, origin_of};
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::collections::{HashSet, VecDeque};
use std::io::Read;
use tracing::{debug, info, warn};
use url::Url;

/// Deepest sitemap index nesting followed
pub const MAX_SITEMAP_DEPTH: usize = 3;

/// Most sitemap documents fetched per job
pub const MAX_SITEMAP_DOCUMENTS: usize = 25;

/// Largest uncompressed sitemap accepted (the sitemap protocol's own limit)
pub const MAX_SITEMAP_BYTES: u64 = 50 * 1024 * 1024;

/// Paths tried under the origin, in order
const SITEMAP_CANDIDATES: &[&str] = &[
    "sitemap.xml",
    "sitemap_index.xml",
    "sitemapindex.xml",
    "sitemap.xml.gz",
    "sitemap_index.xml.gz",
    "sitemapindex.xml.gz",
];

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A sitemap document; covers both `<urlset>` and `<sitemapindex>` roots
#[derive(Debug, Default, Deserialize)]
struct SitemapXml {
    #[serde(rename = "url", default)]
    urls: Vec<LocEntry>,

    #[serde(rename = "sitemap", default)]
    sitemaps: Vec<LocEntry>,
}

#[derive(Debug, Deserialize)]
struct LocEntry {
    #[serde(default)]
    loc: Option<String>,
}

/// Locations listed by one sitemap document
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SitemapDocument {
    /// Page URLs (`<urlset><url><loc>`)
    pub pages: Vec<String>,
    /// Child sitemap URLs (`<sitemapindex><sitemap><loc>`)
    pub children: Vec<String>,
}

/// Parses a sitemap or sitemap index document
pub fn parse_sitemap(xml: &str) -> Result<SitemapDocument, quick_xml::DeError> {
    let parsed: SitemapXml = quick_xml::de::from_str(xml)?;

    let locs = |entries: Vec<LocEntry>| -> Vec<String> {
        entries
            .into_iter()
            .filter_map(|e| e.loc)
            .map(|loc| loc.trim().to_string())
            .filter(|loc| !loc.is_empty())
            .collect()
    };

    Ok(SitemapDocument {
        pages: locs(parsed.urls),
        children: locs(parsed.sitemaps),
    })
}

/// Turns a fetched sitemap body into XML text, gunzipping it when it is gzip data
///
/// Servers that set `Content-Encoding: gzip` are already decoded by the HTTP client; this
/// handles `.gz` files served as plain bytes.
pub fn decode_sitemap_body(body: &[u8]) -> std::io::Result<String> {
    if !body.starts_with(&GZIP_MAGIC) {
        return Ok(String::from_utf8_lossy(body).into_owned());
    }

    let mut xml = Vec::new();
    GzDecoder::new(body)
        .take(MAX_SITEMAP_BYTES + 1)
        .read_to_end(&mut xml)?;
    if xml.len() as u64 > MAX_SITEMAP_BYTES {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("sitemap expands beyond {} bytes", MAX_SITEMAP_BYTES),
        ));
    }

    Ok(String::from_utf8_lossy(&xml).into_owned())
}

/// Collects page URLs from the site's sitemaps
///
/// Unreachable or malformed documents are logged and skipped; discovery never fails a job.
///
/// # Returns
///
/// Canonical page URLs in document order, without duplicates. Scope is not applied here.
pub async fn discover_sitemap_urls(pool: &FetcherPool, base_url: &Url) -> Vec<Url> {
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    if let Some(origin) = origin_of(base_url) {
        for candidate in SITEMAP_CANDIDATES {
            queue.push_back((format!("{}/{}", origin, candidate), 1));
        }
    }
    for announced in pool.robots_sitemaps(base_url).await {
        queue.push_back((announced, 1));
    }

    let mut visited: HashSet<String> = HashSet::new();
    let mut seen_pages: HashSet<Url> = HashSet::new();
    let mut pages = Vec::new();
    let mut fetched = 0;

    while let Some((location, level)) = queue.pop_front() {
        if fetched >= MAX_SITEMAP_DOCUMENTS {
            debug!("Sitemap document limit reached, {} left unvisited", queue.len() + 1);
            break;
        }

        let Ok(sitemap_url) = canonicalize(&location) else {
            debug!("Skipping invalid sitemap location {}", location);
            continue;
        };
        if !visited.insert(sitemap_url.to_string()) {
            continue;
        }

        fetched += 1;
        let response = match pool.fetch(&sitemap_url).await {
            Ok(response) => response,
            Err(e) => {
                debug!("No sitemap at {}: {}", sitemap_url, e);
                continue;
            }
        };

        let xml = match decode_sitemap_body(&response.body) {
            Ok(xml) => xml,
            Err(e) => {
                warn!("Ignoring undecodable sitemap {}: {}", sitemap_url, e);
                continue;
            }
        };

        let document = match parse_sitemap(&xml) {
            Ok(document) => document,
            Err(e) => {
                warn!("Ignoring malformed sitemap {}: {}", sitemap_url, e);
                continue;
            }
        };

        for loc in document.pages {
            match canonicalize(&loc) {
                Ok(url) => {
                    if seen_pages.insert(url.clone()) {
                        pages.push(url);
                    }
                }
                Err(e) => debug!("Skipping sitemap entry {}: {}", loc, e),
            }
        }

        if level < MAX_SITEMAP_DEPTH {
            queue.extend(document.children.into_iter().map(|child| (child, level + 1)));
        } else if !document.children.is_empty() {
            debug!("Not following sitemaps nested below {}", sitemap_url);
        }
    }

    info!("Sitemaps listed {} page URLs", pages.len());
    pages
}
