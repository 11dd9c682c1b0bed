//! Google Scholar profile provider.
//!
//! Fetches the public citations page of a profile over HTTP and parses it
//! into a [`RawProfile`]. Requests optionally go through a proxy that is
//! validated before use.

use crate::error::{OptionExt, Result, ScraperError};
use crate::profile::{AuthorDetails, Publication, RawProfile};
use crate::provider::{AuthorHandle, ProfileProvider, ProxyStatus, Section};
use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Default Google Scholar URL
pub const DEFAULT_SCHOLAR_URL: &str = "https://scholar.google.com";

/// User agent string for requests
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Largest page size the citations page accepts
pub const MAX_PAGE_SIZE: usize = 100;

/// Upper bound on publication pages fetched for one profile
const MAX_PAGES: usize = 50;

/// Time allowed for a proxy to answer the probe request
const PROXY_PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Connection options for [`ScholarProvider`]
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    /// Base URL, overridable for mirror sites
    pub base_url: String,
    /// Proxy candidates, tried in order when a proxy is requested
    pub proxies: Vec<String>,
    /// Publications per page request
    pub page_size: usize,
    /// Pause between publication pages (plus up to 1s of jitter)
    pub page_delay: Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SCHOLAR_URL.to_string(),
            proxies: Vec::new(),
            page_size: MAX_PAGE_SIZE,
            page_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP provider backed by the Google Scholar citations page
#[derive(Debug, Clone)]
pub struct ScholarProvider {
    client: reqwest::Client,
    base_url: String,
    options: ProviderOptions,
}

impl ScholarProvider {
    /// Build a provider that connects directly.
    pub fn direct(options: ProviderOptions) -> Result<Self> {
        let client = build_http_client(None, options.request_timeout)?;
        Ok(Self::with_client(client, options))
    }

    /// Build a provider, acquiring a working proxy first when `use_proxy`
    /// is set.
    ///
    /// Proxy failure is not an error: the provider falls back to direct
    /// requests and reports [`ProxyStatus::Unavailable`].
    pub async fn configure(options: ProviderOptions, use_proxy: bool) -> Result<(Self, ProxyStatus)> {
        if !use_proxy {
            info!("No proxy requested, connecting directly");
            return Ok((Self::direct(options)?, ProxyStatus::Direct));
        }

        let base_url = normalize_base_url(&options.base_url);
        let candidates = options.proxies.clone();
        for candidate in &candidates {
            let client = match build_http_client(Some(candidate.as_str()), options.request_timeout) {
                Ok(client) => client,
                Err(e) => {
                    warn!(proxy = %candidate, error = %e, "Skipping invalid proxy");
                    continue;
                }
            };

            match probe(&client, &base_url).await {
                Ok(()) => {
                    info!(proxy = %candidate, "Proxy configured");
                    let status = ProxyStatus::Proxied(candidate.clone());
                    return Ok((Self::with_client(client, options), status));
                }
                Err(e) => warn!(proxy = %candidate, error = %e, "Proxy probe failed"),
            }
        }

        warn!(candidates = candidates.len(), "No working proxy, connecting directly");
        Ok((Self::direct(options)?, ProxyStatus::Unavailable))
    }

    fn with_client(client: reqwest::Client, options: ProviderOptions) -> Self {
        Self {
            client,
            base_url: normalize_base_url(&options.base_url),
            options,
        }
    }

    fn page_size(&self) -> usize {
        self.options.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    async fn fetch_profile_page(&self, scholar_id: &str, cstart: usize) -> Result<String> {
        let url = build_profile_url(&self.base_url, scholar_id, cstart, self.page_size())?;
        debug!(scholar_id, cstart, url = %url, "Fetching profile page");

        let html = fetch_page(&self.client, &url).await.map_err(|e| match e {
            ScraperError::Api { code: 404, .. } => ScraperError::AuthorNotFound(scholar_id.to_string()),
            other => other,
        })?;

        if is_captcha(&html) {
            warn!(scholar_id, cstart, "CAPTCHA detected");
            return Err(ScraperError::Captcha);
        }
        Ok(html)
    }

    async fn pause_between_pages(&self) {
        if self.options.page_delay.is_zero() {
            return;
        }
        let jitter = Duration::from_millis(rand::random::<u64>() % 1000);
        tokio::time::sleep(self.options.page_delay + jitter).await;
    }
}

#[async_trait]
impl ProfileProvider for ScholarProvider {
    async fn search_author_id(&self, scholar_id: &str) -> Result<AuthorHandle> {
        let html = self.fetch_profile_page(scholar_id, 0).await?;
        let name = parse_author_name(&html)?;
        info!(scholar_id, name = %name, "Resolved author");
        Ok(AuthorHandle {
            scholar_id: scholar_id.to_string(),
            name: Some(name),
        })
    }

    async fn fill(&self, author: &AuthorHandle, sections: &[Section]) -> Result<RawProfile> {
        let scholar_id = author.scholar_id.as_str();
        let html = self.fetch_profile_page(scholar_id, 0).await?;
        let page = parse_profile_page(&html, scholar_id, &self.base_url)?;
        let details = retain_sections(page.details, sections);

        let mut publications = Vec::new();
        if sections.contains(&Section::Publications) {
            let page_size = self.page_size();
            let mut last_count = page.publications.len();
            publications.extend(page.publications);

            let mut pages = 1;
            while last_count >= page_size && pages < MAX_PAGES {
                self.pause_between_pages().await;
                let html = self.fetch_profile_page(scholar_id, pages * page_size).await?;
                let rows = parse_publication_rows(&html, &self.base_url)?;
                last_count = rows.len();
                publications.extend(rows);
                pages += 1;
            }
            if pages == MAX_PAGES && last_count >= page_size {
                warn!(scholar_id, pages, "Stopped paging at the page limit");
            }
        }

        info!(
            scholar_id,
            sections = ?sections,
            publications = publications.len(),
            "Filled author"
        );
        Ok(RawProfile { details, publications })
    }
}

/// Build HTTP client with optional proxy
fn build_http_client(proxy: Option<&str>, timeout: Duration) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .cookie_store(true);

    if let Some(proxy_url) = proxy {
        let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
            ScraperError::Config(format!("Invalid proxy URL '{}': {}", proxy_url, e))
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| ScraperError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Check that the provider is reachable through a client
async fn probe(client: &reqwest::Client, base_url: &str) -> Result<()> {
    let response = client
        .get(base_url)
        .timeout(PROXY_PROBE_TIMEOUT)
        .send()
        .await?;
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(ScraperError::Api {
            code: status.as_u16(),
            message: format!("Proxy probe returned {}", status),
        })
    }
}

fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Build the citations page URL for one page of a profile
fn build_profile_url(base_url: &str, scholar_id: &str, cstart: usize, page_size: usize) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/citations", base_url))
        .map_err(|e| ScraperError::Config(format!("Invalid base URL: {}", e)))?;

    {
        let mut params = url.query_pairs_mut();
        params.append_pair("user", scholar_id);
        params.append_pair("hl", "en"); // Force English locale for consistent parsing
        params.append_pair("cstart", &cstart.to_string());
        params.append_pair("pagesize", &page_size.to_string());
    }

    Ok(url)
}

/// Fetch page content using HTTP client
async fn fetch_page(client: &reqwest::Client, url: &Url) -> Result<String> {
    let response = client
        .get(url.as_str())
        .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
        .header("Accept-Language", "en-US,en;q=0.9")
        .send()
        .await?;

    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);
        return Err(ScraperError::RateLimited(retry_after));
    }

    if !status.is_success() {
        return Err(ScraperError::Api {
            code: status.as_u16(),
            message: format!("HTTP error: {}", status),
        });
    }

    Ok(response.text().await?)
}

fn is_captcha(html: &str) -> bool {
    html.contains("gs_captcha") || html.contains("unusual traffic") || html.contains("Solving the above CAPTCHA")
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScraperError::Parse(e.to_string()))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn first_text(scope: ElementRef<'_>, sel: &Selector) -> Option<String> {
    scope
        .select(sel)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

/// Parse a count such as "1,234"; empty text means zero
fn parse_count(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return if text.trim().is_empty() { Some(0) } else { None };
    }
    digits.parse().ok()
}

fn absolute_url(base_url: &str, href: &str) -> Option<String> {
    let base = Url::parse(base_url).ok()?;
    base.join(href).ok().map(String::from)
}

/// Profile page contents, before section filtering
struct ProfilePage {
    details: AuthorDetails,
    publications: Vec<Publication>,
}

fn parse_author_name(html: &str) -> Result<String> {
    let document = Html::parse_document(html);
    let name_selector = selector("#gsc_prf_in")?;
    first_text(document.root_element(), &name_selector).ok_or_parse("profile name not found")
}

/// Parse the first page of a profile: header, metrics, histogram and the
/// first batch of publications.
fn parse_profile_page(html: &str, scholar_id: &str, base_url: &str) -> Result<ProfilePage> {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let name_selector = selector("#gsc_prf_in")?;
    let affiliation_selector = selector("div.gsc_prf_il")?;
    let verified_selector = selector("#gsc_prf_ivh")?;
    let homepage_selector = selector("#gsc_prf_ivh a")?;
    let interest_selector = selector("#gsc_prf_int a")?;
    let picture_selector = selector("#gsc_prf_pup-img")?;
    let metric_selector = selector("#gsc_rsb_st td.gsc_rsb_std")?;

    let email_regex = Regex::new(r"Verified email at\s+([^\s]+)").map_err(|e| ScraperError::Parse(e.to_string()))?;

    let name = first_text(root, &name_selector).ok_or_parse("profile name not found")?;

    // The verified-email line shares the affiliation class
    let affiliation = root
        .select(&affiliation_selector)
        .next()
        .filter(|el| el.value().id() != Some("gsc_prf_ivh") && el.value().id() != Some("gsc_prf_int"))
        .map(element_text)
        .filter(|t| !t.is_empty());

    let email_domain = first_text(root, &verified_selector)
        .and_then(|text| email_regex.captures(&text).and_then(|c| c.get(1)).map(|m| format!("@{}", m.as_str())));

    let homepage = root
        .select(&homepage_selector)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string);

    let interests = root
        .select(&interest_selector)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect();

    let url_picture = root
        .select(&picture_selector)
        .next()
        .and_then(|img| img.value().attr("src"))
        .and_then(|src| absolute_url(base_url, src));

    // Citations, h-index, i10-index; each as (all time, last five years)
    let metrics: Vec<Option<u64>> = root
        .select(&metric_selector)
        .map(|td| parse_count(&element_text(td)))
        .collect();
    let metric = |i: usize| metrics.get(i).copied().flatten();
    if metrics.len() < 6 {
        debug!(found = metrics.len(), "Citation metrics table incomplete");
    }

    let details = AuthorDetails {
        scholar_id: scholar_id.to_string(),
        name: Some(name),
        affiliation,
        interests,
        email_domain,
        homepage,
        url_picture,
        citedby: metric(0),
        citedby5y: metric(1),
        hindex: metric(2),
        hindex5y: metric(3),
        i10index: metric(4),
        i10index5y: metric(5),
        cites_per_year: parse_cites_per_year(&document)?,
        extra: Map::new(),
    };

    Ok(ProfilePage {
        details,
        publications: collect_publication_rows(&document, base_url)?,
    })
}

/// Citations-per-year histogram. Bars are positioned from the right by
/// their z-index; years without a bar have zero citations.
fn parse_cites_per_year(document: &Html) -> Result<BTreeMap<String, u64>> {
    let year_selector = selector(".gsc_md_hist_b .gsc_g_t")?;
    let bar_selector = selector(".gsc_md_hist_b .gsc_g_a")?;
    let count_selector = selector(".gsc_g_al")?;
    let z_index_regex = Regex::new(r"z-index:\s*(\d+)").map_err(|e| ScraperError::Parse(e.to_string()))?;

    let years: Vec<String> = document.select(&year_selector).map(element_text).collect();
    let mut counts = vec![0u64; years.len()];

    for bar in document.select(&bar_selector) {
        let position = bar
            .value()
            .attr("style")
            .and_then(|style| z_index_regex.captures(style))
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<usize>().ok());
        let count = first_text(bar, &count_selector).and_then(|t| parse_count(&t));

        match (position, count) {
            (Some(pos), Some(count)) if pos >= 1 && pos <= counts.len() => {
                let slot = counts.len() - pos;
                counts[slot] = count;
            }
            _ => debug!("Skipping unaligned histogram bar"),
        }
    }

    Ok(years.into_iter().zip(counts).collect())
}

fn parse_publication_rows(html: &str, base_url: &str) -> Result<Vec<Publication>> {
    let document = Html::parse_document(html);
    collect_publication_rows(&document, base_url)
}

fn collect_publication_rows(document: &Html, base_url: &str) -> Result<Vec<Publication>> {
    let row_selector = selector("tr.gsc_a_tr")?;
    let title_selector = selector("a.gsc_a_at")?;
    let gray_selector = selector("div.gs_gray")?;
    let cites_selector = selector("a.gsc_a_ac")?;
    let year_selector = selector("span.gsc_a_h")?;

    let mut publications = Vec::new();

    for row in document.select(&row_selector) {
        let Some(title_link) = row.select(&title_selector).next() else {
            continue;
        };

        let pub_id = title_link
            .value()
            .attr("href")
            .and_then(|href| absolute_url(base_url, href))
            .and_then(|href| Url::parse(&href).ok())
            .and_then(|url| {
                url.query_pairs()
                    .find(|(k, _)| k == "citation_for_view")
                    .map(|(_, v)| v.into_owned())
            });
        let Some(author_pub_id) = pub_id else {
            debug!(title = %element_text(title_link), "Publication row without id");
            continue;
        };

        let mut bib = Map::new();
        bib.insert("title".to_string(), Value::String(element_text(title_link)));

        let mut gray = row.select(&gray_selector).map(element_text);
        if let Some(authors) = gray.next().filter(|t| !t.is_empty()) {
            bib.insert("author".to_string(), Value::String(authors));
        }
        if let Some(citation) = gray.next().filter(|t| !t.is_empty()) {
            bib.insert("citation".to_string(), Value::String(citation));
        }
        if let Some(year) = first_text(row, &year_selector) {
            bib.insert("pub_year".to_string(), Value::String(year));
        }

        let mut extra = Map::new();
        let cites_link = row.select(&cites_selector).next();
        let num_citations = cites_link.and_then(|a| parse_count(&element_text(a)));
        if let Some(href) = cites_link
            .and_then(|a| a.value().attr("href"))
            .filter(|h| !h.is_empty())
            .and_then(|h| absolute_url(base_url, h))
        {
            extra.insert("citedby_url".to_string(), Value::String(href));
        }

        publications.push(Publication {
            author_pub_id,
            num_citations,
            bib,
            extra,
        });
    }

    Ok(publications)
}

/// Blank out the sections that were not requested
fn retain_sections(details: AuthorDetails, sections: &[Section]) -> AuthorDetails {
    let mut kept = AuthorDetails {
        scholar_id: details.scholar_id,
        ..Default::default()
    };

    if sections.contains(&Section::Basics) {
        kept.name = details.name;
        kept.affiliation = details.affiliation;
        kept.interests = details.interests;
        kept.email_domain = details.email_domain;
        kept.homepage = details.homepage;
        kept.url_picture = details.url_picture;
    }
    if sections.contains(&Section::Indices) {
        kept.citedby = details.citedby;
        kept.citedby5y = details.citedby5y;
        kept.hindex = details.hindex;
        kept.hindex5y = details.hindex5y;
        kept.i10index = details.i10index;
        kept.i10index5y = details.i10index5y;
    }
    if sections.contains(&Section::Counts) {
        kept.cites_per_year = details.cites_per_year;
    }
    kept
}
