use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::blocking::Client;
use scraper::{Html, Selector};
use serde::Serialize;

use crate::error::LitError;
use crate::http::{build_client, build_query_url, send_with_retries};

const PUBMED_BASE: &str = "https://pubmed.ncbi.nlm.nih.gov";

static RESULT_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.docsum-title").expect("valid docsum selector"));
static CITATION_DOI: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.citation-doi").expect("valid doi selector"));
static HEADING_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1.heading-title").expect("valid heading selector"));
static ABSTRACT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.abstract-content").expect("valid abstract selector"));

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PubmedArticle {
    pub link: String,
    pub doi: Option<String>,
    pub title: Option<String>,
    pub abstract_text: Option<String>,
}

pub trait PubmedClient: Send + Sync {
    /// Returns the top hit for `query`, or `None` when the search is empty.
    fn search(&self, query: &str) -> Result<Option<PubmedArticle>, LitError>;
}

#[derive(Clone)]
pub struct PubmedHttpClient {
    client: Client,
    base_url: String,
}

impl PubmedHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, LitError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: PUBMED_BASE.to_string(),
        })
    }

    /// Returns the final URL after redirects together with the body.
    fn get_html(&self, url: &str) -> Result<(String, String), LitError> {
        let response = send_with_retries(
            || self.client.get(url),
            |err| LitError::PubmedHttp(err.to_string()),
        )?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "PubMed request failed".to_string());
            return Err(LitError::PubmedStatus { status, message });
        }
        let final_url = response.url().to_string();
        let body = response
            .text()
            .map_err(|err| LitError::PubmedHttp(err.to_string()))?;
        Ok((final_url, body))
    }
}

impl PubmedClient for PubmedHttpClient {
    fn search(&self, query: &str) -> Result<Option<PubmedArticle>, LitError> {
        let search_url = build_query_url(&format!("{}/", self.base_url), &[("term", query)]);
        tracing::debug!(url = %search_url, "pubmed search");
        let (final_url, html) = self.get_html(&search_url)?;
        let Some(href) = parse_first_result(&html) else {
            // a single match redirects straight to the article page
            let article = parse_article(&final_url, &html);
            if article.title.is_some() {
                return Ok(Some(article));
            }
            return Ok(None);
        };

        let link = if href.starts_with("http") {
            href
        } else {
            format!("{}{}", self.base_url, href)
        };
        let (_, article_html) = self.get_html(&link)?;
        Ok(Some(parse_article(&link, &article_html)))
    }
}

pub fn parse_first_result(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&RESULT_TITLE)
        .next()
        .and_then(|anchor| anchor.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty())
}

pub fn parse_article(link: &str, html: &str) -> PubmedArticle {
    let document = Html::parse_document(html);
    let text_of = |selector: &Selector| {
        document
            .select(selector)
            .next()
            .map(|node| collapse_whitespace(&node.text().collect::<String>()))
            .filter(|text| !text.is_empty())
    };

    PubmedArticle {
        link: link.to_string(),
        doi: text_of(&*CITATION_DOI).and_then(|raw| clean_doi(&raw)),
        title: text_of(&*HEADING_TITLE),
        abstract_text: text_of(&*ABSTRACT),
    }
}

/// `"doi: 10.1016/j.placenta.2020.01.001."` -> `"10.1016/j.placenta.2020.01.001"`
pub fn clean_doi(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let without_prefix = trimmed
        .strip_prefix("doi:")
        .or_else(|| trimmed.strip_prefix("DOI:"))
        .unwrap_or(trimmed);
    let doi = without_prefix.trim().trim_end_matches('.').trim();
    if doi.is_empty() {
        None
    } else {
        Some(doi.to_string())
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
