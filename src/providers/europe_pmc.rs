use std::time::Duration;

use reqwest::blocking::Client;
use serde::Serialize;
use serde_json::Value;

use crate::error::LitError;
use crate::http::{build_client, build_query_url, send_with_retries};

const EUROPE_PMC_SEARCH: &str = "https://www.ebi.ac.uk/europepmc/webservices/rest/search";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EuropePmcHit {
    pub doi: Option<String>,
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub pmid: Option<String>,
}

pub trait EuropePmcClient: Send + Sync {
    fn search(&self, query: &str) -> Result<Option<EuropePmcHit>, LitError>;
}

#[derive(Clone)]
pub struct EuropePmcHttpClient {
    client: Client,
}

impl EuropePmcHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, LitError> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }

    fn search_url(query: &str) -> String {
        build_query_url(
            EUROPE_PMC_SEARCH,
            &[
                ("query", query),
                ("format", "json"),
                ("pageSize", "1"),
                ("resultType", "core"),
            ],
        )
    }
}

impl EuropePmcClient for EuropePmcHttpClient {
    fn search(&self, query: &str) -> Result<Option<EuropePmcHit>, LitError> {
        let url = Self::search_url(query);
        tracing::debug!(url = %url, "europe pmc search");
        let response = send_with_retries(
            || self.client.get(&url),
            |err| LitError::EuropePmcHttp(err.to_string()),
        )?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "Europe PMC request failed".to_string());
            return Err(LitError::EuropePmcStatus { status, message });
        }
        let payload: Value = response
            .json()
            .map_err(|err| LitError::EuropePmcHttp(err.to_string()))?;
        Ok(parse_search_response(&payload))
    }
}

pub fn parse_search_response(payload: &Value) -> Option<EuropePmcHit> {
    let first = payload
        .get("resultList")?
        .get("result")?
        .as_array()?
        .first()?;
    let field = |name: &str| {
        first
            .get(name)
            .and_then(|value| value.as_str())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    Some(EuropePmcHit {
        doi: field("doi"),
        title: field("title"),
        abstract_text: field("abstractText"),
        pmid: field("pmid"),
    })
}
