use std::io::Read;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};

use crate::domain::ElectionYear;
use crate::error::PipelineError;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub trait TseClient: Send + Sync {
    fn listing_url(&self, year: ElectionYear) -> String;
    fn fetch_listing(&self, year: ElectionYear) -> Result<String, PipelineError>;
    /// Opens a streaming download. Non-2xx responses fail here, before any byte is read.
    fn open_download(&self, url: &str) -> Result<Box<dyn Read + Send>, PipelineError>;
}

#[derive(Clone)]
pub struct TseHttpClient {
    client: Client,
    listing_base_url: String,
}

impl TseHttpClient {
    pub fn new(listing_base_url: &str) -> Result<Self, PipelineError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/zip,*/*"),
        );
        // Result archives are several hundred megabytes; no overall deadline.
        let client = Client::builder()
            .default_headers(headers)
            .timeout(None)
            .build()
            .map_err(|err| PipelineError::TransferHttp(err.to_string()))?;
        Ok(Self {
            client,
            listing_base_url: listing_base_url.to_string(),
        })
    }

    fn get_checked(&self, url: &str) -> Result<reqwest::blocking::Response, PipelineError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| PipelineError::TransferHttp(format!("{url}: {err}")))?;
        if !response.status().is_success() {
            return Err(PipelineError::TransferStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

impl TseClient for TseHttpClient {
    fn listing_url(&self, year: ElectionYear) -> String {
        format!("{}{}", self.listing_base_url, year)
    }

    fn fetch_listing(&self, year: ElectionYear) -> Result<String, PipelineError> {
        let url = self.listing_url(year);
        self.get_checked(&url)?
            .text()
            .map_err(|err| PipelineError::TransferHttp(format!("{url}: {err}")))
    }

    fn open_download(&self, url: &str) -> Result<Box<dyn Read + Send>, PipelineError> {
        let response = self.get_checked(url)?;
        Ok(Box::new(response))
    }
}
