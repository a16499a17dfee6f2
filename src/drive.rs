use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::domain::RemoteFile;
use crate::error::PipelineError;
use crate::store::RemoteStore;

const MULTIPART_BOUNDARY: &str = "tse-lakehouse-artifact-boundary";
const LIST_PAGE_SIZE: &str = "1000";

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(default, rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

/// Google Drive v3 folders used as the artifact store. Authenticates with a bearer token.
#[derive(Clone)]
pub struct DriveStore {
    client: Client,
    api_base_url: String,
    upload_base_url: String,
}

impl DriveStore {
    pub fn from_env(
        access_token_env: &str,
        api_base_url: &str,
        upload_base_url: &str,
    ) -> Result<Self, PipelineError> {
        let token = std::env::var(access_token_env)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                PipelineError::Store(format!("environment variable {access_token_env} is not set"))
            })?;
        Self::with_token(&token, api_base_url, upload_base_url)
    }

    pub fn with_token(
        token: &str,
        api_base_url: &str,
        upload_base_url: &str,
    ) -> Result<Self, PipelineError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("tse-lakehouse/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| PipelineError::Store(err.to_string()))?,
        );
        let mut bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|err| PipelineError::Store(err.to_string()))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(None)
            .build()
            .map_err(|err| PipelineError::StoreHttp(err.to_string()))?;
        Ok(Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            upload_base_url: upload_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, PipelineError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "Drive request failed".to_string());
        Err(PipelineError::StoreStatus { status, message })
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, PipelineError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(PipelineError::StoreHttp(err.to_string()));
                }
            }
        }
    }

    fn query_files(
        &self,
        query: &str,
        page_size: &str,
        page_token: Option<&str>,
    ) -> Result<DriveFileList, PipelineError> {
        let url = format!("{}/files", self.api_base_url);
        let response = self.send_with_retries(|| {
            let mut request = self.client.get(&url).query(&[
                ("q", query),
                ("spaces", "drive"),
                ("fields", "nextPageToken, files(id, name)"),
                ("pageSize", page_size),
            ]);
            if let Some(token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }
            request
        })?;
        Self::handle_status(response)?
            .json()
            .map_err(|err| PipelineError::StoreHttp(err.to_string()))
    }
}

impl RemoteStore for DriveStore {
    fn list_artifacts(&self, folder_id: &str) -> Result<Vec<RemoteFile>, PipelineError> {
        let query = format!("'{}' in parents and trashed = false", escape_query(folder_id));
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self.query_files(&query, LIST_PAGE_SIZE, page_token.as_deref())?;
            files.extend(page.files.into_iter().map(|file| RemoteFile {
                id: file.id,
                name: file.name,
                folder_id: folder_id.to_string(),
            }));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        debug!(folder = %folder_id, count = files.len(), "listed drive folder");
        Ok(files)
    }

    fn artifact_exists(
        &self,
        name: &str,
        folder_id: &str,
    ) -> Result<Option<String>, PipelineError> {
        let query = format!(
            "name = '{}' and '{}' in parents and trashed = false",
            escape_query(name),
            escape_query(folder_id)
        );
        let page = self.query_files(&query, "1", None)?;
        Ok(page.files.into_iter().next().map(|file| file.id))
    }

    fn download_artifact(&self, id: &str) -> Result<Vec<u8>, PipelineError> {
        let url = format!("{}/files/{}", self.api_base_url, id);
        let response =
            self.send_with_retries(|| self.client.get(&url).query(&[("alt", "media")]))?;
        let bytes = Self::handle_status(response)?
            .bytes()
            .map_err(|err| PipelineError::StoreHttp(err.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn upload_artifact(
        &self,
        bytes: &[u8],
        name: &str,
        folder_id: &str,
    ) -> Result<String, PipelineError> {
        let url = format!("{}/files", self.upload_base_url);
        let body = multipart_body(bytes, name, folder_id);
        let response = self
            .client
            .post(&url)
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={MULTIPART_BOUNDARY}"),
            )
            .body(body)
            .send()
            .map_err(|err| PipelineError::StoreHttp(err.to_string()))?;
        let created: CreatedFile = Self::handle_status(response)?
            .json()
            .map_err(|err| PipelineError::StoreHttp(err.to_string()))?;
        Ok(created.id)
    }
}

/// Escapes a literal for use inside single quotes in a Drive search query.
fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn multipart_body(bytes: &[u8], name: &str, folder_id: &str) -> Vec<u8> {
    let metadata = json!({ "name": name, "parents": [folder_id] }).to_string();
    let mut body = Vec::with_capacity(bytes.len() + metadata.len() + 256);
    body.extend_from_slice(
        format!(
            "--{MULTIPART_BOUNDARY}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!("--{MULTIPART_BOUNDARY}\r\nContent-Type: application/octet-stream\r\n\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
