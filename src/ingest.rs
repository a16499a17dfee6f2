use serde::Serialize;
use tracing::{info, warn};

use crate::config::TransferSettings;
use crate::domain::{DownloadLink, ElectionYear, Jurisdiction};
use crate::error::PipelineError;
use crate::resolver::resolve_download_link;
use crate::store::RemoteStore;
use crate::transfer::ChunkStream;
use crate::tse::TseClient;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum IngestOutcome {
    Uploaded { id: String, parts: usize, bytes: usize },
    AlreadyPresent { existing_id: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub year: ElectionYear,
    pub jurisdiction: Jurisdiction,
    pub link: DownloadLink,
    pub outcome: IngestOutcome,
}

/// Fetches the listing page for `year` and resolves the archive link for `jurisdiction`.
pub fn resolve_link<C>(
    client: &C,
    year: ElectionYear,
    jurisdiction: &Jurisdiction,
) -> Result<Option<DownloadLink>, PipelineError>
where
    C: TseClient + ?Sized,
{
    let page_url = client.listing_url(year);
    info!(year = %year, uf = %jurisdiction, page = %page_url, "fetching listing page");
    let html = client.fetch_listing(year)?;
    resolve_download_link(&html, jurisdiction, &page_url)
}

/// Downloads one (year, jurisdiction) archive into the raw folder unless it is already there.
///
/// The archive is streamed in chunks and reassembled in memory; nothing is uploaded
/// unless the whole transfer succeeds.
pub fn run_ingestion<C, S>(
    client: &C,
    store: &S,
    raw_folder: &str,
    transfer: TransferSettings,
    year: ElectionYear,
    jurisdiction: &Jurisdiction,
) -> Result<IngestReport, PipelineError>
where
    C: TseClient + ?Sized,
    S: RemoteStore + ?Sized,
{
    info!(year = %year, uf = %jurisdiction, "ingestion started");

    let link = resolve_link(client, year, jurisdiction)?.ok_or_else(|| {
        PipelineError::Resolution(format!(
            "no \"{jurisdiction} - \" resource on the {year} listing page"
        ))
    })?;
    info!(url = %link.url, file = %link.file_name, "download link resolved");

    match store.artifact_exists(&link.file_name, raw_folder) {
        Ok(Some(existing_id)) => {
            info!(artifact = %link.file_name, "already in raw layer, stopping");
            return Ok(IngestReport {
                year,
                jurisdiction: jurisdiction.clone(),
                link,
                outcome: IngestOutcome::AlreadyPresent { existing_id },
            });
        }
        Ok(None) => {}
        Err(err) => {
            warn!(artifact = %link.file_name, error = %err, "existence check failed, treating as missing");
        }
    }

    let reader = client.open_download(&link.url)?;
    let mut payload = Vec::new();
    let mut parts = 0usize;
    for chunk in ChunkStream::new(reader, transfer) {
        let chunk = chunk?;
        info!(part = chunk.sequence, bytes = chunk.bytes.len(), "received part");
        payload.extend_from_slice(&chunk.bytes);
        parts = chunk.sequence;
    }

    info!(artifact = %link.file_name, bytes = payload.len(), "uploading to raw layer");
    let id = store.upload_artifact(&payload, &link.file_name, raw_folder)?;
    info!(artifact = %link.file_name, id = %id, "ingestion finished");

    Ok(IngestReport {
        year,
        jurisdiction: jurisdiction.clone(),
        link,
        outcome: IngestOutcome::Uploaded {
            id,
            parts,
            bytes: payload.len(),
        },
    })
}
