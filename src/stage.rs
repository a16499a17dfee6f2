use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::bronze;
use crate::domain::{RemoteFile, Stage};
use crate::error::PipelineError;
use crate::gold;
use crate::silver;
use crate::store::RemoteStore;

/// One refinement step between two layers of the lake.
pub trait StageTransform {
    fn stage(&self) -> Stage;

    fn output_name(&self, input: &str) -> Option<String> {
        self.stage().output_name(input)
    }

    fn transform(&self, input: &[u8]) -> Result<Vec<u8>, PipelineError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BronzeStage;

impl StageTransform for BronzeStage {
    fn stage(&self) -> Stage {
        Stage::Bronze
    }

    fn transform(&self, input: &[u8]) -> Result<Vec<u8>, PipelineError> {
        bronze::convert_archive(input)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SilverStage;

impl StageTransform for SilverStage {
    fn stage(&self) -> Stage {
        Stage::Silver
    }

    fn transform(&self, input: &[u8]) -> Result<Vec<u8>, PipelineError> {
        silver::transform_payload(input)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GoldStage;

impl StageTransform for GoldStage {
    fn stage(&self) -> Stage {
        Stage::Gold
    }

    fn transform(&self, input: &[u8]) -> Result<Vec<u8>, PipelineError> {
        gold::aggregate_payload(input)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessedArtifact {
    pub input: String,
    pub output: String,
    pub output_id: String,
    pub bytes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedArtifact {
    pub input: String,
    pub output: String,
    pub existing_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedArtifact {
    pub input: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub source_folder: String,
    pub destination_folder: String,
    pub listed: usize,
    pub processed: Vec<ProcessedArtifact>,
    pub skipped: Vec<SkippedArtifact>,
    pub ignored: Vec<String>,
    pub failed: Vec<FailedArtifact>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl StageReport {
    pub fn uploads(&self) -> usize {
        self.processed.len()
    }
}

/// Runs `transform` over every artifact in `source_folder` whose output is not yet in
/// `destination_folder`.
///
/// Listing failures abort the stage. Existence-check failures count as "not found".
/// Download, transform and upload failures are logged against the artifact and the batch
/// moves on to the next one.
pub fn run_stage<S, T>(
    store: &S,
    transform: &T,
    source_folder: &str,
    destination_folder: &str,
) -> Result<StageReport, PipelineError>
where
    S: RemoteStore + ?Sized,
    T: StageTransform + ?Sized,
{
    let stage = transform.stage();
    let started_at = Utc::now();
    info!(stage = %stage, source = %source_folder, "stage started");

    let inputs = store.list_artifacts(source_folder)?;
    info!(stage = %stage, count = inputs.len(), "artifacts found in source folder");

    let mut report = StageReport {
        stage,
        source_folder: source_folder.to_string(),
        destination_folder: destination_folder.to_string(),
        listed: inputs.len(),
        processed: Vec::new(),
        skipped: Vec::new(),
        ignored: Vec::new(),
        failed: Vec::new(),
        started_at,
        finished_at: started_at,
    };

    for input in inputs {
        let Some(output) = transform.output_name(&input.name) else {
            debug!(stage = %stage, artifact = %input.name, "not an input for this stage");
            report.ignored.push(input.name);
            continue;
        };

        match store.artifact_exists(&output, destination_folder) {
            Ok(Some(existing_id)) => {
                info!(stage = %stage, artifact = %output, "already exists, skipping");
                report.skipped.push(SkippedArtifact {
                    input: input.name,
                    output,
                    existing_id,
                });
                continue;
            }
            Ok(None) => {}
            Err(err) => {
                warn!(
                    stage = %stage,
                    artifact = %output,
                    error = %err,
                    "existence check failed, treating as missing"
                );
            }
        }

        info!(stage = %stage, artifact = %input.name, output = %output, "processing");
        match process_artifact(store, transform, &input, &output, destination_folder) {
            Ok(processed) => {
                info!(
                    stage = %stage,
                    artifact = %processed.output,
                    id = %processed.output_id,
                    bytes = processed.bytes,
                    "uploaded"
                );
                report.processed.push(processed);
            }
            Err(err) => {
                error!(stage = %stage, artifact = %input.name, error = %err, "artifact failed");
                report.failed.push(FailedArtifact {
                    input: input.name,
                    error: err.to_string(),
                });
            }
        }
    }

    report.finished_at = Utc::now();
    info!(
        stage = %stage,
        processed = report.processed.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "stage finished"
    );
    Ok(report)
}

fn process_artifact<S, T>(
    store: &S,
    transform: &T,
    input: &RemoteFile,
    output: &str,
    destination_folder: &str,
) -> Result<ProcessedArtifact, PipelineError>
where
    S: RemoteStore + ?Sized,
    T: StageTransform + ?Sized,
{
    let payload = store.download_artifact(&input.id)?;
    let result = transform.transform(&payload)?;
    let output_id = store.upload_artifact(&result, output, destination_folder)?;
    Ok(ProcessedArtifact {
        input: input.name.clone(),
        output: output.to_string(),
        output_id,
        bytes: result.len(),
    })
}
