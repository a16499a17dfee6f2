use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::config::{ResolvedConfig, StoreSettings};
use crate::domain::{ElectionYear, Jurisdiction, Stage};
use crate::drive::DriveStore;
use crate::error::PipelineError;
use crate::ingest::{IngestReport, run_ingestion};
use crate::stage::{BronzeStage, GoldStage, SilverStage, StageReport, StageTransform, run_stage};
use crate::store::{FsStore, RemoteStore};
use crate::tse::TseClient;

/// Builds the configured store. Failure here is fatal to the whole run.
pub fn open_store(settings: &StoreSettings) -> Result<Box<dyn RemoteStore>, PipelineError> {
    match settings {
        StoreSettings::Local { root } => {
            let root = match root {
                Some(root) => root.clone(),
                None => FsStore::default_root()?,
            };
            info!(root = %root, "using local store");
            Ok(Box::new(FsStore::new(root)))
        }
        StoreSettings::Drive {
            access_token_env,
            api_base_url,
            upload_base_url,
        } => {
            info!("using Google Drive store");
            Ok(Box::new(DriveStore::from_env(
                access_token_env,
                api_base_url,
                upload_base_url,
            )?))
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub ingestion: Option<IngestReport>,
    pub failures: Vec<StageFailure>,
    pub stages: Vec<StageReport>,
    pub finished_at: DateTime<Utc>,
}

pub struct Pipeline<'a, C: TseClient + ?Sized, S: RemoteStore + ?Sized> {
    client: &'a C,
    store: &'a S,
    config: &'a ResolvedConfig,
}

impl<'a, C: TseClient + ?Sized, S: RemoteStore + ?Sized> Pipeline<'a, C, S> {
    pub fn new(client: &'a C, store: &'a S, config: &'a ResolvedConfig) -> Self {
        Self {
            client,
            store,
            config,
        }
    }

    pub fn ingest(
        &self,
        year: ElectionYear,
        jurisdiction: &Jurisdiction,
    ) -> Result<IngestReport, PipelineError> {
        run_ingestion(
            self.client,
            self.store,
            &self.config.folders.raw,
            self.config.transfer,
            year,
            jurisdiction,
        )
    }

    pub fn bronze(&self) -> Result<StageReport, PipelineError> {
        let folders = &self.config.folders;
        self.stage(&BronzeStage, &folders.raw, &folders.bronze)
    }

    pub fn silver(&self) -> Result<StageReport, PipelineError> {
        let folders = &self.config.folders;
        self.stage(&SilverStage, &folders.bronze, &folders.silver)
    }

    pub fn gold(&self) -> Result<StageReport, PipelineError> {
        let folders = &self.config.folders;
        self.stage(&GoldStage, &folders.silver, &folders.gold)
    }

    fn stage(
        &self,
        transform: &dyn StageTransform,
        source: &str,
        destination: &str,
    ) -> Result<StageReport, PipelineError> {
        run_stage(self.store, transform, source, destination)
    }

    /// Ingestion, then bronze, silver and gold, one after the other. A failing step is
    /// logged and recorded; the following steps still run over whatever their inputs are.
    pub fn run(&self, year: ElectionYear, jurisdiction: &Jurisdiction) -> RunSummary {
        let mut failures = Vec::new();

        let ingestion = match self.ingest(year, jurisdiction) {
            Ok(report) => Some(report),
            Err(err) => {
                error!(error = %err, "ingestion failed");
                failures.push(StageFailure {
                    stage: Stage::Raw,
                    error: err.to_string(),
                });
                None
            }
        };

        let mut stages = Vec::new();
        let steps: [(Stage, fn(&Self) -> Result<StageReport, PipelineError>); 3] = [
            (Stage::Bronze, Self::bronze),
            (Stage::Silver, Self::silver),
            (Stage::Gold, Self::gold),
        ];
        for (stage, step) in steps {
            match step(self) {
                Ok(report) => stages.push(report),
                Err(err) => {
                    error!(stage = %stage, error = %err, "stage failed");
                    failures.push(StageFailure {
                        stage,
                        error: err.to_string(),
                    });
                }
            }
        }

        RunSummary {
            ingestion,
            failures,
            stages,
            finished_at: Utc::now(),
        }
    }
}
