use std::io::{self, Write};

use serde::Serialize;

use crate::domain::DownloadLink;
use crate::ingest::IngestReport;
use crate::pipeline::RunSummary;
use crate::stage::StageReport;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Log,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_run(summary: &RunSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_stage(report: &StageReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_ingest(report: &IngestReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_link(link: Option<&DownloadLink>) -> io::Result<()> {
        Self::print_json(&link)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
