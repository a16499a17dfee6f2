use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Two-letter TSE unit code (`CE`, `SP`, ..., plus `BR`/`ZZ` for national and abroad results).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Jurisdiction(String);

impl Jurisdiction {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Jurisdiction {
    type Err = PipelineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        let is_valid =
            normalized.len() == 2 && normalized.chars().all(|ch| ch.is_ascii_alphabetic());
        if !is_valid {
            return Err(PipelineError::InvalidJurisdiction(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElectionYear(u16);

impl ElectionYear {
    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for ElectionYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ElectionYear {
    type Err = PipelineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let year: u16 = value
            .trim()
            .parse()
            .map_err(|_| PipelineError::InvalidYear(value.to_string()))?;
        if !(1945..=2100).contains(&year) {
            return Err(PipelineError::InvalidYear(value.to_string()));
        }
        Ok(Self(year))
    }
}

/// Direct download URL resolved from a listing page, with the file name it will be stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadLink {
    pub url: String,
    pub file_name: String,
}

impl DownloadLink {
    pub fn from_url(url: &str) -> Result<Self, PipelineError> {
        let file_name = file_name_from_url(url)
            .ok_or_else(|| PipelineError::Resolution(format!("no file name in url {url}")))?;
        Ok(Self {
            url: url.to_string(),
            file_name,
        })
    }
}

fn file_name_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path.rsplit('/').next()?.trim();
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}

/// One logical chunk of a streamed transfer. Sequence numbers start at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub bytes: Vec<u8>,
    pub sequence: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    pub folder_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VoteType {
    Nominal,
    Blank,
    Null,
}

pub const BLANK_VOTE_LABEL: &str = "VOTO BRANCO";
pub const NULL_VOTE_LABEL: &str = "VOTO NULO";

impl VoteType {
    pub fn classify(label: Option<&str>) -> Self {
        match label {
            Some(BLANK_VOTE_LABEL) => VoteType::Blank,
            Some(NULL_VOTE_LABEL) => VoteType::Null,
            _ => VoteType::Nominal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VoteType::Nominal => "NOMINAL",
            VoteType::Blank => "BLANK",
            VoteType::Null => "NULL",
        }
    }
}

impl fmt::Display for VoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Raw,
    Bronze,
    Silver,
    Gold,
}

const ZIP_SUFFIX: &str = ".zip";
const PARQUET_SUFFIX: &str = ".parquet";
const SILVER_SUFFIX: &str = "_silver.parquet";
const GOLD_SUFFIX: &str = "_gold_municipio.parquet";

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Raw => "raw",
            Stage::Bronze => "bronze",
            Stage::Silver => "silver",
            Stage::Gold => "gold",
        }
    }

    /// Name of the artifact this stage produces from an input of the previous layer,
    /// or `None` when the input is not something this stage consumes.
    pub fn output_name(&self, input: &str) -> Option<String> {
        match self {
            Stage::Raw => None,
            Stage::Bronze => input
                .strip_suffix(ZIP_SUFFIX)
                .filter(|stem| !stem.is_empty())
                .map(|stem| format!("{stem}{PARQUET_SUFFIX}")),
            Stage::Silver => input
                .strip_suffix(PARQUET_SUFFIX)
                .filter(|stem| !stem.is_empty())
                .map(|stem| format!("{stem}{SILVER_SUFFIX}")),
            Stage::Gold => input
                .strip_suffix(SILVER_SUFFIX)
                .filter(|stem| !stem.is_empty())
                .map(|stem| format!("{stem}{GOLD_SUFFIX}")),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
