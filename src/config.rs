use crate::errors::{AppError, AppResult};
use crate::github::DEFAULT_API_BASE_URL;
use crate::models::CellRef;
use crate::range_store::{column_to_index, parse_cell_ref};
use crate::series::{AnchorFallback, DEFAULT_RETENTION_DAYS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "traffic-ledger.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// `owner/name` used by every target without its own `repo`.
    pub repo: String,
    pub store_path: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub retention_days: u32,
    pub anchor_fallback: AnchorFallback,
    pub api_base_url: String,
    pub app: AppConfig,
    pub targets: Targets,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            repo: String::new(),
            store_path: PathBuf::from("traffic-ledger.sqlite"),
            log_dir: None,
            retention_days: DEFAULT_RETENTION_DAYS,
            anchor_fallback: AnchorFallback::default(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            app: AppConfig::default(),
            targets: Targets::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub app_id: String,
    pub private_key_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Targets {
    pub stargazers: StargazerTarget,
    pub views: ColumnTarget,
    pub clones: ColumnTarget,
    pub referrers: ColumnTarget,
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            stargazers: StargazerTarget {
                repo: None,
                sheet: "star".to_string(),
                top_left: "A21".to_string(),
            },
            views: ColumnTarget::new("traffic", "A"),
            clones: ColumnTarget::new("traffic", "E"),
            referrers: ColumnTarget::new("referrer.raw", "A"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StargazerTarget {
    #[serde(default)]
    pub repo: Option<String>,
    pub sheet: String,
    /// Header cell; stargazer rows start one row below.
    pub top_left: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnTarget {
    #[serde(default)]
    pub repo: Option<String>,
    pub sheet: String,
    /// Column holding the dates that anchor each write.
    pub column: String,
}

impl ColumnTarget {
    fn new(sheet: &str, column: &str) -> Self {
        Self {
            repo: None,
            sheet: sheet.to_string(),
            column: column.to_string(),
        }
    }
}

/// Validated, resolved location of the stargazer block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLocation {
    pub repo: String,
    pub sheet: String,
    pub top_left: CellRef,
}

/// Validated, resolved location of a date-anchored series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLocation {
    pub repo: String,
    pub sheet: String,
    pub column: u32,
}

/// Everything the runner needs, with references already parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    pub stargazers: BlockLocation,
    pub views: ColumnLocation,
    pub clones: ColumnLocation,
    pub referrers: ColumnLocation,
    pub retention_days: u32,
    pub anchor_fallback: AnchorFallback,
}

impl SyncConfig {
    pub fn load(path: &Path) -> AppResult<Self> {
        let raw = fs::read_to_string(path).map_err(|error| {
            AppError::Config(format!("Cannot read {}: {}", path.display(), error))
        })?;
        let config: SyncConfig = serde_yaml::from_str(&raw)?;
        config.plan()?;
        Ok(config)
    }

    pub fn sheet_names(&self) -> Vec<String> {
        let mut names = vec![
            self.targets.stargazers.sheet.clone(),
            self.targets.views.sheet.clone(),
            self.targets.clones.sheet.clone(),
            self.targets.referrers.sheet.clone(),
        ];
        names.sort();
        names.dedup();
        names
    }

    pub fn plan(&self) -> AppResult<SyncPlan> {
        if self.retention_days == 0 {
            return Err(AppError::Config("retention_days must be at least 1".to_string()));
        }

        let stargazers = &self.targets.stargazers;
        Ok(SyncPlan {
            stargazers: BlockLocation {
                repo: self.target_repo(stargazers.repo.as_deref())?,
                sheet: require_sheet(&stargazers.sheet)?,
                top_left: parse_cell_ref(&stargazers.top_left)?,
            },
            views: self.column_location(&self.targets.views)?,
            clones: self.column_location(&self.targets.clones)?,
            referrers: self.column_location(&self.targets.referrers)?,
            retention_days: self.retention_days,
            anchor_fallback: self.anchor_fallback,
        })
    }

    fn column_location(&self, target: &ColumnTarget) -> AppResult<ColumnLocation> {
        Ok(ColumnLocation {
            repo: self.target_repo(target.repo.as_deref())?,
            sheet: require_sheet(&target.sheet)?,
            column: column_to_index(target.column.trim())?,
        })
    }

    fn target_repo(&self, override_repo: Option<&str>) -> AppResult<String> {
        let repo = override_repo.unwrap_or(&self.repo).trim();
        let mut parts = repo.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => {
                Ok(repo.to_string())
            }
            _ => Err(AppError::Config(format!(
                "Repository must look like owner/name, got '{}'",
                repo
            ))),
        }
    }
}

fn require_sheet(sheet: &str) -> AppResult<String> {
    let sheet = sheet.trim();
    if sheet.is_empty() {
        return Err(AppError::Config("Sheet name cannot be empty".to_string()));
    }
    Ok(sheet.to_string())
}
