use crate::error::{Result, SurveyError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// ストアパスを上書きする環境変数
pub const STORE_ENV: &str = "SURVEY_STORE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store_path: Option<PathBuf>,
    pub photo_root: Option<PathBuf>,
    pub outbox_dir: Option<PathBuf>,
    pub debounce_ms: u64,
    /// 終了時に未コミットの編集を保存する（既定は破棄）
    pub flush_on_exit: bool,
    pub inspector: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: None,
            photo_root: None,
            outbox_dir: None,
            debounce_ms: 300,
            flush_on_exit: false,
            inspector: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| SurveyError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("condition-survey"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// ストアファイルの場所（引数 > 環境変数 > 設定 > 既定）
    pub fn resolve_store_path(&self, cli_override: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = cli_override {
            return Ok(path.to_path_buf());
        }
        if let Ok(path) = std::env::var(STORE_ENV) {
            if !path.trim().is_empty() {
                return Ok(PathBuf::from(path));
            }
        }
        match &self.store_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("assessments.json")),
        }
    }

    pub fn resolve_photo_root(&self) -> Result<PathBuf> {
        match &self.photo_root {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("photos")),
        }
    }

    pub fn resolve_outbox_dir(&self) -> Result<PathBuf> {
        match &self.outbox_dir {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("outbox")),
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
