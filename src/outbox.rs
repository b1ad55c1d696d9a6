//! 提出先（アウトボックス）
//!
//! 提出された評価をJSONファイルとしてフォルダに書き出す。
//! 実際の送信はこのツールの外で行う。

use chrono::Utc;
use std::path::{Path, PathBuf};
use survey_common::{Assessment, SubmissionResult, Submitter};

#[derive(Debug, Clone)]
pub struct OutboxSubmitter {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl OutboxSubmitter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    /// 書き出したファイル
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn write(&self, assessment: &Assessment) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let file_name = format!("{}-{}.json", assessment.id, Utc::now().format("%Y%m%dT%H%M%S%.3f"));
        let path = self.dir.join(file_name);
        let json = serde_json::to_string_pretty(assessment)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Submitter for OutboxSubmitter {
    fn submit_assessment(&mut self, assessment: &Assessment) -> SubmissionResult {
        match self.write(assessment) {
            Ok(path) => {
                tracing::info!("assessment written to outbox: {}", path.display());
                self.written.push(path);
                SubmissionResult::ok()
            }
            Err(e) => SubmissionResult::failed(format!("{}: {}", self.dir.display(), e)),
        }
    }
}
