//! 評価ストアの永続化
//!
//! 評価ツリー全体を1つのJSONファイルに保存する。
//! 未来のバージョンのファイルは読まずにエラーにする（黙って捨てない）。

use crate::error::{Result, SurveyError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use survey_common::AssessmentTree;

/// ストアファイルの構造
#[derive(Debug, Deserialize)]
struct StoreFile {
    /// バージョン（互換性チェック用）
    version: u32,
    tree: AssessmentTree,
}

#[derive(Serialize)]
struct StoreFileRef<'a> {
    version: u32,
    tree: &'a AssessmentTree,
}

/// ファイルに紐づいた評価ツリー
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    pub tree: AssessmentTree,
}

impl Store {
    const CURRENT_VERSION: u32 = 1;

    /// 読み込み。ファイルが無ければ空のツリー
    pub fn open(path: &Path) -> Result<Self> {
        let tree = if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            let file: StoreFile = serde_json::from_reader(reader)
                .map_err(|e| SurveyError::InvalidStore(format!("{}: {}", path.display(), e)))?;
            if file.version != Self::CURRENT_VERSION {
                return Err(SurveyError::InvalidStore(format!(
                    "{}: 未対応のバージョン {}",
                    path.display(),
                    file.version
                )));
            }
            file.tree
        } else {
            AssessmentTree::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            tree,
        })
    }

    /// 一時ファイルに書いてから置き換える
    pub fn save(&self) -> Result<()> {
        save_tree(&self.path, &self.tree)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn save_tree(path: &Path, tree: &AssessmentTree) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp = path.with_extension("json.tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer_pretty(
            &mut writer,
            &StoreFileRef {
                version: Store::CURRENT_VERSION,
                tree,
            },
        )?;
        writer.flush()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}
