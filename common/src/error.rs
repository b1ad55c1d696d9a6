//! エラー型定義

use thiserror::Error;

/// 共通エラー型
///
/// コレクション内の未知ID（削除直後の古い参照など）はエラーにしない。
/// ここに並ぶのは呼び出し側の誤りか、入出力の失敗だけ。
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Assessment not found: {0}")]
    AssessmentNotFound(String),

    #[error("Unknown form area: {0}")]
    UnknownArea(String),

    #[error("Invalid section path: {0}")]
    InvalidPath(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Export error: {0}")]
    Export(String),
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
