use thiserror::Error;

#[derive(Error, Debug)]
pub enum SurveyError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("アクティブな評価がありません。`survey new` で作成するか `survey use <ID>` で選択してください")]
    NoActiveAssessment,

    #[error("ストアファイルが不正: {0}")]
    InvalidStore(String),

    #[error("上限台数に達しています: {0}（--force で追加できます）")]
    UnitCapacity(String),

    #[error("提出に失敗しました: {0}")]
    SubmissionFailed(String),

    #[error("入力が不正: {0}")]
    InvalidInput(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] survey_common::Error),
}

pub type Result<T> = std::result::Result<T, SurveyError>;
