//! 外部協調者（写真・提出）のインターフェース
//!
//! 写真の保存方法や送信処理そのものはこのクレートの外にある。
//! ここでは読み取り専用の写真枚数と、提出結果の契約だけを定める。

use crate::error::Result;
use crate::tree::{AssessmentTree, Assessment};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// 写真枚数の問い合わせ先（読み取り専用）
pub trait PhotoSource {
    fn photo_count_for_step(&self, form_area: &str, step_index: usize) -> usize;
}

/// 提出結果（エラーメッセージはそのまま呼び出し側へ）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubmissionResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

/// 提出先
pub trait Submitter {
    fn submit_assessment(&mut self, assessment: &Assessment) -> SubmissionResult;
}

/// 評価を1回だけ提出する。リトライもロールバックもしない
///
/// 成功時は提出日時を記録する。失敗時はローカルの状態に触れず、
/// 評価は引き続き編集できる。
pub fn submit<S: Submitter + ?Sized>(
    tree: &mut AssessmentTree,
    id: &str,
    submitter: &mut S,
) -> Result<SubmissionResult> {
    let result = submitter.submit_assessment(tree.assessment(id)?);
    if result.success {
        tree.mark_submitted(id, Utc::now())?;
    } else {
        tracing::warn!(
            "submission failed for {id}: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(result)
}
