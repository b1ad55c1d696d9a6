//! 対話的な編集セッション
//!
//! 1行ごとの入力をセクションの編集バッファに反映し、
//! 入力が止まってからデバウンス時間が過ぎたらストアにコミットする。
//!
//! 入力形式:
//! - `key=value` フィールドを設定 / `key=` でクリア
//! - `:condition good` / `:status RR` / `:amount 1200` / `:na on`
//! - `:w` 即時保存 / `:q` 終了 / `:help`

use crate::error::{Result, SurveyError};
use std::time::Duration;
use survey_common::input::normalize_amount;
use survey_common::{AssessmentTree, Condition, RepairStatus, SectionDraft, SessionKey, SessionRegistry};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

pub const HELP: &str = "\
  key=value        フィールドを設定（key= でクリア）
  :condition <c>   状態 (good / fair / poor)
  :status <s>      補修区分 (IR / ST / RR / RM / INV / NA)
  :amount <n>      補修金額
  :na on|off       対象外フラグ
  :w               今すぐ保存
  :q               終了（未保存の編集は破棄）";

/// 編集コマンド
#[derive(Debug, Clone, PartialEq)]
pub enum EditCommand {
    Set { key: String, value: String },
    Clear(String),
    Condition(Condition),
    Status(RepairStatus),
    Amount(String),
    NotApplicable(bool),
    Flush,
    Quit,
    Help,
}

/// 1行を解釈する。空行は `None`
pub fn parse_command(line: &str) -> Result<Option<EditCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    if let Some(rest) = line.strip_prefix(':') {
        let mut parts = rest.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default();
        let arg = parts.next().map(str::trim).unwrap_or_default();

        let command = match name {
            "condition" | "c" => EditCommand::Condition(arg.parse().map_err(SurveyError::InvalidInput)?),
            "status" | "s" => EditCommand::Status(arg.parse().map_err(SurveyError::InvalidInput)?),
            "amount" | "a" => EditCommand::Amount(normalize_amount(arg)),
            "na" => EditCommand::NotApplicable(parse_switch(arg)?),
            "w" => EditCommand::Flush,
            "q" | "quit" => EditCommand::Quit,
            "help" | "h" | "?" => EditCommand::Help,
            other => return Err(SurveyError::InvalidInput(format!("不明なコマンド: :{}", other))),
        };
        return Ok(Some(command));
    }

    match line.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            let key = key.trim().to_string();
            let value = value.trim();
            if value.is_empty() {
                Ok(Some(EditCommand::Clear(key)))
            } else {
                Ok(Some(EditCommand::Set {
                    key,
                    value: value.to_string(),
                }))
            }
        }
        _ => Err(SurveyError::InvalidInput(format!("key=value 形式ではありません: {}", line))),
    }
}

pub fn parse_switch(arg: &str) -> Result<bool> {
    match arg.to_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        other => Err(SurveyError::InvalidInput(format!("on / off を指定してください: {}", other))),
    }
}

/// バッファに反映する。バッファを変えないコマンドなら false
pub fn apply(command: &EditCommand, draft: &mut SectionDraft) -> bool {
    match command {
        EditCommand::Set { key, value } => draft.set_field(key, value.as_str()),
        EditCommand::Clear(key) => draft.clear_field(key),
        EditCommand::Condition(c) => draft.assessment.condition = Some(*c),
        EditCommand::Status(s) => draft.assessment.repair_status = Some(*s),
        EditCommand::Amount(a) => draft.assessment.amount_to_repair = Some(a.clone()),
        EditCommand::NotApplicable(flag) => draft.not_applicable = Some(*flag),
        EditCommand::Flush | EditCommand::Quit | EditCommand::Help => return false,
    }
    true
}

#[derive(Debug, Clone, Copy)]
pub struct EditOptions {
    pub delay: Duration,
    /// 終了時に保留中の編集を保存する
    pub flush_on_exit: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditOutcome {
    /// ストアへのコミット回数
    pub commits: usize,
    /// 終了時に破棄した編集があったか
    pub dropped: bool,
    /// 解釈できなかった行数
    pub rejected: usize,
}

fn now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}

async fn sleep_until(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

/// 編集セッションを実行する
///
/// コミットのたびに `persist` を呼ぶ。入力の終端か `:q` で終わる。
pub async fn run_edit_session<R, P>(
    tree: &mut AssessmentTree,
    key: SessionKey,
    options: EditOptions,
    input: R,
    mut persist: P,
) -> Result<EditOutcome>
where
    R: AsyncBufRead + Unpin,
    P: FnMut(&AssessmentTree) -> Result<()>,
{
    let mut sessions = SessionRegistry::new(options.delay);
    sessions.open(tree, key.clone())?;
    tracing::debug!("edit session opened: {}", key);

    let mut lines = input.lines();
    let mut outcome = EditOutcome::default();

    loop {
        let deadline = sessions.next_deadline();
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_command(&line) {
                    Ok(None) => {}
                    Ok(Some(EditCommand::Quit)) => break,
                    Ok(Some(EditCommand::Help)) => println!("{}", HELP),
                    Ok(Some(EditCommand::Flush)) => {
                        if sessions.flush(&key, tree)? {
                            persist(tree)?;
                            outcome.commits += 1;
                        }
                    }
                    Ok(Some(command)) => {
                        sessions.edit(&key, now(), |draft| {
                            apply(&command, draft);
                        });
                    }
                    Err(e) => {
                        eprintln!("⚠ {}", e);
                        outcome.rejected += 1;
                    }
                }
            }
            _ = sleep_until(deadline) => {
                let committed = sessions.poll(now(), tree)?;
                if committed > 0 {
                    persist(tree)?;
                    outcome.commits += committed;
                }
            }
        }
    }

    if options.flush_on_exit {
        if sessions.flush(&key, tree)? {
            persist(tree)?;
            outcome.commits += 1;
        }
        sessions.close(&key);
    } else {
        outcome.dropped = sessions.close(&key).is_some();
    }

    Ok(outcome)
}
