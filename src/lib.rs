//! condition-survey
//!
//! 建物状況調査データのストアを操作するCLIアプリケーションのライブラリ部。
//! データモデルとマージ・自動保存エンジンは `survey_common` にある。

pub mod cli;
pub mod config;
pub mod error;
pub mod storage;
pub mod photos;
pub mod outbox;
pub mod editor;
pub mod commands;
