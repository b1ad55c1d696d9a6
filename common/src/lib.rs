//! Condition Survey Common Library
//!
//! 建物状況調査の入力データモデルと、部分パッチのマージ・自動保存エンジン。
//! 画面やI/Oは持たず、CLIや他のフロントエンドから共有される。

pub mod error;
pub mod triple;
pub mod toggle;
pub mod merge;
pub mod material;
pub mod unit;
pub mod section;
pub mod tree;
pub mod autosave;
pub mod session;
pub mod collab;
pub mod catalog;
pub mod input;
pub mod report;
#[cfg(feature = "excel")]
pub mod export;

pub use error::{Error, Result};
pub use triple::{AssessmentTriple, Condition, RepairStatus};
pub use toggle::{toggle, ToggleSet};
pub use merge::{merge_fields, FieldValue, Fields, FieldsPatch, Merge};
pub use material::{MaterialCollection, MaterialEntry};
pub use unit::{UnitKind, UnitList, UnitPatch, UnitRecord};
pub use section::{SectionNode, SectionPatch};
pub use tree::{Assessment, AssessmentId, AssessmentTree, FormArea, SectionPath};
pub use autosave::{AutosaveBridge, BridgeState, CommitTarget, Draft, SectionDraft, SessionKey, DEFAULT_DEBOUNCE};
pub use session::{switch_active, SessionRegistry};
pub use collab::{submit, PhotoSource, SubmissionResult, Submitter};
pub use report::{ReportRow, ItemKind};
