//! 自動保存ブリッジ
//!
//! 入力ごとに変化する編集バッファと永続ストアの間に立ち、
//! 末尾デバウンスで最小パッチだけをコミットする。
//!
//! 状態遷移: Idle → Pending → Committing → Idle
//! - 編集のたびにタイマーを再スタート（末尾デバウンス）
//! - 期限切れで差分を取り、`None`（未操作）のフィールドは送らない
//! - 破棄時は保留中のパッチを捨てる（フラッシュしない）
//! - コミットに失敗したら Pending に戻り、デバウンス1回分あとに再試行する
//! - 外部からのバッファ再設定はユーザー編集として扱わない
//!
//! 時刻は呼び出し側が `Instant` で渡す。タイマー自体は持たない。

use crate::error::Result;
use crate::merge::{FieldValue, FieldsPatch};
use crate::section::{SectionNode, SectionPatch};
use crate::tree::{AssessmentId, AssessmentTree, SectionPath};
use crate::triple::AssessmentTriple;
use std::fmt;
use std::time::{Duration, Instant};

/// 既定のデバウンス時間
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// 編集セッションのキー（評価ID + セクション位置）
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionKey {
    pub assessment_id: AssessmentId,
    pub path: SectionPath,
}

impl SessionKey {
    pub fn new(assessment_id: impl Into<String>, path: SectionPath) -> Self {
        Self {
            assessment_id: assessment_id.into(),
            path,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.assessment_id, self.path)
    }
}

/// 編集バッファ
pub trait Draft: Clone {
    type Patch;

    /// `baseline`（最後にストアと一致していた値）との差分から最小パッチを作る。
    /// 差分がなければ `None`
    fn diff(&self, baseline: &Self) -> Option<Self::Patch>;
}

/// パッチのコミット先
pub trait CommitTarget<P> {
    fn commit(&mut self, key: &SessionKey, patch: &P) -> Result<()>;
}

impl CommitTarget<SectionPatch> for AssessmentTree {
    fn commit(&mut self, key: &SessionKey, patch: &SectionPatch) -> Result<()> {
        self.update_section(&key.assessment_id, &key.path, patch)
    }
}

/// セクションの編集可能な部分
///
/// `fields` の `None` は「まだ触っていない」。クリアは空文字で表す。
/// 選択集合はトグル操作で即時コミットされるため、ここには含めない。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionDraft {
    pub not_applicable: Option<bool>,
    pub fields: FieldsPatch,
    pub assessment: AssessmentTriple,
}

impl SectionDraft {
    /// ストアの内容をバッファに写す
    pub fn from_node(node: Option<&SectionNode>) -> Self {
        match node {
            Some(node) => Self {
                not_applicable: Some(node.not_applicable),
                fields: node
                    .fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Some(v.clone())))
                    .collect(),
                assessment: node.assessment.clone().unwrap_or_default(),
            },
            None => Self::default(),
        }
    }

    pub fn set_field(&mut self, key: &str, value: impl Into<FieldValue>) {
        self.fields.insert(key.to_string(), Some(value.into()));
    }

    /// 型付きの空値でクリアする
    pub fn clear_field(&mut self, key: &str) {
        self.fields.insert(key.to_string(), Some(FieldValue::text("")));
    }
}

fn changed<T: PartialEq + Clone>(current: &Option<T>, baseline: &Option<T>) -> Option<T> {
    match current {
        Some(v) if baseline.as_ref() != Some(v) => Some(v.clone()),
        _ => None,
    }
}

impl Draft for SectionDraft {
    type Patch = SectionPatch;

    fn diff(&self, baseline: &Self) -> Option<SectionPatch> {
        let fields: FieldsPatch = self
            .fields
            .iter()
            .filter_map(|(key, value)| {
                let before = baseline.fields.get(key).cloned().flatten();
                changed(value, &before).map(|v| (key.clone(), Some(v)))
            })
            .collect();

        let triple = AssessmentTriple {
            condition: changed(&self.assessment.condition, &baseline.assessment.condition),
            repair_status: changed(&self.assessment.repair_status, &baseline.assessment.repair_status),
            amount_to_repair: changed(&self.assessment.amount_to_repair, &baseline.assessment.amount_to_repair),
        };

        let patch = SectionPatch {
            not_applicable: changed(&self.not_applicable, &baseline.not_applicable),
            fields,
            assessment: (!triple.is_empty()).then_some(triple),
            ..Default::default()
        };

        (!patch.is_empty()).then_some(patch)
    }
}

impl Draft for AssessmentTriple {
    type Patch = AssessmentTriple;

    fn diff(&self, baseline: &Self) -> Option<AssessmentTriple> {
        let patch = AssessmentTriple {
            condition: changed(&self.condition, &baseline.condition),
            repair_status: changed(&self.repair_status, &baseline.repair_status),
            amount_to_repair: changed(&self.amount_to_repair, &baseline.amount_to_repair),
        };
        (!patch.is_empty()).then_some(patch)
    }
}

/// ブリッジの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Idle,
    Pending { deadline: Instant },
    Committing,
}

/// 自動保存ブリッジ（1編集セッションにつき1つ）
#[derive(Debug)]
pub struct AutosaveBridge<D: Draft> {
    key: SessionKey,
    delay: Duration,
    state: BridgeState,
    buffer: D,
    baseline: D,
    commits: u64,
}

impl<D: Draft> AutosaveBridge<D> {
    pub fn new(key: SessionKey, delay: Duration, initial: D) -> Self {
        Self {
            key,
            delay,
            state: BridgeState::Idle,
            buffer: initial.clone(),
            baseline: initial,
            commits: 0,
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn buffer(&self) -> &D {
        &self.buffer
    }

    /// コミット回数
    pub fn commits(&self) -> u64 {
        self.commits
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            BridgeState::Pending { deadline } => Some(deadline),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, BridgeState::Pending { .. })
    }

    /// ユーザー編集。タイマーを（再）スタートする
    pub fn edit(&mut self, now: Instant, f: impl FnOnce(&mut D)) {
        f(&mut self.buffer);
        self.state = BridgeState::Pending {
            deadline: now + self.delay,
        };
    }

    /// 別の書き手による再設定。編集とみなさず、保留中のタイマーも止める
    pub fn reset(&mut self, value: D) {
        if self.is_pending() {
            tracing::debug!("pending edits superseded by external reset: {}", self.key);
        }
        self.buffer = value.clone();
        self.baseline = value;
        self.state = BridgeState::Idle;
    }

    /// 期限切れならコミットする。コミットしたら true
    pub fn poll<T: CommitTarget<D::Patch>>(&mut self, now: Instant, target: &mut T) -> Result<bool> {
        match self.state {
            BridgeState::Pending { deadline } if now >= deadline => self.commit(target),
            _ => Ok(false),
        }
    }

    /// デバウンスを待たずにコミットする
    pub fn flush<T: CommitTarget<D::Patch>>(&mut self, target: &mut T) -> Result<bool> {
        self.commit(target)
    }

    fn commit<T: CommitTarget<D::Patch>>(&mut self, target: &mut T) -> Result<bool> {
        let previous = std::mem::replace(&mut self.state, BridgeState::Committing);
        let patch = self.buffer.diff(&self.baseline);
        let result = match &patch {
            Some(p) => target.commit(&self.key, p).map(|_| true),
            None => Ok(false),
        };

        self.state = match (&result, previous) {
            (Err(_), BridgeState::Pending { deadline }) => BridgeState::Pending {
                deadline: deadline + self.delay,
            },
            _ => BridgeState::Idle,
        };

        match &result {
            Ok(true) => {
                self.baseline = self.buffer.clone();
                self.commits += 1;
                tracing::debug!("autosave committed: {}", self.key);
            }
            Err(e) => tracing::warn!("autosave commit failed: {}: {}", self.key, e),
            Ok(false) => {}
        }
        result
    }

    /// ストアに届いていない編集があるか（保留中・コミット失敗を含む）
    pub fn has_unsaved(&self) -> bool {
        self.buffer.diff(&self.baseline).is_some()
    }

    /// セッション終了。未コミットのパッチはコミットせず捨て、捨てたパッチを返す
    pub fn teardown(self) -> Option<D::Patch> {
        let dropped = self.buffer.diff(&self.baseline);
        if dropped.is_some() {
            tracing::warn!("uncommitted edits dropped on teardown: {}", self.key);
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::merge::Merge;
    use crate::tree::FormArea;
    use crate::triple::{Condition, RepairStatus};

    #[derive(Default)]
    struct Recorder {
        patches: Vec<SectionPatch>,
    }

    impl CommitTarget<SectionPatch> for Recorder {
        fn commit(&mut self, _key: &SessionKey, patch: &SectionPatch) -> Result<()> {
            self.patches.push(patch.clone());
            Ok(())
        }
    }

    struct Failing;

    impl CommitTarget<SectionPatch> for Failing {
        fn commit(&mut self, key: &SessionKey, _patch: &SectionPatch) -> Result<()> {
            Err(Error::AssessmentNotFound(key.assessment_id.clone()))
        }
    }

    fn key() -> SessionKey {
        SessionKey::new("a1", SectionPath::new(FormArea::BuildingEnvelope, "roofing"))
    }

    fn bridge() -> AutosaveBridge<SectionDraft> {
        AutosaveBridge::new(key(), DEFAULT_DEBOUNCE, SectionDraft::default())
    }

    #[test]
    fn test_edit_moves_to_pending() {
        let t0 = Instant::now();
        let mut b = bridge();
        assert_eq!(b.state(), BridgeState::Idle);

        b.edit(t0, |d| d.set_field("notes", "a"));
        assert_eq!(b.deadline(), Some(t0 + DEFAULT_DEBOUNCE));
    }

    #[test]
    fn test_debounce_coalesces_edits() {
        let t0 = Instant::now();
        let mut b = bridge();
        let mut target = Recorder::default();

        for (i, text) in ["r", "ru", "rus", "rust"].iter().enumerate() {
            let now = t0 + Duration::from_millis(100 * i as u64);
            b.edit(now, |d| d.set_field("notes", *text));
            assert!(!b.poll(now + Duration::from_millis(50), &mut target).unwrap());
        }

        // 最後の編集から300ms経過するまではコミットしない
        let last = t0 + Duration::from_millis(300);
        assert!(!b.poll(last + Duration::from_millis(299), &mut target).unwrap());
        assert!(b.poll(last + DEFAULT_DEBOUNCE, &mut target).unwrap());

        assert_eq!(target.patches.len(), 1);
        assert_eq!(target.patches[0], SectionPatch::field("notes", "rust"));
        assert_eq!(b.state(), BridgeState::Idle);
        assert_eq!(b.commits(), 1);
    }

    #[test]
    fn test_untouched_fields_are_not_sent() {
        let node = SectionNode::default().merged(&SectionPatch::field("notes", "old"));
        let mut b = AutosaveBridge::new(key(), DEFAULT_DEBOUNCE, SectionDraft::from_node(Some(&node)));
        let mut target = Recorder::default();
        let t0 = Instant::now();

        b.edit(t0, |d| d.assessment.condition = Some(Condition::Poor));
        b.poll(t0 + DEFAULT_DEBOUNCE, &mut target).unwrap();

        let patch = &target.patches[0];
        assert!(patch.fields.is_empty());
        assert!(patch.not_applicable.is_none());
        assert_eq!(patch.assessment, Some(AssessmentTriple::with_condition(Condition::Poor)));
    }

    #[test]
    fn test_unchanged_buffer_commits_nothing() {
        let mut b = bridge();
        let mut target = Recorder::default();
        let t0 = Instant::now();

        b.edit(t0, |d| d.set_field("notes", "x"));
        b.edit(t0, |d| {
            d.fields.remove("notes");
        });
        assert!(!b.poll(t0 + DEFAULT_DEBOUNCE, &mut target).unwrap());
        assert!(target.patches.is_empty());
        assert_eq!(b.state(), BridgeState::Idle);
    }

    #[test]
    fn test_second_commit_sends_only_new_changes() {
        let mut b = bridge();
        let mut target = Recorder::default();
        let t0 = Instant::now();

        b.edit(t0, |d| d.set_field("notes", "x"));
        b.poll(t0 + DEFAULT_DEBOUNCE, &mut target).unwrap();

        let t1 = t0 + Duration::from_secs(1);
        b.edit(t1, |d| d.assessment.repair_status = Some(RepairStatus::ST));
        b.poll(t1 + DEFAULT_DEBOUNCE, &mut target).unwrap();

        assert_eq!(target.patches.len(), 2);
        assert!(target.patches[1].fields.is_empty());
        assert_eq!(
            target.patches[1].assessment.as_ref().and_then(|a| a.repair_status),
            Some(RepairStatus::ST)
        );
    }

    #[test]
    fn test_teardown_drops_pending_patch() {
        let mut b = bridge();
        let t0 = Instant::now();
        b.edit(t0, |d| d.set_field("notes", "unsaved"));

        let dropped = b.teardown();
        assert_eq!(dropped, Some(SectionPatch::field("notes", "unsaved")));
    }

    #[test]
    fn test_teardown_when_idle_drops_nothing() {
        let mut b = bridge();
        let mut target = Recorder::default();
        let t0 = Instant::now();
        b.edit(t0, |d| d.set_field("notes", "saved"));
        b.poll(t0 + DEFAULT_DEBOUNCE, &mut target).unwrap();
        assert_eq!(b.teardown(), None);
    }

    #[test]
    fn test_external_reset_is_not_an_edit() {
        let mut b = bridge();
        let mut target = Recorder::default();
        let t0 = Instant::now();

        b.edit(t0, |d| d.set_field("notes", "mine"));
        let mut external = SectionDraft::default();
        external.set_field("notes", "theirs");
        b.reset(external.clone());

        assert_eq!(b.state(), BridgeState::Idle);
        assert!(!b.poll(t0 + Duration::from_secs(10), &mut target).unwrap());
        assert!(target.patches.is_empty());
        assert_eq!(b.buffer(), &external);
    }

    #[test]
    fn test_flush_commits_immediately() {
        let mut b = bridge();
        let mut target = Recorder::default();
        b.edit(Instant::now(), |d| d.clear_field("notes"));

        assert!(b.flush(&mut target).unwrap());
        assert_eq!(target.patches[0], SectionPatch::field("notes", ""));
        assert!(!b.is_pending());
    }

    #[test]
    fn test_failed_commit_stays_pending_and_retries() {
        let mut b = bridge();
        let t0 = Instant::now();
        b.edit(t0, |d| d.set_field("notes", "x"));

        let first = t0 + DEFAULT_DEBOUNCE;
        assert!(b.poll(first, &mut Failing).is_err());
        assert_eq!(b.deadline(), Some(first + DEFAULT_DEBOUNCE));
        assert!(b.has_unsaved());

        let mut target = Recorder::default();
        assert!(!b.poll(first, &mut target).unwrap());
        assert!(b.poll(first + DEFAULT_DEBOUNCE, &mut target).unwrap());
        assert_eq!(target.patches, vec![SectionPatch::field("notes", "x")]);
        assert!(!b.has_unsaved());
    }

    #[test]
    fn test_teardown_after_failed_commit_reports_dropped_patch() {
        let mut b = bridge();
        let t0 = Instant::now();
        b.edit(t0, |d| d.set_field("notes", "lost"));
        assert!(b.poll(t0 + DEFAULT_DEBOUNCE, &mut Failing).is_err());

        assert_eq!(b.teardown(), Some(SectionPatch::field("notes", "lost")));
    }

    #[test]
    fn test_failed_flush_from_idle_still_reported_on_teardown() {
        let mut b = bridge();
        let t0 = Instant::now();
        b.edit(t0, |d| d.set_field("notes", "y"));
        assert!(b.flush(&mut Failing).is_err());
        assert_eq!(b.state(), BridgeState::Pending { deadline: t0 + DEFAULT_DEBOUNCE * 2 });

        assert_eq!(b.teardown(), Some(SectionPatch::field("notes", "y")));
    }

    #[test]
    fn test_triple_draft_diff() {
        let baseline = AssessmentTriple::with_condition(Condition::Fair);
        let mut current = baseline.clone();
        assert_eq!(current.diff(&baseline), None);

        current.amount_to_repair = Some("500".into());
        assert_eq!(
            current.diff(&baseline),
            Some(AssessmentTriple {
                amount_to_repair: Some("500".into()),
                ..Default::default()
            })
        );
    }
}
