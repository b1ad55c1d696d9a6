//! 編集セッション管理
//!
//! セッションキーごとに自動保存ブリッジを1つだけ持つ。
//! アクティブ評価の切り替えは同期的なバリアとして扱い、
//! 前の評価のブリッジをすべて破棄してからポインタを付け替える。

use crate::autosave::{AutosaveBridge, SectionDraft, SessionKey};
use crate::error::{Error, Result};
use crate::section::SectionPatch;
use crate::tree::AssessmentTree;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// 開いている編集セッションの一覧
#[derive(Debug)]
pub struct SessionRegistry {
    delay: Duration,
    bridges: BTreeMap<SessionKey, AutosaveBridge<SectionDraft>>,
}

impl SessionRegistry {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            bridges: BTreeMap::new(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// セッションを開き、ストアの内容をバッファに写す。
    /// 既に開いていれば外部再設定として読み直す（コミットは予約しない）
    pub fn open(&mut self, tree: &AssessmentTree, key: SessionKey) -> Result<()> {
        let node = tree.section(&key.assessment_id, &key.path)?;
        let draft = SectionDraft::from_node(node);
        match self.bridges.get_mut(&key) {
            Some(bridge) => bridge.reset(draft),
            None => {
                let bridge = AutosaveBridge::new(key.clone(), self.delay, draft);
                self.bridges.insert(key, bridge);
            }
        }
        Ok(())
    }

    /// ストア側が別経路で変わったときにバッファを読み直す
    pub fn refresh(&mut self, tree: &AssessmentTree, key: &SessionKey) -> Result<()> {
        if self.bridges.contains_key(key) {
            self.open(tree, key.clone())?;
        }
        Ok(())
    }

    pub fn is_open(&self, key: &SessionKey) -> bool {
        self.bridges.contains_key(key)
    }

    pub fn bridge(&self, key: &SessionKey) -> Option<&AutosaveBridge<SectionDraft>> {
        self.bridges.get(key)
    }

    pub fn len(&self) -> usize {
        self.bridges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bridges.is_empty()
    }

    /// ユーザー編集を反映する。開いていないセッションなら false
    pub fn edit(&mut self, key: &SessionKey, now: Instant, f: impl FnOnce(&mut SectionDraft)) -> bool {
        match self.bridges.get_mut(key) {
            Some(bridge) => {
                bridge.edit(now, f);
                true
            }
            None => false,
        }
    }

    /// 最も早い期限
    pub fn next_deadline(&self) -> Option<Instant> {
        self.bridges.values().filter_map(|b| b.deadline()).min()
    }

    /// 期限切れのセッションをすべてコミットし、コミット数を返す
    pub fn poll(&mut self, now: Instant, tree: &mut AssessmentTree) -> Result<usize> {
        let mut committed = 0;
        for bridge in self.bridges.values_mut() {
            if bridge.poll(now, tree)? {
                committed += 1;
            }
        }
        Ok(committed)
    }

    /// 指定セッションを即時コミットする
    pub fn flush(&mut self, key: &SessionKey, tree: &mut AssessmentTree) -> Result<bool> {
        match self.bridges.get_mut(key) {
            Some(bridge) => bridge.flush(tree),
            None => Ok(false),
        }
    }

    /// 全セッションを即時コミットする
    pub fn flush_all(&mut self, tree: &mut AssessmentTree) -> Result<usize> {
        let mut committed = 0;
        for bridge in self.bridges.values_mut() {
            if bridge.flush(tree)? {
                committed += 1;
            }
        }
        Ok(committed)
    }

    /// セッションを閉じる。保留中のパッチは捨てて返す
    pub fn close(&mut self, key: &SessionKey) -> Option<SectionPatch> {
        self.bridges.remove(key).and_then(AutosaveBridge::teardown)
    }

    /// 指定評価以外のセッションをすべて閉じ、捨てたパッチ数を返す
    pub fn teardown_except(&mut self, keep: &str) -> usize {
        let keys: Vec<SessionKey> = self
            .bridges
            .keys()
            .filter(|k| k.assessment_id != keep)
            .cloned()
            .collect();
        keys.iter().filter_map(|k| self.close(k)).count()
    }

    /// 指定評価のセッションをすべて閉じ、捨てたパッチ数を返す
    pub fn teardown_assessment(&mut self, id: &str) -> usize {
        let keys: Vec<SessionKey> = self
            .bridges
            .keys()
            .filter(|k| k.assessment_id == id)
            .cloned()
            .collect();
        keys.iter().filter_map(|k| self.close(k)).count()
    }
}

/// アクティブ評価を切り替える
///
/// 新しい評価以外のブリッジを先にすべて破棄（保留パッチは捨てる）してから
/// `activeId` を付け替える。捨てたパッチ数を返す。
pub fn switch_active(tree: &mut AssessmentTree, sessions: &mut SessionRegistry, id: &str) -> Result<usize> {
    if !tree.contains(id) {
        return Err(Error::AssessmentNotFound(id.to_string()));
    }
    let dropped = sessions.teardown_except(id);
    if dropped > 0 {
        tracing::warn!("{dropped} pending edit session(s) dropped by assessment switch");
    }
    tree.set_active(id)?;
    Ok(dropped)
}
