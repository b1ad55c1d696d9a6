//! 材料コレクション
//!
//! 「M個の候補からN個を選び、それぞれに評価を付ける」ためのキー付き集合。
//! キーが存在すること自体が「選択済み」を表す。選択解除でエントリは消える（墓標なし）。

use crate::input::parse_quantity;
use crate::merge::{merge_scalar, Merge};
use crate::triple::AssessmentTriple;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 材料ごとの評価
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialEntry {
    #[serde(flatten)]
    pub assessment: AssessmentTriple,

    /// 実効経過年数
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_age: Option<u32>,
}

impl MaterialEntry {
    /// 経過年数のテキスト入力を反映したパッチ（不正値は 0）
    pub fn effective_age_patch(text: &str) -> Self {
        Self {
            effective_age: Some(parse_quantity(text)),
            ..Default::default()
        }
    }
}

impl Merge for MaterialEntry {
    type Patch = MaterialEntry;

    fn merge(&mut self, patch: &MaterialEntry) {
        self.assessment.merge(&patch.assessment);
        merge_scalar(&mut self.effective_age, &patch.effective_age);
    }
}

impl From<AssessmentTriple> for MaterialEntry {
    fn from(assessment: AssessmentTriple) -> Self {
        Self {
            assessment,
            effective_age: None,
        }
    }
}

/// 材料ID → 評価
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialCollection {
    entries: BTreeMap<String, MaterialEntry>,
}

impl MaterialCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// 選択する。既に選択済みなら何もしない（既存の評価を消さない）。
    /// 新規に選択したら true
    pub fn select(&mut self, id: &str, initial: &MaterialEntry) -> bool {
        if self.entries.contains_key(id) {
            return false;
        }
        self.entries.insert(id.to_string(), initial.clone());
        true
    }

    /// 選択済みの材料の評価を更新する。未選択なら何もしない（勝手に選択しない）
    pub fn update(&mut self, id: &str, patch: &MaterialEntry) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.merge(patch);
                true
            }
            None => {
                tracing::debug!("update on unselected material ignored: {id}");
                false
            }
        }
    }

    /// 選択解除。評価ごと破棄し、破棄したエントリを返す
    pub fn deselect(&mut self, id: &str) -> Option<MaterialEntry> {
        self.entries.remove(id)
    }

    /// チェックボックス操作: on なら空の評価で選択、off なら選択解除
    pub fn toggle(&mut self, id: &str, present: bool) -> bool {
        if present {
            self.select(id, &MaterialEntry::default())
        } else {
            self.deselect(id).is_some()
        }
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&MaterialEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 表示順のエントリ一覧
    ///
    /// カタログ順に並べ、カタログにないIDはその後ろにID順で続ける。
    pub fn entries<'a>(&'a self, catalog: &[&str]) -> Vec<(&'a str, &'a MaterialEntry)> {
        let mut ordered: Vec<(&str, &MaterialEntry)> = catalog
            .iter()
            .filter_map(|id| self.entries.get_key_value(*id))
            .map(|(k, v)| (k.as_str(), v))
            .collect();

        ordered.extend(
            self.entries
                .iter()
                .filter(|(k, _)| !catalog.contains(&k.as_str()))
                .map(|(k, v)| (k.as_str(), v)),
        );
        ordered
    }

    /// ID順のイテレータ
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MaterialEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}
