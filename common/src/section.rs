//! セクションノード
//!
//! 1つの調査セクション（屋根、扉など）の複合ノード。
//! `NotApplicable` を立てても中のデータは消さない（画面側が編集を抑止するだけ）。

use crate::material::MaterialCollection;
use crate::merge::{
    merge_fields, merge_map, merge_record, overwrite, FieldValue, Fields, FieldsPatch, Merge,
};
use crate::toggle::ToggleSet;
use crate::triple::AssessmentTriple;
use crate::unit::UnitList;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// セクションノード
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SectionNode {
    #[serde(rename = "NotApplicable")]
    pub not_applicable: bool,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: Fields,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub selections: BTreeMap<String, ToggleSet>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment: Option<AssessmentTriple>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub subsections: BTreeMap<String, SectionNode>,

    /// 材料コレクション（専用操作でのみ変更する）
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub materials: BTreeMap<String, MaterialCollection>,

    /// 設備ユニットリスト（専用操作でのみ変更する）
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub units: BTreeMap<String, UnitList>,
}

/// セクションの部分パッチ
///
/// 材料・ユニットのコレクションは含まない（専用操作でのみ変更する）。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SectionPatch {
    #[serde(rename = "NotApplicable", skip_serializing_if = "Option::is_none")]
    pub not_applicable: Option<bool>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: FieldsPatch,

    /// 配列は丸ごと置換
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub selections: BTreeMap<String, Option<ToggleSet>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment: Option<AssessmentTriple>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub subsections: BTreeMap<String, SectionPatch>,
}

impl SectionPatch {
    pub fn is_empty(&self) -> bool {
        self.not_applicable.is_none()
            && self.fields.values().all(|v| v.as_ref().map_or(true, FieldValue::is_null))
            && self.selections.values().all(Option::is_none)
            && self.assessment.is_none()
            && self.subsections.values().all(SectionPatch::is_empty)
    }

    pub fn not_applicable(flag: bool) -> Self {
        Self {
            not_applicable: Some(flag),
            ..Default::default()
        }
    }

    pub fn assessment(triple: AssessmentTriple) -> Self {
        Self {
            assessment: Some(triple),
            ..Default::default()
        }
    }

    pub fn field(key: &str, value: impl Into<FieldValue>) -> Self {
        let mut fields = FieldsPatch::new();
        fields.insert(key.to_string(), Some(value.into()));
        Self {
            fields,
            ..Default::default()
        }
    }

    pub fn selection(name: &str, set: ToggleSet) -> Self {
        let mut selections = BTreeMap::new();
        selections.insert(name.to_string(), Some(set));
        Self {
            selections,
            ..Default::default()
        }
    }

    /// サブセクション名の連なりの下に `self` を入れ子にする
    pub fn nested_under(self, names: &[String]) -> Self {
        names.iter().rev().fold(self, |inner, name| {
            let mut subsections = BTreeMap::new();
            subsections.insert(name.clone(), inner);
            SectionPatch {
                subsections,
                ..Default::default()
            }
        })
    }
}

impl Merge for SectionNode {
    type Patch = SectionPatch;

    fn merge(&mut self, patch: &SectionPatch) {
        overwrite(&mut self.not_applicable, &patch.not_applicable);
        merge_fields(&mut self.fields, &patch.fields);
        for (name, set) in &patch.selections {
            if let Some(set) = set {
                self.selections.insert(name.clone(), set.clone());
            }
        }
        merge_record(&mut self.assessment, &patch.assessment);
        merge_map(&mut self.subsections, &patch.subsections);
    }
}

impl SectionNode {
    /// 選択集合を切り替える（即時コミット経路）
    pub fn toggle_selection(&mut self, field: &str, option: &str, present: bool) -> bool {
        self.selections
            .entry(field.to_string())
            .or_default()
            .toggle(option, present)
    }

    pub fn selection(&self, field: &str) -> Option<&ToggleSet> {
        self.selections.get(field)
    }

    /// サブセクションの連なりを辿る
    pub fn descend(&self, names: &[String]) -> Option<&SectionNode> {
        names
            .iter()
            .try_fold(self, |node, name| node.subsections.get(name))
    }

    /// サブセクションの連なりを辿り、無ければ作る
    pub fn descend_mut(&mut self, names: &[String]) -> &mut SectionNode {
        names.iter().fold(self, |node, name| {
            node.subsections.entry(name.clone()).or_default()
        })
    }

    pub fn materials_mut(&mut self, collection: &str) -> &mut MaterialCollection {
        self.materials.entry(collection.to_string()).or_default()
    }

    pub fn units_mut(&mut self, list: &str) -> &mut UnitList {
        self.units.entry(list.to_string()).or_default()
    }
}
