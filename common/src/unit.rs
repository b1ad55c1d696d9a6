//! 設備ユニットリスト
//!
//! チラー・ボイラー・給湯器など繰り返し入力する設備の順序付きリスト。
//! IDは生成時に一度だけ採番され、削除後も再利用されない。
//! 上限台数は画面側の制約であり、ここでは拒否しない。

use crate::merge::{merge_fields, FieldValue, Fields, FieldsPatch, Merge};
use crate::triple::AssessmentTriple;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// ユニット種別と画面上の上限台数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitKind {
    Chiller,
    Boiler,
    CoolingTower,
    WaterHeater,
    AirHandler,
    Generic,
}

impl UnitKind {
    /// 追加ボタンを無効化する台数
    pub fn max_units(&self) -> usize {
        match self {
            UnitKind::Chiller | UnitKind::Boiler | UnitKind::CoolingTower => 2,
            UnitKind::WaterHeater | UnitKind::AirHandler | UnitKind::Generic => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Chiller => "chiller",
            UnitKind::Boiler => "boiler",
            UnitKind::CoolingTower => "cooling-tower",
            UnitKind::WaterHeater => "water-heater",
            UnitKind::AirHandler => "air-handler",
            UnitKind::Generic => "generic",
        }
    }

    /// セクション内のリスト名（`chillers` など）
    pub fn list_name(&self) -> String {
        format!("{}s", self.as_str())
    }
}

impl FromStr for UnitKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace('_', "-");
        let key = key.trim_end_matches('s');
        match key {
            "chiller" => Ok(UnitKind::Chiller),
            "boiler" => Ok(UnitKind::Boiler),
            "cooling-tower" => Ok(UnitKind::CoolingTower),
            "water-heater" | "heater" => Ok(UnitKind::WaterHeater),
            "air-handler" | "ahu" => Ok(UnitKind::AirHandler),
            "generic" | "unit" => Ok(UnitKind::Generic),
            _ => Err(format!("Unknown unit kind: {}", s)),
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 設備1台分のレコード
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRecord {
    id: String,

    #[serde(default)]
    pub assessment: AssessmentTriple,

    #[serde(flatten)]
    pub fields: Fields,
}

impl UnitRecord {
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// ユニット更新パッチ（`id` キーは無視される）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment: Option<AssessmentTriple>,

    #[serde(flatten)]
    pub fields: FieldsPatch,
}

impl Merge for UnitRecord {
    type Patch = UnitPatch;

    fn merge(&mut self, patch: &UnitPatch) {
        if let Some(assessment) = &patch.assessment {
            self.assessment.merge(assessment);
        }
        // 自由形式側に紛れ込んだ "id" は捨てる（IDは不変）
        let mut fields = patch.fields.clone();
        fields.remove("id");
        fields.remove("assessment");
        merge_fields(&mut self.fields, &fields);
    }
}

/// 設備ユニットの順序付きリスト
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitList {
    units: Vec<UnitRecord>,
}

impl UnitList {
    pub fn new() -> Self {
        Self::default()
    }

    /// 末尾に追加して新しいIDを返す。上限台数はチェックしない
    pub fn add(&mut self, initial: Fields) -> String {
        self.add_with_assessment(initial, AssessmentTriple::default())
    }

    pub fn add_with_assessment(&mut self, initial: Fields, assessment: AssessmentTriple) -> String {
        let id = loop {
            // v4の衝突は現実的に起きないが、生存中のIDとは必ず重複させない
            let candidate = format!("unit-{}", uuid::Uuid::new_v4().simple());
            if !self.contains(&candidate) {
                break candidate;
            }
        };
        let mut fields = initial;
        fields.remove("id");
        fields.remove("assessment");
        self.units.push(UnitRecord {
            id: id.clone(),
            assessment,
            fields,
        });
        id
    }

    /// IDで更新。見つからなければ何もしない
    pub fn update(&mut self, id: &str, patch: &UnitPatch) -> bool {
        match self.units.iter_mut().find(|u| u.id == id) {
            Some(unit) => {
                unit.merge(patch);
                true
            }
            None => {
                tracing::debug!("update on unknown unit ignored: {id}");
                false
            }
        }
    }

    /// 評価だけを更新する
    pub fn update_assessment(&mut self, id: &str, assessment: &AssessmentTriple) -> bool {
        self.update(
            id,
            &UnitPatch {
                assessment: Some(assessment.clone()),
                ..Default::default()
            },
        )
    }

    /// IDで削除。見つからなければ何もしない
    pub fn remove(&mut self, id: &str) -> Option<UnitRecord> {
        let pos = self.units.iter().position(|u| u.id == id);
        match pos {
            Some(i) => Some(self.units.remove(i)),
            None => {
                tracing::debug!("remove on unknown unit ignored: {id}");
                None
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&UnitRecord> {
        self.units.iter().find(|u| u.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.units.iter().any(|u| u.id == id)
    }

    pub fn list(&self) -> &[UnitRecord] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// 画面側の「追加」ボタンを無効にすべきか
    pub fn is_at_capacity(&self, max: usize) -> bool {
        self.units.len() >= max
    }
}

/// 単一スカラーのフィールドパッチを作るヘルパー
pub fn field_patch(key: &str, value: impl Into<FieldValue>) -> UnitPatch {
    let mut fields = FieldsPatch::new();
    fields.insert(key.to_string(), Some(value.into()));
    UnitPatch {
        assessment: None,
        fields,
    }
}
