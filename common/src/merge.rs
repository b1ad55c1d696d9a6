//! 部分パッチのマージ
//!
//! パッチに含まれるキーだけを上書きし、含まれないキーには触れない。
//! - レコード（入れ子の構造）は再帰的にフィールド単位でマージ
//! - 配列はプリミティブ扱い（丸ごと置換、要素単位のマージはしない）
//! - `None`（JSONの`null`）は「指定なし」としてスキップ（レコードの中でも同じ）
//!
//! スカラーをパッチで消したい場合は空文字などの型付きの空値を渡す。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// パッチを適用できるノード
///
/// 同じパッチを2回適用しても1回と同じ結果になること（冪等）。
pub trait Merge {
    type Patch;

    fn merge(&mut self, patch: &Self::Patch);

    fn merged(mut self, patch: &Self::Patch) -> Self
    where
        Self: Sized,
    {
        self.merge(patch);
        self
    }
}

/// スカラー: パッチ側が`Some`なら上書き
pub fn merge_scalar<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if let Some(v) = value {
        *slot = Some(v.clone());
    }
}

/// 必須スカラー: パッチ側が`Some`なら上書き
pub fn overwrite<T: Clone>(slot: &mut T, value: &Option<T>) {
    if let Some(v) = value {
        *slot = v.clone();
    }
}

/// 省略可能なレコード: 未作成なら空のノードから始めてマージ
pub fn merge_record<T: Merge + Default>(slot: &mut Option<T>, patch: &Option<T::Patch>) {
    if let Some(p) = patch {
        slot.get_or_insert_with(T::default).merge(p);
    }
}

/// 名前付きレコードのマップ: キーごとに空ノードから作成してマージ
pub fn merge_map<V: Merge + Default>(node: &mut BTreeMap<String, V>, patch: &BTreeMap<String, V::Patch>) {
    for (key, p) in patch {
        node.entry(key.clone()).or_default().merge(p);
    }
}

/// 自由形式フィールドの値
///
/// レコードかどうかはバリアントで判定する（配列・スカラーは置換）。
/// `Null` はパッチ中の「指定なし」で、マージ後のノードには残らない。
/// 数値は `serde_json::Number` のまま持ち、整数は整数として保存される。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<FieldValue>),
    Record(Fields),
}

/// 自由形式フィールド
pub type Fields = BTreeMap<String, FieldValue>;

/// 自由形式フィールドのパッチ（`None`は指定なし）
pub type FieldsPatch = BTreeMap<String, Option<FieldValue>>;

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        FieldValue::Text(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_record(&self) -> bool {
        matches!(self, FieldValue::Record(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// 保存用の値。レコード内の `Null` を再帰的に取り除く
    fn pruned(&self) -> FieldValue {
        match self {
            FieldValue::Record(fields) => FieldValue::Record(
                fields
                    .iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| (k.clone(), v.pruned()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n.into())
    }
}

/// 有限でない値（NaN・無限大）は `Null` になる
impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        serde_json::Number::from_f64(n)
            .map(FieldValue::Number)
            .unwrap_or(FieldValue::Null)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Bool(b) => write!(f, "{}", if *b { "yes" } else { "no" }),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                f.write_str(&parts.join(", "))
            }
            FieldValue::Record(fields) => {
                let parts: Vec<String> = fields.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

/// 値1つをマージ。両方レコードのときだけ再帰し、それ以外は置換
fn merge_value(slot: &mut FieldValue, incoming: &FieldValue) {
    match (slot, incoming) {
        (_, FieldValue::Null) => {}
        (FieldValue::Record(node), FieldValue::Record(patch)) => {
            for (key, value) in patch {
                merge_entry(node, key, value);
            }
        }
        (slot, incoming) => *slot = incoming.pruned(),
    }
}

fn merge_entry(node: &mut Fields, key: &str, incoming: &FieldValue) {
    if incoming.is_null() {
        return;
    }
    match node.get_mut(key) {
        Some(slot) => merge_value(slot, incoming),
        None => {
            node.insert(key.to_string(), incoming.pruned());
        }
    }
}

/// 自由形式フィールドにパッチを適用する
pub fn merge_fields(node: &mut Fields, patch: &FieldsPatch) {
    for (key, value) in patch {
        if let Some(value) = value {
            merge_entry(node, key, value);
        }
    }
}

/// `Fields` から `FieldsPatch` を作る（全キー指定）
pub fn fields_to_patch(fields: &Fields) -> FieldsPatch {
    fields.iter().map(|(k, v)| (k.clone(), Some(v.clone()))).collect()
}
