//! チェックリスト用のトグル集合
//!
//! 順序付きだが集合として扱う文字列IDのリスト。
//! カタログにないIDも拒否せず保持する。

use serde::{Deserialize, Serialize};

/// `set` に対して `id` を追加/除去した新しいリストを返す
///
/// - `present = true` で既存: 変化なし（重複させない）
/// - `present = true` で未登録: 末尾に追加（挿入順）
/// - `present = false`: 該当IDをすべて除去
pub fn toggle(set: &[String], id: &str, present: bool) -> Vec<String> {
    if present {
        let mut next = set.to_vec();
        if !next.iter().any(|s| s == id) {
            next.push(id.to_string());
        }
        next
    } else {
        set.iter().filter(|s| *s != id).cloned().collect()
    }
}

/// 重複なしの順序付き選択集合
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ToggleSet(Vec<String>);

impl ToggleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 選択状態を切り替える。変化があれば true
    pub fn toggle(&mut self, id: &str, present: bool) -> bool {
        let next = toggle(&self.0, id, present);
        let changed = next != self.0;
        self.0 = next;
        changed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|s| s == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for ToggleSet {
    /// 保存データに重複があっても先勝ちで1つにまとめる
    fn from(ids: Vec<String>) -> Self {
        let mut set = Vec::with_capacity(ids.len());
        for id in ids {
            if !set.contains(&id) {
                set.push(id);
            }
        }
        Self(set)
    }
}

impl From<ToggleSet> for Vec<String> {
    fn from(set: ToggleSet) -> Self {
        set.0
    }
}

impl<'a> FromIterator<&'a str> for ToggleSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self::from(iter.into_iter().map(String::from).collect::<Vec<_>>())
    }
}
