//! 評価トリプル（状態・補修区分・補修費）
//!
//! 調査項目ごとの最小単位の評価値。どのフィールドも未評価（None）でありうる。

use crate::merge::{merge_scalar, Merge};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Good,
    Fair,
    Poor,
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Good => "good",
            Condition::Fair => "fair",
            Condition::Poor => "poor",
        }
    }
}

impl FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "good" | "g" => Ok(Condition::Good),
            "fair" | "f" => Ok(Condition::Fair),
            "poor" | "p" => Ok(Condition::Poor),
            _ => Err(format!("Unknown condition: {}. Use good, fair, or poor", s)),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 補修区分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepairStatus {
    /// 即時補修
    IR,
    /// 短期補修
    ST,
    /// 更新積立
    RR,
    /// 日常保守
    RM,
    /// 要調査
    INV,
    /// 対象外
    NA,
}

impl RepairStatus {
    pub const ALL: [RepairStatus; 6] = [
        RepairStatus::IR,
        RepairStatus::ST,
        RepairStatus::RR,
        RepairStatus::RM,
        RepairStatus::INV,
        RepairStatus::NA,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RepairStatus::IR => "IR",
            RepairStatus::ST => "ST",
            RepairStatus::RR => "RR",
            RepairStatus::RM => "RM",
            RepairStatus::INV => "INV",
            RepairStatus::NA => "NA",
        }
    }

    /// 表示ラベル
    pub fn label(&self) -> &'static str {
        match self {
            RepairStatus::IR => "Immediate Repair",
            RepairStatus::ST => "Short Term",
            RepairStatus::RR => "Replacement Reserve",
            RepairStatus::RM => "Routine Maintenance",
            RepairStatus::INV => "Investigate",
            RepairStatus::NA => "Not Applicable",
        }
    }
}

impl FromStr for RepairStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        RepairStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == upper)
            .ok_or_else(|| format!("Unknown repair status: {}. Use IR, ST, RR, RM, INV, or NA", s))
    }
}

impl fmt::Display for RepairStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 評価トリプル
///
/// パッチ型も同じ構造体を使う（Noneは「指定なし」）。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentTriple {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repair_status: Option<RepairStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_to_repair: Option<String>,
}

impl AssessmentTriple {
    pub fn with_condition(condition: Condition) -> Self {
        Self {
            condition: Some(condition),
            ..Default::default()
        }
    }

    /// まだ一度も評価されていないか
    pub fn is_empty(&self) -> bool {
        self.condition.is_none() && self.repair_status.is_none() && self.amount_to_repair.is_none()
    }
}

impl Merge for AssessmentTriple {
    type Patch = AssessmentTriple;

    fn merge(&mut self, patch: &AssessmentTriple) {
        merge_scalar(&mut self.condition, &patch.condition);
        merge_scalar(&mut self.repair_status, &patch.repair_status);
        merge_scalar(&mut self.amount_to_repair, &patch.amount_to_repair);
    }
}
