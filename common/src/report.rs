//! 状況レポート
//!
//! 評価を「評価済み項目の一覧」に平坦化する。
//! セクション自体の評価・材料ごとの評価・設備ユニットごとの評価を1行ずつ並べる。

use crate::catalog;
use crate::input::parse_amount;
use crate::section::SectionNode;
use crate::tree::{Assessment, FormArea};
use crate::triple::{AssessmentTriple, Condition, RepairStatus};
use serde::Serialize;

/// 行の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Section,
    Material,
    Unit,
}

/// レポート1行
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub area: FormArea,
    pub section: String,
    pub item: String,
    pub kind: ItemKind,
    pub condition: Option<Condition>,
    pub repair_status: Option<RepairStatus>,
    pub amount_to_repair: Option<String>,
    pub effective_age: Option<u32>,
    pub not_applicable: bool,
}

impl ReportRow {
    fn new(area: FormArea, section: &str, item: String, kind: ItemKind, triple: &AssessmentTriple, not_applicable: bool) -> Self {
        Self {
            area,
            section: section.to_string(),
            item,
            kind,
            condition: triple.condition,
            repair_status: triple.repair_status,
            amount_to_repair: triple.amount_to_repair.clone(),
            effective_age: None,
            not_applicable,
        }
    }

    /// 金額（不正なテキストは 0）
    pub fn amount(&self) -> f64 {
        self.amount_to_repair.as_deref().map(parse_amount).unwrap_or(0.0)
    }
}

/// 評価をレポート行に平坦化する（領域順 → セクション名順）
pub fn rows(assessment: &Assessment) -> Vec<ReportRow> {
    let mut out = Vec::new();
    for area in FormArea::ALL {
        for (name, node) in assessment.sections(area) {
            collect(area, name, name.to_string(), node, false, &mut out);
        }
    }
    out
}

fn collect(area: FormArea, section: &str, label: String, node: &SectionNode, parent_na: bool, out: &mut Vec<ReportRow>) {
    let na = parent_na || node.not_applicable;

    match &node.assessment {
        Some(triple) if !triple.is_empty() => {
            out.push(ReportRow::new(area, section, label.clone(), ItemKind::Section, triple, na));
        }
        _ if node.not_applicable => {
            out.push(ReportRow::new(area, section, label.clone(), ItemKind::Section, &AssessmentTriple::default(), na));
        }
        _ => {}
    }

    for (collection, materials) in &node.materials {
        for (material, entry) in materials.entries(catalog::options_for(collection)) {
            let mut row = ReportRow::new(
                area,
                section,
                format!("{label} / {collection}: {material}"),
                ItemKind::Material,
                &entry.assessment,
                na,
            );
            row.effective_age = entry.effective_age;
            out.push(row);
        }
    }

    for (list, units) in &node.units {
        for (i, unit) in units.list().iter().enumerate() {
            let name = unit
                .fields
                .get("name")
                .or_else(|| unit.fields.get("manufacturer"))
                .map(|v| format!(" ({v})"))
                .unwrap_or_default();
            out.push(ReportRow::new(
                area,
                section,
                format!("{label} / {list} #{}{name}", i + 1),
                ItemKind::Unit,
                &unit.assessment,
                na,
            ));
        }
    }

    for (name, child) in &node.subsections {
        collect(area, section, format!("{label}/{name}"), child, na, out);
    }
}

/// 補修費合計（対象外の行は除く）
pub fn total_repair_cost(rows: &[ReportRow]) -> f64 {
    rows.iter().filter(|r| !r.not_applicable).map(ReportRow::amount).sum()
}
