//! サブコマンドの実行
//!
//! 変更系のコマンドはすべて「ストア読み込み → 操作 → 保存」の順で動く。
//! 対象の評価は `--assessment` で明示するか、アクティブな評価を使う。

use crate::cli::{Commands, MaterialAction, SectionArgs, TripleArgs, UnitAction};
use crate::config::Config;
use crate::editor::{self, EditOptions};
use crate::error::{Result, SurveyError};
use crate::outbox::OutboxSubmitter;
use crate::photos::FolderPhotoSource;
use crate::storage::{self, Store};
use dialoguer::Confirm;
use std::path::{Path, PathBuf};
use std::time::Duration;
use survey_common::input::{normalize_amount, parse_quantity};
use survey_common::{
    catalog, report, switch_active, Assessment, AssessmentTree, AssessmentTriple, FieldValue, Fields,
    FormArea, MaterialEntry, PhotoSource, SectionNode, SectionPatch, SectionPath, SessionKey, SessionRegistry, UnitKind,
    UnitPatch,
};

/// コマンド実行の文脈
pub struct Context {
    pub config: Config,
    pub store_path: PathBuf,
    pub assessment: Option<String>,
}

impl Context {
    pub fn new(config: Config, store_override: Option<&Path>, assessment: Option<String>) -> Result<Self> {
        let store_path = config.resolve_store_path(store_override)?;
        Ok(Self {
            config,
            store_path,
            assessment,
        })
    }

    pub fn open_store(&self) -> Result<Store> {
        Store::open(&self.store_path)
    }

    /// 対象の評価ID（明示 > アクティブ）
    pub fn resolve_id(&self, tree: &AssessmentTree) -> Result<String> {
        match &self.assessment {
            Some(id) => {
                tree.assessment(id)?;
                Ok(id.clone())
            }
            None => tree
                .active_id()
                .map(str::to_string)
                .ok_or(SurveyError::NoActiveAssessment),
        }
    }

    /// 読み込み → 操作 → 保存
    pub fn mutate<T>(&self, f: impl FnOnce(&mut AssessmentTree, &str) -> Result<T>) -> Result<T> {
        let mut store = self.open_store()?;
        let id = self.resolve_id(&store.tree)?;
        let out = f(&mut store.tree, &id)?;
        store.save()?;
        Ok(out)
    }

    fn read<T>(&self, f: impl FnOnce(&Assessment) -> Result<T>) -> Result<T> {
        let store = self.open_store()?;
        let id = self.resolve_id(&store.tree)?;
        f(store.tree.assessment(&id)?)
    }
}

pub async fn run(ctx: Context, command: Commands) -> Result<()> {
    match command {
        Commands::New => cmd_new(&ctx),
        Commands::List => cmd_list(&ctx),
        Commands::Use { id } => cmd_use(&ctx, &id),
        Commands::Show { area, json } => cmd_show(&ctx, area, json),
        Commands::Patch { target, json } => cmd_patch(&ctx, &target, &json),
        Commands::Toggle { target, field, option, off } => cmd_toggle(&ctx, &target, &field, &option, !off),
        Commands::Na { target, flag } => cmd_na(&ctx, &target, flag),
        Commands::Material { action } => cmd_material(&ctx, action),
        Commands::Unit { action } => cmd_unit(&ctx, action),
        Commands::Edit { target, flush_on_exit, debounce_ms } => {
            cmd_edit(&ctx, &target, flush_on_exit, debounce_ms).await
        }
        Commands::Photos { area, step } => cmd_photos(&ctx, area, step),
        Commands::Submit => cmd_submit(&ctx),
        Commands::Export { output, title } => cmd_export(&ctx, &output, &title),
        Commands::Config {
            set_store,
            set_photo_root,
            set_outbox,
            set_debounce_ms,
            set_flush_on_exit,
            set_inspector,
            show,
        } => {
            let mut config = ctx.config;
            let mut changed = false;

            if let Some(path) = set_store {
                config.store_path = Some(path);
                changed = true;
            }
            if let Some(path) = set_photo_root {
                config.photo_root = Some(path);
                changed = true;
            }
            if let Some(path) = set_outbox {
                config.outbox_dir = Some(path);
                changed = true;
            }
            if let Some(ms) = set_debounce_ms {
                config.debounce_ms = ms;
                changed = true;
            }
            if let Some(flag) = set_flush_on_exit {
                config.flush_on_exit = flag;
                changed = true;
            }
            if let Some(name) = set_inspector {
                config.inspector = Some(name);
                changed = true;
            }

            if changed {
                config.save()?;
                println!("✔ 設定を保存しました: {}", Config::config_path()?.display());
            }

            if show || !changed {
                println!("設定:");
                println!("  ストア: {}", config.resolve_store_path(None)?.display());
                println!("  写真フォルダ: {}", config.resolve_photo_root()?.display());
                println!("  アウトボックス: {}", config.resolve_outbox_dir()?.display());
                println!("  デバウンス: {}ms", config.debounce_ms);
                println!("  終了時保存: {}", if config.flush_on_exit { "on" } else { "off" });
                println!("  調査者: {}", config.inspector.as_deref().unwrap_or("未設定"));
            }
            Ok(())
        }
    }
}

fn cmd_new(ctx: &Context) -> Result<()> {
    let mut store = ctx.open_store()?;
    let id = store.tree.create();
    store.save()?;

    println!("✔ 評価を作成しました: {}", id);
    if store.tree.active_id() == Some(id.as_str()) {
        println!("  アクティブな評価に設定しました");
    } else {
        println!("  切り替えるには: survey use {}", id);
    }
    Ok(())
}

fn cmd_list(ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    if store.tree.is_empty() {
        println!("評価がありません（survey new で作成）");
        return Ok(());
    }

    for assessment in store.tree.list() {
        let marker = if store.tree.active_id() == Some(assessment.id.as_str()) { "*" } else { " " };
        let submitted = assessment
            .submitted_at
            .map(|t| format!("  提出済み {}", t.format("%Y-%m-%d %H:%M")))
            .unwrap_or_default();
        println!(
            "{} {}  更新 {}{}",
            marker,
            assessment.id,
            assessment.last_modified.format("%Y-%m-%d %H:%M:%S"),
            submitted
        );
    }
    Ok(())
}

fn cmd_use(ctx: &Context, id: &str) -> Result<()> {
    let mut store = ctx.open_store()?;
    // CLIは1コマンドで終わるため開いているセッションはない
    let mut sessions = SessionRegistry::new(ctx.config.debounce());
    switch_active(&mut store.tree, &mut sessions, id)?;
    store.save()?;
    println!("✔ アクティブな評価: {}", id);
    Ok(())
}

fn cmd_show(ctx: &Context, area: Option<FormArea>, json: bool) -> Result<()> {
    ctx.read(|assessment| {
        if json {
            let out = match area {
                Some(area) => serde_json::to_string_pretty(&assessment.areas.get(&area))?,
                None => serde_json::to_string_pretty(assessment)?,
            };
            println!("{}", out);
            return Ok(());
        }

        println!("評価 {}", assessment.id);
        println!("  更新: {}", assessment.last_modified.format("%Y-%m-%d %H:%M:%S"));
        if let Some(at) = assessment.submitted_at {
            println!("  提出: {}", at.format("%Y-%m-%d %H:%M:%S"));
        }

        for form_area in FormArea::ALL {
            if area.is_some_and(|a| a != form_area) {
                continue;
            }
            let sections: Vec<_> = assessment.sections(form_area).collect();
            if sections.is_empty() {
                continue;
            }
            println!("\n■ {}", form_area.label());
            for (name, node) in sections {
                print_section(name, node, 1);
            }
        }
        Ok(())
    })
}

fn print_section(name: &str, node: &SectionNode, depth: usize) {
    let indent = "  ".repeat(depth);
    let na = if node.not_applicable { " [対象外]" } else { "" };
    println!("{}{}{}", indent, name, na);

    if let Some(triple) = &node.assessment {
        if !triple.is_empty() {
            println!("{}  評価: {}", indent, format_triple(triple));
        }
    }
    for (key, value) in &node.fields {
        println!("{}  {} = {}", indent, key, value);
    }
    for (field, set) in &node.selections {
        println!("{}  {}: [{}]", indent, field, set.iter().collect::<Vec<_>>().join(", "));
    }
    for (collection, materials) in &node.materials {
        for (material, entry) in materials.entries(catalog::options_for(collection)) {
            println!("{}  {}: {} {}", indent, collection, material, format_material(entry));
        }
    }
    for (list, units) in &node.units {
        for (i, unit) in units.list().iter().enumerate() {
            println!("{}  {} #{} ({}) {}", indent, list, i + 1, unit.id(), format_triple(&unit.assessment));
        }
    }
    for (sub, child) in &node.subsections {
        print_section(sub, child, depth + 1);
    }
}

fn format_triple(triple: &AssessmentTriple) -> String {
    format!(
        "{} / {} / {}",
        triple.condition.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
        triple.repair_status.map(|s| s.to_string()).unwrap_or_else(|| "-".into()),
        triple.amount_to_repair.as_deref().unwrap_or("-"),
    )
}

fn format_material(entry: &MaterialEntry) -> String {
    match entry.effective_age {
        Some(age) => format!("{}  経過{}年", format_triple(&entry.assessment), age),
        None => format_triple(&entry.assessment),
    }
}

fn cmd_patch(ctx: &Context, target: &SectionArgs, json: &str) -> Result<()> {
    let path = target.path()?;
    let patch: SectionPatch = serde_json::from_str(json)?;
    if patch.is_empty() {
        println!("変更はありません");
        return Ok(());
    }
    ctx.mutate(|tree, id| Ok(tree.update_section(id, &path, &patch)?))?;
    println!("✔ {} を更新しました", path);
    Ok(())
}

fn cmd_toggle(ctx: &Context, target: &SectionArgs, field: &str, option: &str, present: bool) -> Result<()> {
    let path = target.path()?;
    let changed = ctx.mutate(|tree, id| Ok(tree.toggle_selection(id, &path, field, option, present)?))?;
    let state = if present { "選択" } else { "解除" };
    if changed {
        println!("✔ {} {}: {} を{}しました", path, field, option, state);
    } else {
        println!("変更なし（{} は既に{}済み）", option, state);
    }
    Ok(())
}

fn cmd_na(ctx: &Context, target: &SectionArgs, flag: bool) -> Result<()> {
    let path = target.path()?;
    ctx.mutate(|tree, id| Ok(tree.set_not_applicable(id, &path, flag)?))?;
    println!("✔ {} 対象外: {}", path, if flag { "on" } else { "off" });
    Ok(())
}

/// 引数の3項目をパッチにする（金額は数値に正規化）
pub fn triple_from_args(args: &TripleArgs) -> AssessmentTriple {
    AssessmentTriple {
        condition: args.condition,
        repair_status: args.status,
        amount_to_repair: args.amount.as_deref().map(normalize_amount),
    }
}

fn material_entry(triple: &TripleArgs, age: Option<&str>) -> MaterialEntry {
    MaterialEntry {
        assessment: triple_from_args(triple),
        effective_age: age.map(parse_quantity),
    }
}

fn cmd_material(ctx: &Context, action: MaterialAction) -> Result<()> {
    match action {
        MaterialAction::Select { target, collection, material, triple, age } => {
            let path = target.path()?;
            let options = catalog::options_for(&collection);
            if !options.is_empty() && !options.iter().any(|o| *o == material) {
                println!("⚠ {} は {} の候補にありません（候補: {}）", material, collection, options.join(", "));
            }
            let initial = material_entry(&triple, age.as_deref());
            let selected = ctx.mutate(|tree, id| {
                Ok(tree.select_material(id, &path, &collection, &material, &initial)?)
            })?;
            if selected {
                println!("✔ {} を選択しました", material);
            } else {
                println!("変更なし（{} は選択済み。評価は material update で変更）", material);
            }
        }

        MaterialAction::Update { target, collection, material, triple, age } => {
            let path = target.path()?;
            let patch = material_entry(&triple, age.as_deref());
            let updated = ctx.mutate(|tree, id| {
                Ok(tree.update_material(id, &path, &collection, &material, &patch)?)
            })?;
            if updated {
                println!("✔ {} を更新しました", material);
            } else {
                println!("変更なし（{} は未選択）", material);
            }
        }

        MaterialAction::Remove { target, collection, material, yes } => {
            let path = target.path()?;
            let mut store = ctx.open_store()?;
            let id = ctx.resolve_id(&store.tree)?;

            let assessed = store
                .tree
                .materials(&id, &path, &collection)?
                .and_then(|m| m.get(&material))
                .map(|entry| !entry.assessment.is_empty() || entry.effective_age.is_some())
                .unwrap_or(false);

            if assessed && !yes {
                let confirmed = Confirm::new()
                    .with_prompt(format!("{} の評価も削除されます。よろしいですか？", material))
                    .default(false)
                    .interact()
                    .map_err(|e| SurveyError::InvalidInput(e.to_string()))?;
                if !confirmed {
                    println!("中止しました");
                    return Ok(());
                }
            }

            match store.tree.deselect_material(&id, &path, &collection, &material)? {
                Some(_) => {
                    store.save()?;
                    println!("✔ {} の選択を解除しました", material);
                }
                None => println!("変更なし（{} は未選択）", material),
            }
        }

        MaterialAction::List { target, collection } => {
            let path = target.path()?;
            ctx.read(|assessment| {
                let materials = assessment.section(&path).and_then(|node| node.materials.get(&collection));
                let options = catalog::options_for(&collection);

                for option in options {
                    match materials.and_then(|m| m.get(option)) {
                        Some(entry) => println!("  [x] {} {}", option, format_material(entry)),
                        None => println!("  [ ] {}", option),
                    }
                }
                // 候補外の材料
                if let Some(materials) = materials {
                    for (material, entry) in materials.iter().filter(|(m, _)| !options.iter().any(|o| o == m)) {
                        println!("  [x] {} {}", material, format_material(entry));
                    }
                }
                Ok(())
            })?;
        }
    }
    Ok(())
}

fn fields_from_pairs(pairs: &[(String, String)]) -> Fields {
    pairs
        .iter()
        .map(|(key, value)| (key.clone(), FieldValue::text(value.as_str())))
        .collect()
}

fn cmd_unit(ctx: &Context, action: UnitAction) -> Result<()> {
    match action {
        UnitAction::Add { target, kind, fields, triple, force } => {
            let path = target.path()?;
            let list = kind.list_name();
            let triple = triple_from_args(&triple);
            let unit_id = ctx.mutate(|tree, id| {
                if at_capacity(tree, id, &path, kind)? && !force {
                    return Err(SurveyError::UnitCapacity(format!("{} {}台", kind, kind.max_units())));
                }
                let unit_id = tree.add_unit(id, &path, &list, fields_from_pairs(&fields))?;
                if !triple.is_empty() {
                    let patch = UnitPatch {
                        assessment: Some(triple),
                        ..Default::default()
                    };
                    tree.update_unit(id, &path, &list, &unit_id, &patch)?;
                }
                Ok(unit_id)
            })?;
            println!("✔ {} を追加しました: {}", kind, unit_id);
        }

        UnitAction::Update { target, kind, unit_id, fields, triple } => {
            let path = target.path()?;
            let list = kind.list_name();
            let triple = triple_from_args(&triple);
            let patch = UnitPatch {
                assessment: (!triple.is_empty()).then_some(triple),
                fields: fields
                    .iter()
                    .map(|(key, value)| (key.clone(), Some(FieldValue::text(value.as_str()))))
                    .collect(),
            };
            let updated = ctx.mutate(|tree, id| Ok(tree.update_unit(id, &path, &list, &unit_id, &patch)?))?;
            if updated {
                println!("✔ {} を更新しました", unit_id);
            } else {
                println!("変更なし（{} は見つかりません）", unit_id);
            }
        }

        UnitAction::Remove { target, kind, unit_id } => {
            let path = target.path()?;
            let list = kind.list_name();
            let removed = ctx.mutate(|tree, id| Ok(tree.remove_unit(id, &path, &list, &unit_id)?))?;
            match removed {
                Some(_) => println!("✔ {} を削除しました", unit_id),
                None => println!("変更なし（{} は見つかりません）", unit_id),
            }
        }

        UnitAction::List { target, kind } => {
            let path = target.path()?;
            let list = kind.list_name();
            ctx.read(|assessment| {
                let units = assessment.section(&path).and_then(|node| node.units.get(&list));
                let count = units.map(|u| u.len()).unwrap_or(0);
                println!("{} {}/{}台", kind, count, kind.max_units());
                if let Some(units) = units {
                    for (i, unit) in units.list().iter().enumerate() {
                        println!("  #{} {}  {}", i + 1, unit.id(), format_triple(&unit.assessment));
                        for (key, value) in &unit.fields {
                            println!("      {} = {}", key, value);
                        }
                    }
                }
                Ok(())
            })?;
        }
    }
    Ok(())
}

async fn cmd_edit(ctx: &Context, target: &SectionArgs, flush_on_exit: bool, debounce_ms: Option<u64>) -> Result<()> {
    let path = target.path()?;
    let mut store = ctx.open_store()?;
    let id = ctx.resolve_id(&store.tree)?;

    let options = EditOptions {
        delay: debounce_ms.map(Duration::from_millis).unwrap_or_else(|| ctx.config.debounce()),
        flush_on_exit: flush_on_exit || ctx.config.flush_on_exit,
    };

    println!("✏ {} を編集（{}）", path, id);
    println!("{}\n", editor::HELP);

    let store_path = store.path().to_path_buf();
    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let outcome = editor::run_edit_session(&mut store.tree, SessionKey::new(id, path), options, input, |tree| {
        storage::save_tree(&store_path, tree)
    })
    .await?;

    println!("\n✔ 保存 {}回", outcome.commits);
    if outcome.dropped {
        println!("⚠ 保存前の編集を破棄しました（:w で保存、--flush-on-exit で終了時に保存）");
    }
    Ok(())
}

fn cmd_photos(ctx: &Context, area: FormArea, step: usize) -> Result<()> {
    let store = ctx.open_store()?;
    let id = ctx.resolve_id(&store.tree)?;
    let source = FolderPhotoSource::new(ctx.config.resolve_photo_root()?, id);
    let count = source.photo_count_for_step(area.as_str(), step);
    println!("{} ステップ{}: {}枚 ({})", area.label(), step, count, source.step_dir(area.as_str(), step).display());
    Ok(())
}

fn cmd_submit(ctx: &Context) -> Result<()> {
    let mut store = ctx.open_store()?;
    let id = ctx.resolve_id(&store.tree)?;
    let mut submitter = OutboxSubmitter::new(ctx.config.resolve_outbox_dir()?);

    let result = survey_common::submit(&mut store.tree, &id, &mut submitter)?;
    if !result.success {
        return Err(SurveyError::SubmissionFailed(
            result.error.unwrap_or_else(|| "不明なエラー".into()),
        ));
    }

    store.save()?;
    println!("✔ 提出しました: {}", id);
    for path in submitter.written() {
        println!("  {}", path.display());
    }
    Ok(())
}

fn cmd_export(ctx: &Context, output: &Path, title: &str) -> Result<()> {
    let rows = ctx.read(|assessment| Ok(report::rows(assessment)))?;
    let total = report::total_repair_cost(&rows);

    let ext = output
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "xlsx" => {
            let bytes = survey_common::export::report_to_xlsx(&rows, title)?;
            std::fs::write(output, bytes)?;
        }
        "json" => {
            let json = serde_json::json!({
                "title": title,
                "rows": rows,
                "totalRepairCost": total,
            });
            std::fs::write(output, serde_json::to_string_pretty(&json)?)?;
        }
        _ => {
            return Err(SurveyError::InvalidInput(format!(
                "出力形式が不明です（.xlsx / .json）: {}",
                output.display()
            )))
        }
    }

    println!("✔ {}項目を出力しました: {}", rows.len(), output.display());
    println!("  補修金額合計: {:.0}", total);
    Ok(())
}

/// 上限台数に達しているか（画面の追加ボタン無効化に相当）
pub fn at_capacity(tree: &AssessmentTree, id: &str, path: &SectionPath, kind: UnitKind) -> Result<bool> {
    let list = kind.list_name();
    Ok(tree
        .units(id, path, &list)?
        .map(|units| units.is_at_capacity(kind.max_units()))
        .unwrap_or(false))
}
