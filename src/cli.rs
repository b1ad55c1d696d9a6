use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use survey_common::{Condition, FormArea, RepairStatus, SectionPath, UnitKind};

#[derive(Parser)]
#[command(name = "survey")]
#[command(about = "建物状況調査（コンディションサーベイ）入力ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// ストアファイル（既定: 設定 / SURVEY_STORE / ~/.config/condition-survey/assessments.json）
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// 対象の評価ID（省略時はアクティブな評価）
    #[arg(short = 'a', long, global = true)]
    pub assessment: Option<String>,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// セクションの位置指定（`<area> <section>`、サブセクションは `section/sub`）
#[derive(Args, Debug, Clone)]
pub struct SectionArgs {
    /// 領域 (site-and-grounds / building-envelope / mechanical ...)
    pub area: FormArea,

    /// セクション名（`roofing/railing` のようにサブセクションを続けられる）
    pub section: String,
}

impl SectionArgs {
    pub fn path(&self) -> survey_common::Result<SectionPath> {
        format!("{}/{}", self.area, self.section).parse()
    }
}

/// 評価の3項目（状態・補修区分・金額）
#[derive(Args, Debug, Clone, Default)]
pub struct TripleArgs {
    /// 状態 (good / fair / poor)
    #[arg(long)]
    pub condition: Option<Condition>,

    /// 補修区分 (IR / ST / RR / RM / INV / NA)
    #[arg(long)]
    pub status: Option<RepairStatus>,

    /// 補修金額
    #[arg(long)]
    pub amount: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 新しい評価を作成
    New,

    /// 評価の一覧（更新日時の新しい順）
    List,

    /// アクティブな評価を切り替え
    Use {
        /// 評価ID
        id: String,
    },

    /// 評価の内容を表示
    Show {
        /// 領域を絞り込む
        #[arg(long)]
        area: Option<FormArea>,

        /// JSONで出力
        #[arg(long)]
        json: bool,
    },

    /// セクションに部分パッチ（JSON）を適用
    Patch {
        #[command(flatten)]
        target: SectionArgs,

        /// パッチJSON（null は「変更なし」）
        #[arg(long)]
        json: String,
    },

    /// チェックリストの選択を切り替え
    Toggle {
        #[command(flatten)]
        target: SectionArgs,

        /// フィールド名
        field: String,

        /// 選択肢
        option: String,

        /// 選択を外す
        #[arg(long)]
        off: bool,
    },

    /// 対象外フラグを設定（データは保持）
    Na {
        #[command(flatten)]
        target: SectionArgs,

        /// on / off
        #[arg(value_parser = parse_switch, action = clap::ArgAction::Set)]
        flag: bool,
    },

    /// 材料の選択と評価
    Material {
        #[command(subcommand)]
        action: MaterialAction,
    },

    /// 設備ユニットの追加・更新・削除
    Unit {
        #[command(subcommand)]
        action: UnitAction,
    },

    /// 対話的に編集（入力が止まってから自動保存）
    Edit {
        #[command(flatten)]
        target: SectionArgs,

        /// 終了時に未保存の編集を保存する
        #[arg(long)]
        flush_on_exit: bool,

        /// デバウンス時間（ミリ秒）
        #[arg(long)]
        debounce_ms: Option<u64>,
    },

    /// ステップの写真枚数を表示
    Photos {
        /// 領域
        area: FormArea,

        /// ステップ番号
        step: usize,
    },

    /// 評価を提出（アウトボックスに書き出し）
    Submit,

    /// 状況レポートを出力
    Export {
        /// 出力ファイル（.xlsx / .json）
        #[arg(short, long)]
        output: PathBuf,

        /// ドキュメントタイトル
        #[arg(short, long, default_value = "建物状況調査報告")]
        title: String,
    },

    /// 設定を表示/編集
    Config {
        /// ストアファイルを設定
        #[arg(long)]
        set_store: Option<PathBuf>,

        /// 写真フォルダを設定
        #[arg(long)]
        set_photo_root: Option<PathBuf>,

        /// アウトボックスを設定
        #[arg(long)]
        set_outbox: Option<PathBuf>,

        /// デバウンス時間（ミリ秒）を設定
        #[arg(long)]
        set_debounce_ms: Option<u64>,

        /// 終了時保存を設定 (on / off)
        #[arg(long, value_parser = parse_switch)]
        set_flush_on_exit: Option<bool>,

        /// 調査者名を設定
        #[arg(long)]
        set_inspector: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}

#[derive(Subcommand)]
pub enum MaterialAction {
    /// 材料を選択（既に選択済みなら何もしない）
    Select {
        #[command(flatten)]
        target: SectionArgs,

        /// 材料コレクション名 (pavement / roofing ...)
        collection: String,

        /// 材料ID
        material: String,

        #[command(flatten)]
        triple: TripleArgs,

        /// 有効経過年数
        #[arg(long)]
        age: Option<String>,
    },

    /// 選択済み材料の評価を更新
    Update {
        #[command(flatten)]
        target: SectionArgs,

        collection: String,

        material: String,

        #[command(flatten)]
        triple: TripleArgs,

        /// 有効経過年数
        #[arg(long)]
        age: Option<String>,
    },

    /// 選択を解除（評価も破棄）
    Remove {
        #[command(flatten)]
        target: SectionArgs,

        collection: String,

        material: String,

        /// 確認しない
        #[arg(short, long)]
        yes: bool,
    },

    /// 選択状況を表示
    List {
        #[command(flatten)]
        target: SectionArgs,

        collection: String,
    },
}

#[derive(Subcommand)]
pub enum UnitAction {
    /// ユニットを追加
    Add {
        #[command(flatten)]
        target: SectionArgs,

        /// 種類 (chiller / boiler / cooling-tower / water-heater / air-handler / generic)
        kind: UnitKind,

        /// 初期フィールド（key=value）
        #[arg(value_parser = parse_key_value)]
        fields: Vec<(String, String)>,

        #[command(flatten)]
        triple: TripleArgs,

        /// 上限台数を超えて追加する
        #[arg(long)]
        force: bool,
    },

    /// ユニットを更新（指定したフィールドのみ）
    Update {
        #[command(flatten)]
        target: SectionArgs,

        kind: UnitKind,

        /// ユニットID
        unit_id: String,

        /// 更新するフィールド（key=value、key= でクリア）
        #[arg(value_parser = parse_key_value)]
        fields: Vec<(String, String)>,

        #[command(flatten)]
        triple: TripleArgs,
    },

    /// ユニットを削除
    Remove {
        #[command(flatten)]
        target: SectionArgs,

        kind: UnitKind,

        unit_id: String,
    },

    /// ユニットの一覧
    List {
        #[command(flatten)]
        target: SectionArgs,

        kind: UnitKind,
    },
}

/// `key=value` を分解する
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.trim().to_string())),
        _ => Err(format!("key=value 形式で指定してください: {}", s)),
    }
}

fn parse_switch(s: &str) -> Result<bool, String> {
    crate::editor::parse_switch(s).map_err(|e| e.to_string())
}
