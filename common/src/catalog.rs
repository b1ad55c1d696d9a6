//! 選択肢カタログ（IDのみ）
//!
//! ラベルなどの表示データは外部の参照データ。ここでは材料一覧の表示順を
//! 決めるためのID列だけを持つ。

pub const PAVEMENT_OPTIONS: &[&str] = &["asphalt", "concrete", "pavers", "gravel", "dirt"];

pub const ROOFING_OPTIONS: &[&str] = &[
    "asphalt-shingle",
    "metal",
    "tile",
    "slate",
    "built-up",
    "single-ply-membrane",
    "modified-bitumen",
];

pub const EXTERIOR_WALL_OPTIONS: &[&str] = &[
    "brick",
    "stucco",
    "vinyl-siding",
    "wood-siding",
    "fiber-cement",
    "concrete-block",
    "curtain-wall",
];

pub const WINDOW_OPTIONS: &[&str] = &["single-pane", "double-pane", "aluminum", "vinyl", "wood"];

pub const FLOORING_OPTIONS: &[&str] = &["carpet", "vinyl-tile", "ceramic-tile", "hardwood", "laminate", "sealed-concrete"];

/// コレクション名からカタログを引く
pub fn options_for(collection: &str) -> &'static [&'static str] {
    match collection.to_lowercase().as_str() {
        "pavement" | "paving" => PAVEMENT_OPTIONS,
        "roofing" | "roof" => ROOFING_OPTIONS,
        "exterior-walls" | "walls" | "siding" => EXTERIOR_WALL_OPTIONS,
        "windows" => WINDOW_OPTIONS,
        "flooring" | "floors" => FLOORING_OPTIONS,
        _ => &[],
    }
}
