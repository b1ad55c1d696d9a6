//! 数値テキスト入力の解釈
//!
//! 金額・数量欄に数値でない文字列が入っても失敗させず 0 として扱う。

/// 金額テキストを数値化（`$1,200.50` → 1200.5、不正なら 0）
pub fn parse_amount(text: &str) -> f64 {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' ' | '¥'))
        .collect();
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// 金額テキストを保存用の文字列に正規化する
///
/// 空文字はクリア指定としてそのまま残す。不正な入力は "0"。
pub fn normalize_amount(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }
    let value = parse_amount(text);
    // i64 の範囲外は整数表記にしない
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

/// 数量テキストを整数化（不正・負数なら 0）
pub fn parse_quantity(text: &str) -> u32 {
    let trimmed = text.trim();
    if let Ok(n) = trimmed.parse::<u32>() {
        return n;
    }
    // "2.0" のような入力は切り捨て
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 && v <= u32::MAX as f64 => v.trunc() as u32,
        _ => 0,
    }
}
