//! 状況レポートのExcel出力

use crate::error::{Error, Result};
use crate::report::{total_repair_cost, ReportRow};
use rust_xlsxwriter::*;

const HEADERS: [(&str, f64); 8] = [
    ("Area", 20.0),
    ("Section", 18.0),
    ("Item", 40.0),
    ("Condition", 11.0),
    ("Repair Status", 22.0),
    ("Amount to Repair", 16.0),
    ("Effective Age", 13.0),
    ("N/A", 6.0),
];

fn xlsx_err(context: &str) -> impl Fn(XlsxError) -> Error + '_ {
    move |e| Error::Export(format!("{context}: {e}"))
}

/// レポート行をxlsxバイト列にする
pub fn report_to_xlsx(rows: &[ReportRow], title: &str) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();

    let title_format = Format::new().set_bold().set_font_size(14.0);

    let header_format = Format::new()
        .set_bold()
        .set_font_size(10.0)
        .set_background_color(Color::RGB(0xF5F5F5))
        .set_align(FormatAlign::Center)
        .set_border(FormatBorder::Thin)
        .set_border_color(Color::RGB(0xAAAAAA));

    let cell_format = Format::new()
        .set_font_size(10.0)
        .set_text_wrap()
        .set_border(FormatBorder::Hair)
        .set_border_color(Color::RGB(0xCCCCCC));

    let amount_format = cell_format.clone().set_num_format("#,##0.00");
    let muted_format = cell_format.clone().set_font_color(Color::RGB(0x888888));

    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Conditions").map_err(xlsx_err("シート名設定エラー"))?;

    worksheet
        .write_string_with_format(0, 0, title, &title_format)
        .map_err(xlsx_err("タイトル書き込みエラー"))?;

    for (col, (label, width)) in HEADERS.iter().enumerate() {
        let col = col as u16;
        worksheet.set_column_width(col, *width).map_err(xlsx_err("列幅設定エラー"))?;
        worksheet
            .write_string_with_format(2, col, *label, &header_format)
            .map_err(xlsx_err("ヘッダー書き込みエラー"))?;
    }

    let mut row_idx: u32 = 3;
    for row in rows {
        let format = if row.not_applicable { &muted_format } else { &cell_format };
        let texts = [
            row.area.label().to_string(),
            row.section.clone(),
            row.item.clone(),
            row.condition.map(|c| c.to_string()).unwrap_or_default(),
            row.repair_status
                .map(|s| format!("{} - {}", s, s.label()))
                .unwrap_or_default(),
        ];
        for (col, text) in texts.iter().enumerate() {
            worksheet
                .write_string_with_format(row_idx, col as u16, text, format)
                .map_err(xlsx_err("値書き込みエラー"))?;
        }

        let amount = match &row.amount_to_repair {
            Some(_) => worksheet.write_number_with_format(row_idx, 5, row.amount(), &amount_format),
            None => worksheet.write_blank(row_idx, 5, format),
        };
        amount.map_err(xlsx_err("金額書き込みエラー"))?;

        let age = match row.effective_age {
            Some(age) => worksheet.write_number_with_format(row_idx, 6, age as f64, format),
            None => worksheet.write_blank(row_idx, 6, format),
        };
        age.map_err(xlsx_err("経過年数書き込みエラー"))?;

        worksheet
            .write_string_with_format(row_idx, 7, if row.not_applicable { "Y" } else { "" }, format)
            .map_err(xlsx_err("値書き込みエラー"))?;

        row_idx += 1;
    }

    worksheet
        .write_string_with_format(row_idx + 1, 4, "Total", &header_format)
        .map_err(xlsx_err("合計書き込みエラー"))?;
    worksheet
        .write_number_with_format(row_idx + 1, 5, total_repair_cost(rows), &amount_format)
        .map_err(xlsx_err("合計書き込みエラー"))?;

    workbook.save_to_buffer().map_err(xlsx_err("Excel保存エラー"))
}
