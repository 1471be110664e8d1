use super::ui;
use crate::core::history::HistoryRecorder;
use anyhow::Result;
use comfy_table::Cell;

pub async fn run(recorder: &HistoryRecorder, user_id: &str) -> Result<()> {
    let points = recorder.history(user_id)?;
    if points.is_empty() {
        println!("No history yet. Use `snapshot` to record today's total.");
        return Ok(());
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Date"), ui::header_cell("Total Value")]);
    for point in &points {
        table.add_row(vec![
            Cell::new(point.date.format("%Y-%m-%d").to_string()),
            ui::money_cell(point.total_value),
        ]);
    }

    println!(
        "{}\n\n{}",
        ui::style_text("Total Value History", ui::StyleType::Title),
        table
    );
    Ok(())
}
