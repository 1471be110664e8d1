use super::ui;
use crate::core::breakdown::{AssetBucket, BreakdownService};
use crate::core::valuation::ratio_of;
use anyhow::Result;
use comfy_table::Cell;

pub async fn run(service: &BreakdownService, user_id: &str) -> Result<()> {
    let types = service.asset_type_breakdown(user_id).await?;
    let total = types.growth + types.income;

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Category"),
        ui::header_cell(&format!("Value ({})", types.currency)),
        ui::header_cell("Share (%)"),
    ]);
    for (bucket, value) in [
        (AssetBucket::Growth, types.growth),
        (AssetBucket::Income, types.income),
    ] {
        table.add_row(vec![
            Cell::new(bucket.label()),
            ui::money_cell(value),
            ui::money_cell(ratio_of(value, total)),
        ]);
    }

    println!(
        "{}\n\n{}",
        ui::style_text("Asset Type Breakdown", ui::StyleType::Title),
        table
    );

    let regions = service.geographic_breakdown(user_id).await?;

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Region"),
        ui::header_cell(&format!("Value ({})", types.currency)),
        ui::header_cell("Share (%)"),
    ]);
    for region in &regions {
        table.add_row(vec![
            Cell::new(&region.region),
            ui::money_cell(region.total_value),
            ui::money_cell(ratio_of(region.total_value, total)),
        ]);
    }

    ui::print_separator();
    println!(
        "{}\n\n{}",
        ui::style_text("Geographic Breakdown", ui::StyleType::Title),
        table
    );

    Ok(())
}
