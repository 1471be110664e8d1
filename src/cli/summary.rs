use super::ui;
use crate::core::valuation::{PortfolioSnapshot, ValuationEngine};
use crate::store::PortfolioStore;
use anyhow::Result;
use comfy_table::Cell;
use console::style;
use std::sync::Arc;

impl PortfolioSnapshot {
    pub fn display_as_table(&self) -> String {
        let currency = self.currency;

        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Symbol"),
            ui::header_cell("Name"),
            ui::header_cell("Position"),
            ui::header_cell("Price"),
            ui::header_cell(&format!("Value ({currency})")),
            ui::header_cell("Weight (%)"),
            ui::header_cell("Target (%)"),
        ]);

        for holding in &self.holdings {
            let has_error = holding.error.is_some();
            let weight = if holding.converted_value.is_some() {
                ui::money_cell(holding.ratio)
            } else {
                ui::na_cell(has_error)
            };
            table.add_row(vec![
                Cell::new(&holding.symbol),
                Cell::new(&holding.name),
                ui::money_cell(holding.position),
                ui::optional_money_cell(holding.price, has_error),
                ui::optional_money_cell(holding.converted_value, has_error),
                weight,
                ui::optional_money_cell(holding.target_ratio, false),
            ]);
        }

        // A total with exclusions is a lower bound; flag it as such.
        let total_style = if self.has_exclusions() {
            ui::StyleType::Error
        } else {
            ui::StyleType::TotalValue
        };
        let total = format!("{:.2}", self.total_value.round_dp(2));

        let mut output = format!(
            "Portfolio: {}\n\n",
            ui::style_text(&self.name, ui::StyleType::Title)
        );
        output.push_str(&table.to_string());
        output.push_str(&format!(
            "\n\nTotal Value ({}): {}",
            ui::style_text(&currency.to_string(), ui::StyleType::TotalLabel),
            ui::style_text(&total, total_style)
        ));
        if self.has_exclusions() {
            output.push_str(&format!(
                "\n{}",
                ui::style_text(
                    "Some holdings could not be valued and are excluded from the total.",
                    ui::StyleType::Subtle
                )
            ));
        }
        output
    }
}

pub async fn run(
    store: &Arc<dyn PortfolioStore>,
    engine: &ValuationEngine,
    user_id: &str,
) -> Result<()> {
    let portfolios = store.portfolios_for_user(user_id)?;
    if portfolios.is_empty() {
        println!("No portfolios yet. Use `add` to record a holding.");
        return Ok(());
    }

    let mut snapshots = Vec::with_capacity(portfolios.len());
    for portfolio in &portfolios {
        snapshots.push(engine.refresh(&portfolio.id).await?);
    }

    let num_snapshots = snapshots.len();
    for (i, snapshot) in snapshots.iter().enumerate() {
        println!("{}", snapshot.display_as_table());
        if i < num_snapshots - 1 {
            ui::print_separator();
        }
    }

    let grand_total = engine.user_total_value(user_id).await?;
    let all_valid = snapshots.iter().all(|s| !s.has_exclusions());
    if num_snapshots > 1 && all_valid {
        let user = store
            .get_user(user_id)?
            .ok_or_else(|| anyhow::anyhow!("user {user_id} not found"))?;
        let term_width = console::Term::stdout()
            .size_checked()
            .map(|(_, w)| w as usize)
            .unwrap_or(80);
        println!("\n{}", "=".repeat(term_width));
        let total_str = format!(
            "Grand Total ({}): {:.2}",
            user.default_currency,
            grand_total.round_dp(2)
        );
        let styled_total = style(&total_str).bold().green();
        println!("{styled_total:>term_width$}");
    }

    Ok(())
}
