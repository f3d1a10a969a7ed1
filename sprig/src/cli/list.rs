// sprig/src/cli/list.rs
use clap::Args;
use colored::Colorize;
use prettytable::{format, Cell, Row, Table};
use sprig_common::config::Config;
use sprig_common::error::Result;
use sprig_common::formulary::Formulary;
use sprig_common::receipt::ReceiptRegistry;

#[derive(Args, Debug)]
pub struct List {
    /// Also list recipes that are available but not installed
    #[arg(long)]
    pub available: bool,
}

impl List {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let receipts = ReceiptRegistry::new(config.clone()).list_receipts()?;
        let formulary = Formulary::new(config);

        if receipts.is_empty() && !self.available {
            println!("{}", "0 recipes installed".yellow());
            return Ok(());
        }

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.add_row(Row::new(vec![
            Cell::new("Name").style_spec("b"),
            Cell::new("Installed").style_spec("b"),
            Cell::new("Recipe").style_spec("b"),
            Cell::new("Installed at").style_spec("b"),
            Cell::new("Files").style_spec("b"),
        ]));
        for receipt in &receipts {
            let recipe_version = formulary
                .load_recipe(&receipt.name)
                .map(|r| r.version().to_string())
                .unwrap_or_else(|_| "-".to_string());
            let version_cell = if recipe_version != receipt.version && recipe_version != "-" {
                Cell::new(&recipe_version).style_spec("Fy")
            } else {
                Cell::new(&recipe_version)
            };
            table.add_row(Row::new(vec![
                Cell::new(&receipt.name).style_spec("Fb"),
                Cell::new(&receipt.version),
                version_cell,
                Cell::new(&receipt.installed_at.format("%Y-%m-%d %H:%M").to_string()),
                Cell::new(&receipt.files().count().to_string()),
            ]));
        }

        let mut available = 0;
        if self.available {
            for name in formulary.list_names()? {
                if receipts.iter().any(|r| r.name == name) {
                    continue;
                }
                let version = formulary
                    .load_recipe(&name)
                    .map(|r| r.version().to_string())
                    .unwrap_or_else(|_| "invalid".to_string());
                table.add_row(Row::new(vec![
                    Cell::new(&name).style_spec("Fd"),
                    Cell::new("-"),
                    Cell::new(&version),
                    Cell::new("-"),
                    Cell::new("-"),
                ]));
                available += 1;
            }
        }
        table.printstd();
        println!(
            "{}",
            format!("{} recipes installed", receipts.len()).bold()
        );
        if self.available {
            println!("{}", format!("{available} more available").dimmed());
        }
        Ok(())
    }
}
