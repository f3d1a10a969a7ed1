// sprig/src/cli/info.rs
use clap::Args;
use colored::Colorize;
use sprig_common::config::Config;
use sprig_common::error::Result;
use sprig_common::formulary::Formulary;
use sprig_common::receipt::ReceiptRegistry;

#[derive(Args, Debug)]
pub struct Info {
    /// Name of the recipe to inspect
    pub name: String,
}

impl Info {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let recipe = Formulary::new(config).load_recipe(&self.name)?;
        let receipt = ReceiptRegistry::new(config.clone()).get_receipt(&recipe.name)?;

        println!(
            "{} {}",
            recipe.name.green().bold(),
            recipe.version().bold()
        );
        if let Some(desc) = &recipe.description {
            println!("{desc}");
        }
        if let Some(homepage) = &recipe.homepage {
            println!("{}", homepage.cyan());
        }

        println!("\n{}", "Details".bold());
        println!("  {:<13} {}", "Program:", recipe.program);
        println!("  {:<13} {}", "Source:", recipe.source.url);
        println!("  {:<13} {}", "SHA-256:", recipe.integrity_digest);
        if let Some(license) = &recipe.license {
            println!("  {:<13} {}", "License:", license);
        }
        println!("  {:<13} {}", "Platforms:", recipe.platforms_display());
        if !recipe.dependencies.is_empty() {
            println!("  {:<13} {}", "Requires:", recipe.dependencies.join(", "));
        }
        println!(
            "  {:<13} {} install, {} post-install, {} checks{}",
            "Steps:",
            recipe.install_steps.len(),
            recipe.post_install_steps.len(),
            recipe.test_spec.len(),
            if recipe.manpage.is_some() {
                ", manual page"
            } else {
                ""
            }
        );

        match receipt {
            Some(receipt) => println!(
                "\n{} {} (installed {})",
                "Installed:".bold(),
                receipt.version.green(),
                receipt.installed_at.format("%Y-%m-%d %H:%M UTC")
            ),
            None => println!("\n{} {}", "Installed:".bold(), "no".dimmed()),
        }
        Ok(())
    }
}
