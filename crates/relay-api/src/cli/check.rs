//! `relayd check`: probe the database and both model providers.

use anyhow::{Result, bail};
use console::style;

use crate::state::AppState;

/// Print a health report. Fails when any required component is down.
pub async fn check(state: &AppState, json: bool) -> Result<()> {
    let report = state.health_report().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let mark = |ok: bool| {
            if ok {
                format!("{}", style("✓").green())
            } else {
                format!("{}", style("✗").red())
            }
        };

        println!();
        println!(
            "  {} relayd v{}",
            style("⚡").bold(),
            env!("CARGO_PKG_VERSION")
        );
        println!();
        println!("  {}", style("── Database ──").dim());
        println!(
            "  {} {}",
            mark(report.database.healthy),
            style(&state.config.database.url).dim()
        );
        if let Some(error) = &report.database.error {
            println!("    {}", style(error).red());
        }
        println!();
        println!("  {}", style("── Providers ──").dim());
        for provider in &report.providers {
            if !provider.configured {
                println!(
                    "  {} {} ({}) not configured",
                    style("-").dim(),
                    provider.kind,
                    provider.name
                );
                continue;
            }
            println!(
                "  {} {} ({})",
                mark(provider.healthy),
                provider.kind,
                provider.name
            );
            if let Some(error) = &provider.error {
                println!("    {}", style(error).red());
            }
        }
        println!();
    }

    if !report.healthy() {
        bail!("health check failed");
    }
    Ok(())
}
