use super::ui;
use crate::App;
use crate::core::watchlist::normalize_symbol;
use anyhow::{Context, Result};

pub async fn toggle(app: &mut App, symbols: &[String]) -> Result<()> {
    for symbol in symbols {
        let added = app
            .watchlist
            .toggle(symbol)
            .await
            .with_context(|| format!("Failed to update watchlist for {symbol}"))?;
        let action = if added { "Added" } else { "Removed" };
        println!("{action} {}", normalize_symbol(symbol)?);
    }

    println!(
        "{} {}",
        ui::style_text("Watchlist:", ui::StyleType::Title),
        app.watchlist.symbols().join(", ")
    );
    Ok(())
}

pub async fn toggle_live(app: &mut App) -> Result<()> {
    let live = app
        .settings
        .toggle_live()
        .await
        .context("Failed to save settings")?;

    if live {
        println!("{}", ui::style_text("Live data on", ui::StyleType::Live));
    } else {
        println!("{}", ui::style_text("Live data off", ui::StyleType::Warning));
    }
    Ok(())
}
