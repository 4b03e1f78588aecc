use super::ui;
use crate::App;
use crate::core::hydrate::{self, HydrationReport};
use crate::core::watchlist::normalize_symbol;
use crate::core::{Quote, QuoteProvider};
use anyhow::Result;
use chrono::Local;
use comfy_table::{Cell, CellAlignment};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct QuoteRow {
    symbol: String,
    quote: Option<Quote>,
}

/// The watchlist with whatever quotes have arrived so far.
pub struct QuoteBoard {
    rows: Vec<QuoteRow>,
}

impl QuoteBoard {
    pub fn new(symbols: &[String]) -> Self {
        Self {
            rows: symbols
                .iter()
                .map(|symbol| QuoteRow {
                    symbol: symbol.clone(),
                    quote: None,
                })
                .collect(),
        }
    }

    /// Records a quote. Symbols no longer on the board are ignored.
    pub fn apply(&mut self, symbol: &str, quote: &Quote) {
        if let Some(row) = self.rows.iter_mut().find(|r| r.symbol == symbol) {
            row.quote = Some(quote.clone());
        }
    }

    pub fn quote(&self, symbol: &str) -> Option<&Quote> {
        self.rows
            .iter()
            .find(|r| r.symbol == symbol)
            .and_then(|r| r.quote.as_ref())
    }

    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Symbol"),
            ui::header_cell("Price"),
            ui::header_cell("Change"),
            ui::header_cell("Last updated"),
        ]);

        for row in &self.rows {
            let cells = match &row.quote {
                Some(q) => vec![
                    Cell::new(&row.symbol),
                    Cell::new(format!("{:.2}", q.price)).set_alignment(CellAlignment::Right),
                    ui::change_cell(q.change_percent),
                    Cell::new(q.as_of.with_timezone(&Local).format("%H:%M").to_string()),
                ],
                None => vec![
                    Cell::new(&row.symbol),
                    ui::na_cell(),
                    ui::na_cell(),
                    Cell::new(""),
                ],
            };
            table.add_row(cells);
        }

        table.to_string()
    }
}

fn print_header(app: &App) {
    let badge = if app.settings.settings().live {
        ui::style_text("LIVE DATA ON", ui::StyleType::Live)
    } else {
        ui::style_text("LIVE DATA OFF", ui::StyleType::Warning)
    };
    println!(
        "{} {}",
        ui::style_text("Watchlist", ui::StyleType::Title),
        badge
    );

    if !app.provider.has_api_key() {
        println!(
            "{}",
            ui::style_text(
                "No API key detected, quotes are disabled. Set api_key in the config or ALPHA_VANTAGE_API_KEY.",
                ui::StyleType::Warning,
            )
        );
    }
}

fn can_fetch(app: &App) -> bool {
    app.settings.settings().live && app.provider.has_api_key()
}

async fn run_pass(
    app: &App,
    board: &mut QuoteBoard,
    stagger: Duration,
    cancel: &CancellationToken,
    refresh: Option<&[String]>,
) -> HydrationReport {
    let symbols = app.watchlist.symbols();
    let pb = ui::new_progress_bar(symbols.len() as u64);
    pb.set_message("Fetching quotes");

    let apply = |symbol: &str, quote: &Quote| {
        board.apply(symbol, quote);
        pb.inc(1);
    };
    let provider: &dyn QuoteProvider = &app.provider;
    let report = match refresh {
        None => hydrate::hydrate(provider, symbols, stagger, cancel, apply).await,
        Some([]) => hydrate::refresh(provider, symbols, stagger, cancel, apply).await,
        Some(only) => hydrate::refresh_symbols(provider, only, stagger, cancel, apply).await,
    };

    pb.finish_and_clear();
    report
}

/// One-line summary of a pass. Failed fetches are shown as errors, missing
/// quotes as subtle text, and a clean pass prints nothing.
fn report_summary(report: &HydrationReport) -> Option<(String, ui::StyleType)> {
    if report.failed > 0 {
        Some((
            format!(
                "{} quotes updated, {} unavailable, {} failed",
                report.applied, report.absent, report.failed
            ),
            ui::StyleType::Error,
        ))
    } else if report.absent > 0 {
        Some((
            format!(
                "{} quotes updated, {} unavailable",
                report.applied, report.absent
            ),
            ui::StyleType::Subtle,
        ))
    } else {
        None
    }
}

fn print_report(report: &HydrationReport) {
    if let Some((text, style_type)) = report_summary(report) {
        println!("{}", ui::style_text(&text, style_type));
    }
}

/// Normalizes requested symbols and keeps those on the watchlist, in request
/// order and without repeats.
fn refresh_targets(watchlist: &[String], requested: &[String]) -> Result<Vec<String>> {
    let mut targets: Vec<String> = Vec::with_capacity(requested.len());
    for raw in requested {
        let symbol = normalize_symbol(raw)?;
        if !watchlist.contains(&symbol) {
            warn!("{} is not on the watchlist, skipping refresh", symbol);
            continue;
        }
        if !targets.contains(&symbol) {
            targets.push(symbol);
        }
    }
    Ok(targets)
}

/// Shows the watchlist, overlaying live quotes when enabled.
pub async fn show(app: &App) -> Result<()> {
    print_header(app);
    let mut board = QuoteBoard::new(app.watchlist.symbols());

    if can_fetch(app) {
        let cancel = CancellationToken::new();
        let report = run_pass(app, &mut board, app.config.stagger.live(), &cancel, None).await;
        println!("{}", board.display_as_table());
        print_report(&report);
    } else {
        println!("{}", board.display_as_table());
    }
    Ok(())
}

/// Drops cached quotes and fetches fresh ones. With no symbols every quote
/// cache is cleared. Symbols not on the watchlist are skipped.
pub async fn refresh(app: &App, symbols: &[String]) -> Result<()> {
    let targets = refresh_targets(app.watchlist.symbols(), symbols)?;
    print_header(app);
    let mut board = QuoteBoard::new(app.watchlist.symbols());

    if !app.provider.has_api_key() {
        println!("{}", board.display_as_table());
        return Ok(());
    }

    if !symbols.is_empty() && targets.is_empty() {
        println!("{}", board.display_as_table());
        println!(
            "{}",
            ui::style_text(
                "None of the requested symbols are on the watchlist.",
                ui::StyleType::Warning,
            )
        );
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let report = run_pass(
        app,
        &mut board,
        app.config.stagger.refresh(),
        &cancel,
        Some(&targets),
    )
    .await;
    println!("{}", board.display_as_table());
    print_report(&report);
    Ok(())
}

/// Re-runs a pass every `interval` until Ctrl-C.
pub async fn watch(app: &App, interval: Duration) -> Result<()> {
    print_header(app);
    let mut board = QuoteBoard::new(app.watchlist.symbols());

    if !can_fetch(app) {
        println!("{}", board.display_as_table());
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Ctrl-C received, stopping watch");
            ctrl_c.cancel();
        }
    });

    loop {
        let report = run_pass(app, &mut board, app.config.stagger.live(), &cancel, None).await;
        println!("{}", board.display_as_table());
        print_report(&report);
        if report.cancelled {
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!("Watch stopped");
    Ok(())
}
