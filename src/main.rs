use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

mod columns;
mod controller;
mod dataset;
mod domain;
mod inputter;
mod model;
mod search;
mod ui;

use controller::Controller;
use domain::{RosterError, ViewerConfig};
use model::{Model, Status};
use ui::TableUI;

#[derive(Parser, Debug)]
#[command(version, about = "roster-tv")]
struct Args {
    /// Roster JSON file. Without it the embedded roster is shown.
    roster: Option<String>,

    /// Write a trace log to this file (use RUST_LOG to control verbosity)
    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,

    /// Log at debug level, overriding RUST_LOG
    #[arg(long)]
    debug: bool,
}

fn init_tracing(log_file: &Option<PathBuf>, debug: bool) -> Result<(), RosterError> {
    let Some(path) = log_file else {
        return Ok(());
    };
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // The terminal belongs to ratatui, logs go to a file.
    let file = std::fs::File::create(path)?;
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false),
        )
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Err(e) => {
            ratatui::restore();
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
        Ok(_) => {
            ratatui::restore();
            ExitCode::SUCCESS
        }
    }
}

fn run(args: &Args) -> Result<(), RosterError> {
    init_tracing(&args.log_file, args.debug)?;

    let records = match &args.roster {
        Some(path) => dataset::load_file(path)?,
        None => dataset::load_default()?,
    };
    info!("Starting roster-tv with {} records", records.len());

    let cfg = ViewerConfig::default();
    let mut model = Model::new(cfg.clone(), records)?;
    let ui = TableUI::new(&cfg);
    let controller = Controller::new(&cfg);

    let mut terminal = ratatui::init();
    let size = terminal.size()?;
    model.update(Some(domain::Message::Resize(
        size.width as usize,
        size.height as usize,
    )))?;

    while model.status != Status::QUITTING {
        terminal.draw(|f| ui.draw(&model, f))?;

        // A timed-out poll still ticks the model so the dropdown focus
        // timer can fire.
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }

    Ok(())
}
