//! `telgeo` – interactive telescope geometry shell.
//!
//! 1. Loads `~/.telgeo/config.toml`, running a short first-run wizard when it
//!    is absent.  An optional first argument overrides the description path.
//! 2. Reads the detector description and builds (or imports) the geometry.
//! 3. Drops into a REPL for point location, frame transforms and
//!    radiation-length queries.
//! 4. Ctrl-C sets a shutdown flag the REPL polls between commands.

mod config;
mod repl;
mod telemetry;

use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, warn};

use telgeo_telescope::{GeometryService, TomlDescription};

fn main() {
    let _otel_guard = telemetry::init_tracing("telgeo");

    print_banner();

    // ── Shutdown flag ─────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!(
            "{}",
            "⚠  Ctrl-C received – exiting after the current command.".yellow().bold()
        );
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler");
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let mut cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let mut cfg = run_first_run_wizard();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };
    if let Some(path) = std::env::args().nth(1) {
        cfg.description_path = path;
    }

    // ── Geometry ──────────────────────────────────────────────────────────
    let source = TomlDescription::new(&cfg.description_path);
    let mut service = match GeometryService::new(&source) {
        Ok(service) => service,
        Err(e) => {
            error!(error = %e, "cannot load detector description");
            eprintln!("{}: {}", "Fatal".red().bold(), e);
            std::process::exit(1);
        }
    };
    println!(
        "  {} plane(s) read from {}",
        service.registry().plane_count().to_string().bold(),
        cfg.description_path.bold()
    );

    let built = if cfg.import_geometry {
        service.initialize_from_file(Path::new(&cfg.geometry_name))
    } else {
        service.initialize(&cfg.geometry_name, cfg.dump_geometry)
    };
    match built {
        Ok(()) => {
            let verb = if cfg.import_geometry { "imported from" } else { "built as" };
            println!("  Geometry {} {}", verb, cfg.geometry_name.bold());
        }
        Err(e) => {
            println!("{}: {}", "Geometry unavailable".yellow(), e);
            println!("  Registry queries still work; model queries will fail.");
        }
    }

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    repl::run(shutdown, &service, &cfg);
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> config::Config {
    println!();
    println!("{}", "  No configuration found.  Let's set up telgeo.".bold().cyan());
    println!();

    let mut cfg = config::Config::default();

    cfg.description_path = prompt_line(
        &format!("  Detector description [{}]: ", cfg.description_path),
        &cfg.description_path,
    );
    cfg.geometry_name = prompt_line(
        &format!("  Geometry file [{}]: ", cfg.geometry_name),
        &cfg.geometry_name,
    );
    let dump = prompt_line("  Dump the built geometry to that file? [y/N]: ", "n");
    cfg.dump_geometry = matches!(dump.to_ascii_lowercase().as_str(), "y" | "yes");

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!(
        "  {} {}",
        "telgeo".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Beam-telescope geometry service");
    println!();
}

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}
