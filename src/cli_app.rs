//! Top-level CLI definition and dispatch.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::core::config::{Config, SizeUnit};
use crate::core::errors::{Result, SraError};
use crate::daemon::loop_main::{run_daemon, run_once};
use crate::daemon::scheduler::{Pace, Pacer, ShutdownPacer};
use crate::daemon::signals::install_shutdown_channel;
use crate::logger;
use crate::platform::pal::SystemHost;
use crate::platform::preflight;
use crate::report::format::effective_width;
use crate::report::status::{RenderOptions, StatusReport, render, watch_header};
use crate::report::theme::{ColorMode, Palette};

/// Storage Relief Agent: tiered disk-pressure remediation for a single host.
#[derive(Debug, Parser)]
#[command(name = "sra", version, about)]
pub struct Cli {
    /// Configuration file (overrides SRA_CONFIG and the default path).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the scheduler in the foreground (used by systemd).
    Daemon,
    /// Run a single escalation pass and print the outcome.
    Once {
        /// Print the run as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show resource usage, service states and sizes.
    Status(StatusArgs),
    /// Show or validate configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Print a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Validate the configuration and exit.
    Check,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Emit JSON instead of a table.
    #[arg(long, conflicts_with = "watch")]
    pub json: bool,
    /// Redraw every N seconds until interrupted.
    #[arg(short = 'n', long, value_name = "SECS")]
    pub watch: Option<u64>,
    /// Disable colors.
    #[arg(long)]
    pub no_color: bool,
    /// Unit for sizes: B, K, M, G, T or P.
    #[arg(short = 'u', long, value_name = "UNIT")]
    pub size_unit: Option<SizeUnit>,
    /// Pick the unit per value (ignores --size-unit).
    #[arg(long)]
    pub human: bool,
    /// Output width; values outside 40-100 follow the terminal.
    #[arg(short = 'w', long)]
    pub width: Option<usize>,
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "sra", &mut io::stdout());
            Ok(())
        }
        Command::Config { action } => run_config(cli, action),
        Command::Daemon => {
            let config = load(cli)?;
            tracing::info!(
                interval_secs = config.scheduler.interval_secs,
                threshold_pct = config.escalation.threshold_pct,
                steps = config.escalation.steps.len(),
                "starting daemon"
            );
            run_daemon(&config)?;
            tracing::info!("daemon stopped");
            Ok(())
        }
        Command::Once { json } => {
            let config = load(cli)?;
            preflight::check(&config)?;
            let host = SystemHost::new(&config);
            let run = run_once(&config, &host, &host);
            if *json {
                println!("{}", serde_json::to_string_pretty(&run.summary())?);
            } else {
                println!("{}", run.outcome);
            }
            if run.outcome.is_resolved() {
                Ok(())
            } else {
                Err(SraError::Runtime {
                    details: format!("escalation ended {}", run.outcome.label()),
                })
            }
        }
        Command::Status(args) => {
            let config = load(cli)?;
            run_status(&config, args)
        }
    }
}

fn load(cli: &Cli) -> Result<Config> {
    let config = Config::load(cli.config.as_deref())?;
    logger::init(&config.logging)?;
    Ok(config)
}

fn run_config(cli: &Cli, action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = Config::load(cli.config.as_deref())?;
            print!("{}", config.to_toml_string()?);
        }
        ConfigAction::Check => {
            let (path, _) = Config::resolve_path(cli.config.as_deref());
            let config = Config::load(cli.config.as_deref())?;
            println!(
                "configuration OK: {} ({} steps, threshold {}%)",
                path.display(),
                config.escalation.steps.len(),
                config.escalation.threshold_pct
            );
        }
    }
    Ok(())
}

fn terminal_width() -> Option<usize> {
    crossterm::terminal::size().ok().map(|(cols, _)| usize::from(cols))
}

fn render_options(config: &Config, args: &StatusArgs) -> RenderOptions {
    let palette = Palette::new(ColorMode::resolve(config.report.color && !args.no_color));
    let mut opts = RenderOptions::from_config(config, palette);
    if let Some(unit) = args.size_unit {
        opts = opts.with_unit(unit);
    }
    opts.size.human |= args.human;
    opts.width = effective_width(args.width.unwrap_or(opts.width), terminal_width());
    opts
}

fn run_status(config: &Config, args: &StatusArgs) -> Result<()> {
    let host = SystemHost::new(config);
    let opts = render_options(config, args);

    if args.json {
        println!("{}", StatusReport::collect(config, &host).to_json()?);
        return Ok(());
    }

    let interval = match args.watch {
        Some(secs) if secs > 0 => secs,
        _ => {
            print!("{}", render(&StatusReport::collect(config, &host), &opts));
            return Ok(());
        }
    };

    let mut pacer = ShutdownPacer::new(install_shutdown_channel()?);
    let mut stdout = io::stdout();
    loop {
        let report = StatusReport::collect(config, &host);
        let frame = format!(
            "{}\n{}",
            watch_header(interval, report.generated_at, opts.width),
            render(&report, &opts)
        );
        crossterm::execute!(
            stdout,
            crossterm::terminal::Clear(crossterm::terminal::ClearType::All),
            crossterm::cursor::MoveTo(0, 0)
        )
        .map_err(|err| SraError::io("stdout", err))?;
        stdout
            .write_all(frame.as_bytes())
            .and_then(|()| stdout.flush())
            .map_err(|err| SraError::io("stdout", err))?;
        if pacer.wait(Duration::from_secs(interval)) == Pace::Stop {
            println!();
            return Ok(());
        }
    }
}
