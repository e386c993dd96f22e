use clap::{Parser, Subcommand};
use fightline_cli::CliContext;
use fightline_cli::commands;
use fightline_cli::logging;
use fightline_cli::readline;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about = "fightline combat replay")]
struct Args {
    /// TOML config file to use instead of the stored one
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Fight file to load on startup
    #[arg(short, long)]
    input: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let _log_guard = logging::init();
    let args = Args::parse();
    let ctx = CliContext::new(args.config.as_deref())?;

    if let Some(path) = &args.input
        && let Err(err) = commands::load_file(path, &ctx).await
    {
        println!("{err}");
    }

    loop {
        let line = readline()?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match respond(line, &ctx).await {
            Ok(quit) => {
                if quit {
                    break;
                }
            }
            Err(err) => {
                writeln!(std::io::stdout(), "{err}").map_err(|e| e.to_string())?;
                std::io::stdout().flush().map_err(|e| e.to_string())?;
            }
        }
    }

    Ok(())
}

#[derive(Parser)]
#[command(version, about = "cli")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a fight JSON file
    Load {
        #[arg(short, long)]
        path: String,
    },
    /// Reconstruct actor timelines for the loaded fight
    Replay {
        /// Sample step in ms (defaults to the configured interval)
        #[arg(short, long)]
        interval: Option<i64>,
        #[arg(short, long)]
        pool: Option<String>,
    },
    /// Show actors at a time (ms since fight start)
    At {
        #[arg(short, long, allow_negative_numbers = true)]
        time: i64,
        #[arg(short, long)]
        actor: Option<i64>,
    },
    Phases,
    Stats,
    Config {
        #[arg(long)]
        save: bool,
    },
    Exit,
}

async fn respond(line: &str, ctx: &CliContext) -> Result<bool, String> {
    let mut args = shlex::split(line).ok_or("error: Invalid quoting")?;
    args.insert(0, "fightline".to_string());
    let cli = Cli::try_parse_from(args).map_err(|e| e.to_string())?;

    match &cli.command {
        Some(Commands::Load { path }) => commands::load_file(path, ctx).await?,
        Some(Commands::Replay { interval, pool }) => {
            commands::replay(ctx, *interval, pool.as_deref()).await?
        }
        Some(Commands::At { time, actor }) => commands::show_frame(ctx, *time, *actor).await?,
        Some(Commands::Phases) => commands::show_phases(ctx).await?,
        Some(Commands::Stats) => commands::show_stats(ctx).await,
        Some(Commands::Config { save }) => commands::show_settings(ctx, *save).await?,
        Some(Commands::Exit) => {
            commands::exit(ctx);
            return Ok(true);
        }
        None => {}
    }
    Ok(false)
}
