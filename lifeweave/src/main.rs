//! Headless command-line runner for lifeweave simulations.
//!
//! ```bash
//! cargo run -p lifeweave -- run --seeds cast.json --end 20 --save story.json
//! cargo run -p lifeweave -- run --session story.json --start 21 --end 30
//! cargo run -p lifeweave -- show story.json
//! ```
//!
//! While a run is going, type `#pause`, `#resume` or `#abort` on stdin.
//! Ctrl-C aborts after the current year.

mod headless;

use clap::{Args, Parser, Subcommand};
use lifeweave_core::{EventDensity, PreviewFrequency, RunConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Simulate a range of years.
    Run(RunArgs),
    /// Print a summary of a saved session.
    Show {
        session: PathBuf,
        /// Also list every event.
        #[arg(long)]
        events: bool,
    },
    /// Purge everything simulated in a saved session, keeping seeds and anchors.
    Reset { session: PathBuf },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// JSON array of seeds for a new session.
    #[arg(long, conflicts_with = "session")]
    seeds: Option<PathBuf>,

    /// Saved session to continue.
    #[arg(long)]
    session: Option<PathBuf>,

    /// JSON array of anchor events to schedule.
    #[arg(long)]
    anchors: Option<PathBuf>,

    /// Name for a new session.
    #[arg(long, default_value = "Untitled Story")]
    name: String,

    #[arg(long, default_value_t = 0)]
    start: i32,

    #[arg(long, default_value_t = 20)]
    end: i32,

    /// sparse, normal or dense.
    #[arg(long, default_value = "normal")]
    density: String,

    /// Only simulate these character ids.
    #[arg(long = "character")]
    characters: Vec<String>,

    /// One request per year for the whole cast.
    #[arg(long)]
    batched: bool,

    /// Drop "nothing happened" events.
    #[arg(long)]
    meaningful_only: bool,

    /// Design an author arc per character before the first year.
    #[arg(long)]
    author_arcs: bool,

    /// off, manual, semi_auto or auto.
    #[arg(long, default_value = "off")]
    preview: String,

    /// Pause when story health turns critical.
    #[arg(long)]
    auto_pause: bool,

    /// Delay between years in milliseconds.
    #[arg(long, default_value_t = 2000)]
    delay_ms: u64,

    /// Where to save the session afterwards. Defaults to --session.
    #[arg(long)]
    save: Option<PathBuf>,
}

impl RunArgs {
    fn config(&self) -> Result<RunConfig, String> {
        let density = EventDensity::parse(&self.density)
            .ok_or_else(|| format!("unknown density '{}'", self.density))?;
        let preview = PreviewFrequency::parse(&self.preview)
            .ok_or_else(|| format!("unknown preview frequency '{}'", self.preview))?;

        let mut config = RunConfig::new(self.start, self.end)
            .with_density(density)
            .batched(self.batched)
            .meaningful_only(self.meaningful_only)
            .with_author_arcs(self.author_arcs)
            .with_preview_frequency(preview)
            .auto_pause_on_critical(self.auto_pause)
            .with_inter_year_delay(Duration::from_millis(self.delay_ms));
        if !self.characters.is_empty() {
            config = config.with_characters(
                self.characters
                    .iter()
                    .map(|c| lifeweave_core::CharacterId::new(c.as_str()))
                    .collect(),
            );
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => {
            if std::env::var("ANTHROPIC_API_KEY").is_err() {
                eprintln!("Error: ANTHROPIC_API_KEY environment variable not set.");
                eprintln!("Please set it in .env file or with: export ANTHROPIC_API_KEY=your_key_here");
                std::process::exit(1);
            }
            let config = args.config()?;
            headless::run(&args, config).await?;
        }
        Command::Show { session, events } => headless::show(&session, events).await?,
        Command::Reset { session } => headless::reset(&session).await?,
    }
    Ok(())
}
