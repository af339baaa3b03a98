//! Line-oriented runner.
//!
//! Progress is printed as it arrives. Stdin accepts:
//! - `#pause` / `#resume` to park and continue the year loop
//! - `#abort` to stop after the current year
//! - `#status` to print whether the run is paused

use crate::RunArgs;
use lifeweave_core::model::AnchorEvent;
use lifeweave_core::{
    ClaudeGenerator, ControlRegistry, HealthMonitor, ProgressEvent, ProgressKind, ProgressReporter, RunConfig,
    RunStatus, Seed, SessionError, SimulationEngine, SimulationSession,
};
use std::io::{self, BufRead};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

type BoxError = Box<dyn std::error::Error>;

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, BoxError> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}

async fn open_session(args: &RunArgs) -> Result<SimulationSession, BoxError> {
    let mut session = match (&args.session, &args.seeds) {
        (Some(path), _) => SimulationSession::load(path).await?,
        (None, Some(path)) => {
            let seeds: Vec<Seed> = read_json(path).await?;
            let mut session = SimulationSession::new(&args.name);
            for seed in seeds {
                session.add_seed(seed)?;
            }
            session
        }
        (None, None) => return Err("either --seeds or --session is required".into()),
    };

    if let Some(path) = &args.anchors {
        let anchors: Vec<AnchorEvent> = read_json(path).await?;
        for anchor in anchors {
            session.add_anchor(anchor);
        }
    }
    Ok(session)
}

fn print_progress(event: &ProgressEvent) {
    let who = event
        .character_name
        .as_deref()
        .filter(|n| !n.is_empty())
        .map(|n| format!(" {n}:"))
        .unwrap_or_default();
    let tag = match event.kind {
        ProgressKind::YearStart => "YEAR",
        ProgressKind::Generating => "GEN",
        ProgressKind::Completed => "DONE",
        ProgressKind::CrossEvent => "CROSS",
        ProgressKind::ArcDesigned => "ARC",
        ProgressKind::AuthorDirection => "DIRECTION",
        ProgressKind::StorylinePreview => "PREVIEW",
        ProgressKind::IntegratedStoryline => "HEALTH",
        ProgressKind::AutoPaused => "PAUSED",
        ProgressKind::Error => "ERROR",
        ProgressKind::Done => "END",
    };
    println!("[{:>5.1}%] [{tag}]{who} {}", event.progress, event.message);
}

/// Forward `#` commands from stdin to the registry until stdin closes.
fn spawn_command_reader(registry: Arc<ControlRegistry>, session_id: String) {
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            match line.trim() {
                "#pause" => {
                    registry.pause(&session_id);
                    println!("[PAUSED] Waiting for #resume");
                }
                "#resume" => {
                    registry.resume(&session_id);
                    println!("[RESUMED]");
                }
                "#abort" | "#quit" => {
                    registry.abort(&session_id);
                    println!("[ABORTING] Stopping after the current year");
                }
                "#status" => println!("[STATUS] paused: {}", registry.is_paused(&session_id)),
                "" => {}
                other => println!("[ERROR] Unknown command: {other}"),
            }
        }
    });
}

/// Run a simulation and save the session afterwards.
pub async fn run(args: &RunArgs, config: RunConfig) -> Result<(), BoxError> {
    let mut session = open_session(args).await?;
    let registry = Arc::new(ControlRegistry::new());
    let control = registry.register(session.id.clone());

    let abort_registry = registry.clone();
    let abort_id = session.id.clone();
    ctrlc::set_handler(move || {
        abort_registry.abort(&abort_id);
    })?;
    spawn_command_reader(registry.clone(), session.id.clone());

    println!("=== {} ===", session.name);
    println!(
        "Cast: {}",
        session
            .seeds
            .iter()
            .map(|s| s.codename.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("Years {} to {}", config.start_year, config.end_year);
    println!();

    let engine = SimulationEngine::new(Arc::new(ClaudeGenerator::from_env()?)).with_control(control);
    let (mut reporter, mut progress) = ProgressReporter::channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = progress.recv().await {
            print_progress(&event);
        }
    });

    let result = engine.run(&mut session, &config, &mut reporter).await;
    drop(reporter);
    printer.await.ok();
    registry.remove(&session.id);

    let outcome = result?;
    match outcome.status {
        RunStatus::Completed => info!(events = outcome.events.len(), "run complete"),
        RunStatus::Aborted => warn!(last_year = ?outcome.last_year, "run aborted"),
    }

    match args.save.as_ref().or(args.session.as_ref()) {
        Some(path) => {
            session.save(path).await?;
            println!("[SAVED] Session saved to {}", path.display());
        }
        None => println!("[NOTE] Nothing saved; pass --save <path> to keep this story"),
    }
    Ok(())
}

/// Print a saved session.
pub async fn show(path: &Path, list_events: bool) -> Result<(), SessionError> {
    let session = SimulationSession::load(path).await?;
    println!("=== {} ({}) ===", session.name, session.id);

    let last_year = session.events.iter().map(|e| e.year).max();
    for seed in &session.seeds {
        let Some(profile) = session.profile(&seed.id) else {
            continue;
        };
        println!();
        println!("{} [{}], {}", profile.display_name, seed.id, profile.status.name());
        println!("  Memories: {}", profile.memory_count);
        let traits: Vec<String> = profile
            .dominant_traits(3)
            .iter()
            .map(|t| format!("{} ({})", t.name, t.strength))
            .collect();
        if !traits.is_empty() {
            println!("  Traits: {}", traits.join(", "));
        }
        for ability in &profile.abilities {
            println!("  Ability: {} ({:?})", ability.name, ability.level);
        }
        if let Some(arc) = session.grammar.arc(&seed.id) {
            if let Some(phase) = arc.phases.get(arc.current_phase) {
                println!(
                    "  Arc: {} (tension {:.0}, fulfillment {:.0}%)",
                    phase.name, arc.tension, arc.fulfillment
                );
            }
        }
        if let Some(phase) = session.author_arcs.get(&seed.id).and_then(|a| a.current_phase()) {
            println!("  Author phase: {}", phase.name);
        }
    }

    if !session.npc_pool.is_empty() {
        println!();
        println!("Known people:");
        println!("{}", session.npc_pool.summary(20));
    }

    if let Some(year) = last_year {
        let preview = HealthMonitor::default().analyze(year, &session.character_ids(), &session.events);
        println!();
        println!(
            "Story health as of year {year}: {} (consistency {})",
            preview.health.name(),
            preview.consistency_score
        );
        for issue in &preview.issues {
            println!("  - {issue}");
        }
    }

    if list_events {
        println!();
        for event in &session.events {
            println!(
                "Year {:>4} {:<6} [{}] {} ({})",
                event.year,
                event.season.name(),
                event.character_id,
                event.title,
                event.importance.name()
            );
        }
    }
    Ok(())
}

/// Purge simulated state and save in place.
pub async fn reset(path: &Path) -> Result<(), SessionError> {
    let mut session = SimulationSession::load(path).await?;
    session.hard_reset();
    session.save(path).await?;
    println!("[RESET] {} now holds {} seeds and no history", path.display(), session.seeds.len());
    Ok(())
}
