use clap::{Parser, Subcommand};
use splitstep_core::*;
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "splitstep")]
#[command(about = "Guided workout sets, rests and countdowns", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log engine activity at debug level (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List available exercises
    List,

    /// Show one exercise definition
    Show {
        /// Exercise id
        id: String,
    },

    /// Validate a minutes:seconds duration as entered on the picker
    CheckDuration {
        /// Minutes (0-59)
        minutes: u32,
        /// Seconds (0-59)
        seconds: u32,
    },

    /// Run a guided session for an exercise
    Run {
        /// Exercise id
        id: String,

        /// Length of one countdown second in milliseconds
        #[arg(long)]
        tick_ms: Option<u64>,

        /// Auto-complete (for testing) - finish manual sets immediately
        #[arg(long)]
        auto_complete: bool,

        /// Print the completion summary as a JSON line
        #[arg(long)]
        summary_json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        splitstep_core::logging::init_with_level("debug");
    } else {
        splitstep_core::logging::init();
    }

    let config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::List => cmd_list(&config),
        Commands::Show { id } => cmd_show(&config, &id),
        Commands::CheckDuration { minutes, seconds } => cmd_check_duration(minutes, seconds),
        Commands::Run {
            id,
            tick_ms,
            auto_complete,
            summary_json,
        } => {
            let tick_period = match tick_ms {
                Some(0) => return Err(Error::Config("--tick-ms must be at least 1".into())),
                Some(ms) => Duration::from_millis(ms),
                None => config.timer.tick_period(),
            };
            let options = RunOptions {
                tick_period,
                auto_complete,
                summary_json,
            };
            cmd_run(&config, &id, options).await
        }
    }
}

fn load_library(config: &Config) -> Result<ExerciseLibrary> {
    let library = config.exercise_library()?;
    let errors = library.validate();
    if !errors.is_empty() {
        eprintln!("Exercise library validation errors:");
        for error in &errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::InvalidDefinition("Invalid exercise library".into()));
    }
    Ok(library)
}

fn cmd_list(config: &Config) -> Result<()> {
    let library = load_library(config)?;

    for def in library.sorted() {
        let star = if def.favorite { "★" } else { " " };
        println!(
            "{} {:<20} {:<28} {:<10} {} sets, rest {}",
            star,
            def.id,
            def.name,
            def.sub_type(),
            def.sets,
            format_mmss(def.rest_duration_seconds)
        );
    }

    Ok(())
}

fn cmd_show(config: &Config, id: &str) -> Result<()> {
    let library = load_library(config)?;
    let def = library.get(id)?;

    println!("\n  {}", def.name);
    println!("  Type: {}", def.sub_type());
    println!("  Sets: {}", def.sets);
    match def.kind {
        ExerciseKind::Reps { reps } => println!("  Reps: {}", reps),
        ExerciseKind::TimedSets {
            set_duration_seconds,
        } => {
            let d = DurationDisplayable::from_stored(DurationKind::SetDuration, set_duration_seconds);
            println!("  {}: {}", d.title(), d.display());
        }
        ExerciseKind::Reaction {
            reps,
            cones,
            rep_duration_seconds,
        } => {
            let d = DurationDisplayable::from_stored(DurationKind::RepDuration, rep_duration_seconds);
            println!("  Reps: {}", reps);
            println!("  Cones: {}", cones);
            println!("  {}: {}", d.title(), d.display());
        }
    }
    let rest = DurationDisplayable::from_stored(DurationKind::RestDuration, def.rest_duration_seconds);
    println!("  {}: {}", rest.title(), rest.display());
    println!();

    Ok(())
}

fn cmd_check_duration(minutes: u32, seconds: u32) -> Result<()> {
    match duration::validate(minutes, seconds) {
        Ok(total) => {
            println!("✓ {} seconds ({})", total, format_mmss(total));
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ {} [{}]", e, e.message_key().unwrap_or("error"));
            Err(e)
        }
    }
}

struct RunOptions {
    tick_period: Duration,
    auto_complete: bool,
    summary_json: bool,
}

async fn cmd_run(config: &Config, id: &str, options: RunOptions) -> Result<()> {
    let RunOptions {
        tick_period,
        auto_complete,
        summary_json,
    } = options;
    let library = load_library(config)?;
    let definition = library.get(id)?.clone();

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let mut session = Session::new(definition.clone(), event_tx)?.with_tick_period(tick_period)?;

    // Rendering runs in its own task so a failure there never stops the session.
    let renderer = tokio::spawn(render_events(definition, event_rx, summary_json));

    let mut input = if auto_complete {
        None
    } else {
        Some(spawn_stdin_reader())
    };

    session.start()?;

    while !session.is_terminal() {
        if auto_complete && session.awaiting_manual() {
            session.complete_set()?;
            continue;
        }

        let timer_active = session.has_active_timer();
        let input_open = input.is_some();

        tokio::select! {
            progressed = session.process_next(), if timer_active => {
                progressed?;
            }
            line = next_line(&mut input), if input_open => {
                match line {
                    Some(line) if line.trim().eq_ignore_ascii_case("q") => {
                        session.cancel();
                        println!("\nSession abandoned.");
                    }
                    Some(_) => {
                        if session.awaiting_manual() {
                            session.complete_set()?;
                        }
                    }
                    None => {
                        input = None;
                    }
                }
            }
            else => {
                // Manual set with no way to signal completion
                session.cancel();
                println!("\nInput closed, session abandoned.");
            }
        }
    }

    drop(session);
    if let Err(e) = renderer.await {
        tracing::warn!("Renderer task failed: {}", e);
    }

    Ok(())
}

async fn next_line(input: &mut Option<mpsc::UnboundedReceiver<String>>) -> Option<String> {
    match input {
        Some(rx) => rx.recv().await,
        None => None,
    }
}

/// Read stdin on a plain thread; a pending blocking read must not hold up exit.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
    rx
}

async fn render_events(
    definition: ExerciseDefinition,
    mut rx: mpsc::UnboundedReceiver<SessionEvent>,
    summary_json: bool,
) {
    while let Some(event) = rx.recv().await {
        match event {
            SessionEvent::PhaseChanged { phase, .. } => render_phase(&definition, phase),
            SessionEvent::Remaining {
                display,
                total_seconds,
                ..
            } => println!("  {} / {}", display, format_mmss(total_seconds)),
            SessionEvent::Completed(summary) => {
                println!(
                    "\n✓ Session complete! {} sets of {}",
                    summary.sets_completed, definition.name
                );
                if summary_json {
                    match summary.to_json() {
                        Ok(json) => println!("{}", json),
                        Err(e) => tracing::warn!("Failed to render summary: {}", e),
                    }
                }
            }
        }
    }
}

fn render_phase(definition: &ExerciseDefinition, phase: Phase) {
    match phase {
        Phase::ActiveSet(i) => {
            println!("\n▶ Set {}/{}: {}", i + 1, definition.sets, definition.name);
            match definition.kind {
                ExerciseKind::Reps { reps } => {
                    println!("  → {} reps (Enter when done, 'q' to quit)", reps);
                }
                ExerciseKind::Reaction {
                    reps,
                    cones,
                    rep_duration_seconds,
                } => {
                    println!(
                        "  → {} reps across {} cones, {} per rep (Enter when done, 'q' to quit)",
                        reps,
                        cones,
                        format_mmss(rep_duration_seconds)
                    );
                }
                ExerciseKind::TimedSets { .. } => {}
            }
        }
        Phase::RestingAfter(i) => {
            println!("\n⏸ Rest after set {}/{}", i + 1, definition.sets);
        }
        Phase::Done => println!("\n■ Done"),
    }
}
