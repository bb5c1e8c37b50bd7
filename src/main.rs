use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use mtg_draw_odds::card::{Category, EffectCatalog};
use mtg_draw_odds::simulation::{
    analyze_convergence, effects_for_cards, log_spaced_counts, measure_parallel_scaling, parse_deck_file,
    recommend_trial_count, simulate_full_state, DeckFile, DrawPlan, MulliganRule, SimulationConfig,
    SimulationEngine, SimulationRequest, SimulationResult, TargetCondition,
};
use serde::Serialize;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "mtg-odds")]
#[command(about = "Monte Carlo draw probabilities for MTG decks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Deck file to use
    #[arg(short, long, global = true, default_value = "deck.txt")]
    deck: String,

    /// Effect catalog (JSON) used for card categories and --cast
    #[arg(long, global = true)]
    catalog: Option<String>,

    /// Number of trials
    #[arg(short = 'n', long, global = true, default_value_t = 10_000)]
    trials: u64,

    /// Seed for random number generator (for reproducibility)
    #[arg(short, long, global = true)]
    seed: Option<u64>,

    /// Cards drawn in the draw phase
    #[arg(long, global = true, default_value_t = 7)]
    draws: u32,

    /// Worker threads (default: all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Stop after this many milliseconds and report the completed trials
    #[arg(long, global = true)]
    deadline_ms: Option<u64>,

    /// Cards whose catalog effects resolve before the draw phase
    #[arg(long = "cast", global = true)]
    cast: Vec<String>,

    /// Apply a London mulligan (keep 2-5 lands, up to 2 mulligans)
    #[arg(long, global = true)]
    mulligan: bool,

    /// Print a JSON report instead of text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Probability of holding at least one card of a category
    Category { category: Category },

    /// Probability of holding any (or all) of the named cards
    Names {
        /// Comma-separated card names
        #[arg(required = true, value_delimiter = ',')]
        names: Vec<String>,

        /// Require every name instead of any
        #[arg(long)]
        all: bool,
    },

    /// Per-card odds of being among the next cards, using [top]/[bottom]
    FullState {
        /// Number of cards off the top
        #[arg(long, default_value_t = 1)]
        horizon: u32,
    },

    /// Show the effect descriptors of a card from the catalog
    Effects { card: String },

    /// Estimate error against trial count and recommend a trial count
    Convergence {
        category: Category,

        #[arg(long, default_value_t = 100)]
        min: u64,

        #[arg(long, default_value_t = 100_000)]
        max: u64,

        #[arg(long, default_value_t = 8)]
        points: usize,

        /// Maximum acceptable error percentage
        #[arg(long, default_value_t = 0.5)]
        target_error: f64,

        /// Maximum acceptable run time in seconds
        #[arg(long, default_value_t = 1.0)]
        max_time: f64,
    },

    /// Throughput and speedup for several thread counts
    Scaling {
        category: Category,

        #[arg(long, value_delimiter = ',', default_value = "1,2,4,8")]
        thread_counts: Vec<usize>,
    },
}

#[derive(Serialize)]
struct Report<'a, T: Serialize> {
    command: &'a str,
    generated_at: DateTime<Utc>,
    result: T,
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    if let Err(e) = run(&cli) {
        eprintln!("✗ {}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("MTG_ODDS_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = match &cli.catalog {
        Some(path) => Some(EffectCatalog::from_file(path)?),
        None => None,
    };

    match &cli.command {
        Commands::Effects { card } => {
            let catalog = catalog.ok_or("the effects command needs --catalog")?;
            let effects = catalog.resolve_effects(card)?;
            if cli.json {
                print_json("effects", &effects)?;
            } else {
                println!("\n=== {} ===\n", card);
                if effects.is_empty() {
                    println!("  (no effects)");
                }
                for (i, effect) in effects.iter().enumerate() {
                    println!("  {}. {}", i + 1, effect);
                }
            }
        }
        Commands::Category { category } => {
            let deck = load_deck(cli, catalog.as_ref())?;
            let request = build_request(cli, &deck, catalog.as_ref(), TargetCondition::category(*category))?;
            let result = run_with_progress(cli, &request)?;
            report_result(cli, "category", &format!("at least one {}", category), &result)?;
        }
        Commands::Names { names, all } => {
            let deck = load_deck(cli, catalog.as_ref())?;
            let target = if *all {
                TargetCondition::all_names(names.iter().cloned())
            } else {
                TargetCondition::any_name(names.iter().cloned())
            };
            let request = build_request(cli, &deck, catalog.as_ref(), target.clone())?.with_breakdown(true);
            let result = run_with_progress(cli, &request)?;
            report_result(cli, "names", &target.to_string(), &result)?;
        }
        Commands::FullState { horizon } => {
            let deck = load_deck(cli, catalog.as_ref())?;
            let mut request = deck.full_state_request(*horizon);
            request.trials = cli.trials;
            request.seed = cli.seed;
            let result = simulate_full_state(&engine(cli)?, &request)?;
            if cli.json {
                print_json("full-state", &result)?;
            } else {
                println!("\n=== Next {} card(s) of {} ===\n", result.horizon, result.library_size);
                let mut cards: Vec<_> = result.cards.iter().filter(|c| c.copies_remaining > 0).collect();
                cards.sort_by(|a, b| b.p_now.total_cmp(&a.p_now));
                for card in cards {
                    let marker = if card.deterministic { "✓" } else { " " };
                    let bar = "█".repeat((card.p_now * 50.0) as usize);
                    println!(
                        "  {} {:<30} {:6.2}% {} ({} left)",
                        marker,
                        card.name,
                        card.p_now * 100.0,
                        bar,
                        card.copies_remaining
                    );
                }
                println!();
                println!("Trials run: {}{}", result.trials_run, if result.cancelled { " (cancelled)" } else { "" });
                println!("Seed: {}", result.seed);
            }
        }
        Commands::Convergence {
            category,
            min,
            max,
            points,
            target_error,
            max_time,
        } => {
            let deck = load_deck(cli, catalog.as_ref())?;
            let request = build_request(cli, &deck, catalog.as_ref(), TargetCondition::category(*category))?;
            let counts = log_spaced_counts(*min, *max, *points);
            let data = analyze_convergence(&engine(cli)?, &request, &counts)?;
            let recommendation = recommend_trial_count(&data, *target_error, *max_time);
            if cli.json {
                print_json("convergence", (&data, &recommendation))?;
            } else {
                println!("\n=== Convergence: at least one {} ===\n", category);
                for point in &data {
                    println!("  {}", point);
                }
                println!();
                println!("Recommendation: {}", recommendation);
            }
        }
        Commands::Scaling { category, thread_counts } => {
            let deck = load_deck(cli, catalog.as_ref())?;
            let mut request = build_request(cli, &deck, catalog.as_ref(), TargetCondition::category(*category))?;
            if request.seed.is_none() {
                request.seed = Some(mtg_draw_odds::rng::fresh_seed());
            }
            let data = measure_parallel_scaling(&config(cli), &request, thread_counts)?;
            if cli.json {
                print_json("scaling", &data)?;
            } else {
                println!("\n=== Parallel scaling ({} trials) ===\n", request.trials);
                for point in &data {
                    println!("  {}", point);
                }
            }
        }
    }
    Ok(())
}

fn load_deck(cli: &Cli, catalog: Option<&EffectCatalog>) -> Result<DeckFile, Box<dyn std::error::Error>> {
    let deck = parse_deck_file(&cli.deck, catalog).map_err(|e| format!("Failed to parse deck file '{}': {}", cli.deck, e))?;
    if !cli.json {
        eprintln!("✓ Loaded {} ({} cards in library)", cli.deck, deck.library_count());
    }
    Ok(deck)
}

fn build_request(
    cli: &Cli,
    deck: &DeckFile,
    catalog: Option<&EffectCatalog>,
    target: TargetCondition,
) -> Result<SimulationRequest, Box<dyn std::error::Error>> {
    let mut draw = DrawPlan::draws(cli.draws);
    if cli.mulligan {
        draw = draw.with_mulligan(MulliganRule::default());
    }
    let mut request = deck.request(target).with_trials(cli.trials).with_draw(draw);
    request.seed = cli.seed;

    if !cli.cast.is_empty() {
        let catalog = catalog.ok_or("--cast needs --catalog")?;
        request = request.with_effects(effects_for_cards(catalog, &cli.cast)?);
    }
    Ok(request)
}

fn config(cli: &Cli) -> SimulationConfig {
    SimulationConfig {
        threads: cli.threads,
        deadline: cli.deadline_ms.map(Duration::from_millis),
        ..SimulationConfig::default()
    }
}

fn engine(cli: &Cli) -> Result<SimulationEngine, Box<dyn std::error::Error>> {
    Ok(SimulationEngine::new(config(cli))?)
}

fn run_with_progress(cli: &Cli, request: &SimulationRequest) -> Result<SimulationResult, Box<dyn std::error::Error>> {
    let progress = if cli.json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(request.trials)
    };
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} trials [{elapsed_precise}]") {
        progress.set_style(style);
    }

    let bar = progress.clone();
    let engine = engine(cli)?.with_progress(move |done, _| bar.set_position(done));
    let result = engine.run(request);
    progress.finish_and_clear();
    Ok(result?)
}

fn report_result(
    cli: &Cli,
    command: &str,
    target: &str,
    result: &SimulationResult,
) -> Result<(), Box<dyn std::error::Error>> {
    if cli.json {
        return print_json(command, result);
    }

    println!("\n=== Draw odds: {} ===\n", target);
    println!(
        "Probability: {:.4}% ({}/{})",
        result.probability * 100.0,
        result.hits,
        result.trials_run
    );
    println!(
        "{:.0}% interval: [{:.4}%, {:.4}%]",
        result.confidence.level * 100.0,
        result.confidence.low * 100.0,
        result.confidence.high * 100.0
    );
    if let Some(theory) = result.theoretical_probability {
        println!("Theoretical: {:.4}%", theory * 100.0);
    }
    if let (Some(abs), Some(pct)) = (result.absolute_error, result.error_pct) {
        println!("Error: {:.6} ({:.3}%)", abs, pct);
    }
    if result.fizzled_tutors > 0 {
        println!("Fizzled tutors: {}", result.fizzled_tutors);
    }
    if result.mulligans > 0 {
        println!(
            "Mulligans: {:.3} per trial",
            result.mulligans as f64 / result.trials_run.max(1) as f64
        );
    }

    if !result.per_name.is_empty() {
        println!("\nBy card:");
        for (name, p) in &result.per_name {
            let bar = "█".repeat((p * 50.0) as usize);
            println!("  {:<30} {:6.2}% {}", name, p * 100.0, bar);
        }
    }
    if !result.per_category.is_empty() {
        println!("\nBy category:");
        for (category, p) in &result.per_category {
            println!("  {:<30} {:6.2}%", category, p * 100.0);
        }
    }

    println!();
    if result.cancelled {
        println!(
            "✗ Cancelled after {} of {} trials",
            result.trials_run, result.trials_requested
        );
    }
    println!("Seed: {}", result.seed);
    println!(
        "Simulation completed in {:.2}s ({:.0} trials/sec)",
        result.elapsed_seconds, result.trials_per_second
    );
    Ok(())
}

fn print_json<T: Serialize>(command: &str, result: T) -> Result<(), Box<dyn std::error::Error>> {
    let report = Report {
        command,
        generated_at: Utc::now(),
        result,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
