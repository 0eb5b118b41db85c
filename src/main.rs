use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use duosync::stages::filter_and_extract_non_overlap;
use duosync::{
    merge_tracks, parse_track_file, CancellationFlag, EmbeddingConfig, HashingEncoder,
    HttpEncoder, HumanOutput, MachineOutput, MergeConfig, MergeMetadata, ProgressTracker,
    ScoreProvider, Side, SubtitleTrack,
};

#[derive(Parser)]
#[command(name = "duosync")]
#[command(author, version, about = "Bilingual subtitle merging by semantic span alignment", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EncoderKind {
    /// Local character n-gram hashing, no network
    Hashing,
    /// OpenAI-compatible embeddings endpoint
    Http,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge a primary and a secondary track into bilingual segments
    Merge {
        /// Primary track (track JSON format)
        #[arg(short, long)]
        primary: PathBuf,

        /// Secondary track (track JSON format)
        #[arg(short, long)]
        secondary: PathBuf,

        /// Output file for machine-readable segments (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Output file for human-readable listing (text)
        #[arg(long)]
        human_readable: Option<PathBuf>,

        /// How many tokens a boundary may move during refinement
        #[arg(long, default_value = "4")]
        window_size: usize,

        /// Maximum texts per encoder call
        #[arg(long, default_value = "32")]
        batch_size: usize,

        /// Tokens past the cursor considered by the global aligner
        #[arg(long, default_value = "24")]
        lookahead: usize,

        /// Number of neighbour refinement passes
        #[arg(long, default_value = "2")]
        refine_passes: u32,

        /// Keep cues that overlap nothing on the other track in the merge
        #[arg(long)]
        ignore_non_overlap_filter: bool,

        /// Encoder used to score candidate spans
        #[arg(long, value_enum, default_value = "hashing")]
        encoder: EncoderKind,

        /// Embeddings endpoint (overrides EMBEDDING_API_URL)
        #[arg(long)]
        endpoint: Option<String>,

        /// Embedding model name (overrides EMBEDDING_MODEL)
        #[arg(long)]
        model: Option<String>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Report how two tracks line up without merging them
    Inspect {
        /// Primary track (track JSON format)
        #[arg(short, long)]
        primary: PathBuf,

        /// Secondary track (track JSON format)
        #[arg(short, long)]
        secondary: PathBuf,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Merge {
            primary,
            secondary,
            output,
            human_readable,
            window_size,
            batch_size,
            lookahead,
            refine_passes,
            ignore_non_overlap_filter,
            encoder,
            endpoint,
            model,
            verbose,
        } => {
            setup_logging(verbose);
            let config = MergeConfig {
                window_size,
                batch_size,
                lookahead_tokens: lookahead,
                refine_passes,
                ignore_non_overlap_filter,
                ..Default::default()
            };
            let provider = build_encoder(encoder, endpoint, model)?;
            merge_command(primary, secondary, output, human_readable, config, provider).await
        }
        Commands::Inspect {
            primary,
            secondary,
            verbose,
        } => {
            setup_logging(verbose);
            inspect_tracks(primary, secondary)
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn build_encoder(
    kind: EncoderKind,
    endpoint: Option<String>,
    model: Option<String>,
) -> Result<Box<dyn ScoreProvider>> {
    match kind {
        EncoderKind::Hashing => Ok(Box::new(HashingEncoder::default())),
        EncoderKind::Http => {
            let mut config = match endpoint {
                Some(url) => {
                    let mut config = EmbeddingConfig::new(url, "LaBSE".to_string());
                    config.api_key = std::env::var("EMBEDDING_API_KEY").ok();
                    config
                }
                None => EmbeddingConfig::from_env()?,
            };
            if let Some(model) = model {
                config.model = model;
            }
            info!("Using embeddings endpoint {} ({})", config.api_url, config.model);
            Ok(Box::new(HttpEncoder::new(config)))
        }
    }
}

async fn merge_command(
    primary_path: PathBuf,
    secondary_path: PathBuf,
    output: PathBuf,
    human_readable: Option<PathBuf>,
    config: MergeConfig,
    provider: Box<dyn ScoreProvider>,
) -> Result<()> {
    config.validate()?;

    info!("Loading primary track from {:?}", primary_path);
    let primary = parse_track_file(&primary_path).context("Failed to load primary track")?;
    info!("Loading secondary track from {:?}", secondary_path);
    let secondary = parse_track_file(&secondary_path).context("Failed to load secondary track")?;
    info!(
        "Loaded {} primary cues, {} secondary cues, {} secondary tokens",
        primary.cues.len(),
        secondary.cues.len(),
        secondary.tokens.len()
    );

    let cancel = CancellationFlag::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping after the current batch");
                cancel.cancel();
            }
        })
    };

    let encoder_name = provider.name().to_string();
    let progress = ProgressTracker::new(config.stage_weights)
        .with_callback(|percent| debug!("Progress: {}%", percent));

    let worker = tokio::task::spawn_blocking(move || {
        let outcome = merge_tracks(
            &primary,
            &secondary,
            provider.as_ref(),
            &config,
            cancel,
            progress,
        );
        (outcome, primary, secondary)
    });
    let (outcome, primary, secondary) = worker.await.context("Merge worker panicked")?;
    interrupt.abort();
    let outcome = outcome?;

    if outcome.cancelled {
        warn!("Merge cancelled, writing partial result");
    }

    let metadata = MergeMetadata::new(&primary, &secondary, &outcome, &encoder_name);
    let human = HumanOutput::new(&outcome.segments);
    if let Some(path) = &human_readable {
        human.write_file(path)?;
        info!("Human-readable output written to {:?}", path);
    }

    MachineOutput::new(outcome.segments.clone(), metadata).write_json(&output)?;
    info!("Output written to {:?}", output);

    info!(
        "Complete: {} segments, {} aligned, {} secondary tokens unassigned",
        outcome.segments.len(),
        outcome.stats.segments_aligned,
        outcome.stats.unassigned_tokens
    );

    Ok(())
}

fn inspect_tracks(primary_path: PathBuf, secondary_path: PathBuf) -> Result<()> {
    info!("Inspecting {:?} and {:?}", primary_path, secondary_path);
    let primary = parse_track_file(&primary_path).context("Failed to load primary track")?;
    let secondary = parse_track_file(&secondary_path).context("Failed to load secondary track")?;

    println!("Track Analysis");
    println!("==============");
    print_track("Primary", &primary);
    print_track("Secondary", &secondary);
    println!();

    let mut primary_cues = primary.cues.clone();
    let mut secondary_cues = secondary.cues.clone();
    let (primary_only, _) =
        filter_and_extract_non_overlap(&mut primary_cues, &secondary.cues, Side::Primary);
    let (secondary_only, spans) =
        filter_and_extract_non_overlap(&mut secondary_cues, &primary.cues, Side::Secondary);

    println!("Overlap");
    println!("-------");
    println!("Primary cues with no secondary counterpart: {}", primary_only.len());
    println!("Secondary cues with no primary counterpart: {}", secondary_only.len());
    println!(
        "Secondary tokens outside the overlap: {}",
        spans.iter().map(|s| s.len()).sum::<usize>()
    );

    let unspanned = secondary
        .cues
        .iter()
        .filter(|c| c.token_span.is_empty() && !c.text.trim().is_empty())
        .count();
    if unspanned > 0 {
        println!();
        println!("Warning: {} secondary cues carry text but no token span", unspanned);
    }

    Ok(())
}

fn print_track(label: &str, track: &SubtitleTrack) {
    println!(
        "{}: {} cues, {} tokens, {:.1}s",
        label,
        track.cues.len(),
        track.tokens.len(),
        track.duration_ms() as f64 / 1000.0
    );
}
