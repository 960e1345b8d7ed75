mod chart;
mod simulate;

use std::path::PathBuf;

use beatsync_core::{AppConfig, BeatSyncError, Engine};
use clap::{ArgGroup, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::{
    chart::Chart,
    simulate::{simulate, SimulationOptions},
};

fn main() -> beatsync_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            chart,
            config,
            fps,
            start,
        } => run_simulate(&chart, config.as_ref(), SimulationOptions { fps, start }),
        Commands::Convert {
            chart,
            beat,
            seconds,
            ignore_swing,
        } => run_convert(&chart, beat, seconds, ignore_swing),
    }
}

fn load_config(path: Option<&PathBuf>) -> beatsync_core::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path),
        None => Ok(AppConfig::default()),
    }
}

fn run_simulate(
    chart: &PathBuf,
    config: Option<&PathBuf>,
    options: SimulationOptions,
) -> beatsync_core::Result<()> {
    tracing::info!(?chart, ?config, "running simulation");
    let config = load_config(config)?;
    let chart = Chart::load(chart)?;
    let report = simulate(&chart, &config, options)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_convert(
    chart: &PathBuf,
    beat: Option<f64>,
    seconds: Option<f64>,
    ignore_swing: bool,
) -> beatsync_core::Result<()> {
    let chart = Chart::load(chart)?;
    let mut engine = Engine::default();
    engine
        .clock_mut()
        .edit_tempos(|tempos| tempos.add_tempo_changes(chart.tempo_changes.iter().copied()))?;
    let tempos = engine.tempos();

    match (beat, seconds) {
        (Some(beat), _) => {
            let seconds = if ignore_swing {
                tempos.beats_to_seconds_ignoring_swing(beat)
            } else {
                tempos.beats_to_seconds(beat)
            };
            println!("beat {beat} = {seconds:.6} s (tempo {})", tempos.tempo_at_beat(beat));
        }
        (None, Some(seconds)) => {
            let beat = if ignore_swing {
                tempos.seconds_to_beats_ignoring_swing(seconds)
            } else {
                tempos.seconds_to_beats(seconds)
            };
            println!("{seconds} s = beat {beat:.6} (tempo {})", tempos.tempo_at_seconds(seconds));
        }
        (None, None) => return Err(BeatSyncError::msg("either --beat or --seconds is required")),
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Beat clock and event scheduler for rhythm games", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a chart offline and print what fired as JSON.
    Simulate {
        /// Chart file with tempo changes, volume changes and cues.
        chart: PathBuf,
        /// Optional JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Video frames per second the clock is polled at.
        #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u32).range(1..))]
        fps: u32,
        /// Playback start in seconds.
        #[arg(long, default_value_t = 0.0)]
        start: f64,
    },
    /// Convert between beats and seconds using a chart's tempo map.
    #[command(group(ArgGroup::new("position").required(true).args(["beat", "seconds"])))]
    Convert {
        chart: PathBuf,
        #[arg(long)]
        beat: Option<f64>,
        #[arg(long)]
        seconds: Option<f64>,
        /// Use the straight timeline even where swing is set.
        #[arg(long)]
        ignore_swing: bool,
    },
}
