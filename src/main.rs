use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};

use pipevine::audio::{AudioMode, audio_input};
use pipevine::settings::RecordSettings;
use pipevine::{
    Availability, CaptureArea, CaptureRequest, Catalog, GstInspectChecker, Negotiator,
    ShellScreencastHost, filter_catalog,
};

#[derive(Parser)]
#[command(name = "pipevine")]
#[command(about = "Screencast pipeline negotiation for GNOME Shell recordings")]
#[command(version)]
struct Cli {
    /// Load candidate configurations from a JSON catalog file
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe the catalog and list usable configurations
    Configs {
        /// Also list configurations whose elements are missing
        #[arg(long)]
        all: bool,
    },

    /// Record the screen through GNOME Shell's screencast service
    Record(RecordArgs),
}

#[derive(Args)]
struct RecordArgs {
    /// Recording area as X,Y,WIDTHxHEIGHT (default: full screen)
    #[arg(long)]
    area: Option<String>,

    /// Screen size as WIDTHxHEIGHT, used for downsize math when
    /// recording the full screen
    #[arg(long, default_value = "1920x1080")]
    size: String,

    /// Recording duration in seconds
    #[arg(short, long, default_value = "10")]
    duration: u64,

    /// Output file path without extension
    /// (default: ~/Videos/cast_TIMESTAMP)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Audio sources: none, desktop, mic or both
    #[arg(long)]
    audio: Option<String>,

    /// Downsize ratio in (0, 1]
    #[arg(long)]
    downsize: Option<f64>,

    /// Framerate in frames per second
    #[arg(long)]
    framerate: Option<u32>,

    /// Leave the cursor out of the recording
    #[arg(long)]
    no_cursor: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let catalog = match &cli.catalog {
        Some(path) => Catalog::load(path)
            .with_context(|| format!("failed to load catalog {}", path.display()))?,
        None => Catalog::builtin(),
    };

    match cli.command {
        Commands::Configs { all } => list_configs(&catalog, all).await,
        Commands::Record(args) => record(&catalog, args).await,
    }
}

async fn list_configs(catalog: &Catalog, all: bool) -> Result<()> {
    let availability = Availability::probe(&GstInspectChecker, catalog)
        .await
        .context("failed to probe element availability (is gst-inspect-1.0 installed?)")?;

    for config in &catalog.configs {
        let available = availability.config(config);
        if !available && !all {
            continue;
        }

        let mark = if available { "available" } else { "missing" };
        println!("{} [{}] -> .{}", config.id, mark, config.container_ext);
        if !available {
            for segment in [
                &config.video_prep,
                &config.video_encode,
                &config.audio_encode,
                &config.muxer,
            ] {
                if !availability.segment(segment) {
                    println!("  ! {segment}");
                }
            }
        }
    }
    Ok(())
}

async fn record(catalog: &Catalog, args: RecordArgs) -> Result<()> {
    let mut settings = RecordSettings::load();
    if let Some(ratio) = args.downsize {
        settings.downsize_ratio = ratio;
    }
    if let Some(framerate) = args.framerate {
        settings.framerate = framerate;
    }
    if let Some(audio) = &args.audio {
        settings.audio = parse_audio_mode(audio)?;
    }
    if args.no_cursor {
        settings.draw_cursor = false;
    }

    if !(settings.downsize_ratio > 0.0 && settings.downsize_ratio <= 1.0) {
        bail!("downsize ratio must be in (0, 1], got {}", settings.downsize_ratio);
    }

    let (capture_area, width, height) = match &args.area {
        Some(area) => {
            let (x, y, width, height) = parse_area(area)?;
            (CaptureArea::Region { x, y, width, height }, width, height)
        }
        None => {
            let (width, height) = parse_size(&args.size)?;
            (CaptureArea::FullScreen, width, height)
        }
    };

    let output_stem = match args.output {
        Some(output) => output,
        None => default_output_stem()?,
    };

    let request = CaptureRequest {
        width,
        height,
        downsize_ratio: settings.downsize_ratio,
        audio_source: audio_input(settings.audio, settings.audio_channels),
        output_stem,
        framerate: settings.framerate,
        draw_cursor: settings.draw_cursor,
    };

    let configs = filter_catalog(&GstInspectChecker, catalog).await;

    let host = ShellScreencastHost::new(capture_area)
        .await
        .context("failed to connect to the session bus")?;
    let stopper = host.clone();

    let mut negotiator = Negotiator::new(configs, host);
    let capture = negotiator.attempt(&request).await?;
    if !capture.success {
        bail!("the screencast service refused to start recording");
    }

    log::info!(
        "Recording to {} with {} for {}s",
        capture.path.display(),
        capture.config_id,
        args.duration
    );
    tokio::time::sleep(Duration::from_secs(args.duration)).await;

    if !stopper.stop().await.context("failed to stop the screencast")? {
        log::warn!("The screencast service reported no recording to stop");
    }
    println!("{}", capture.path.display());
    Ok(())
}

fn parse_audio_mode(audio: &str) -> Result<AudioMode> {
    match audio {
        "none" => Ok(AudioMode::None),
        "desktop" => Ok(AudioMode::Desktop),
        "mic" => Ok(AudioMode::Mic),
        "both" => Ok(AudioMode::Both),
        other => bail!("unknown audio mode `{other}` (expected none, desktop, mic or both)"),
    }
}

/// Parse `WIDTHxHEIGHT`.
fn parse_size(size: &str) -> Result<(u32, u32)> {
    let (width, height) = size
        .split_once('x')
        .with_context(|| format!("invalid size `{size}` (expected WIDTHxHEIGHT)"))?;
    Ok((
        width.parse().with_context(|| format!("invalid width `{width}`"))?,
        height.parse().with_context(|| format!("invalid height `{height}`"))?,
    ))
}

/// Parse `X,Y,WIDTHxHEIGHT`.
fn parse_area(area: &str) -> Result<(i32, i32, u32, u32)> {
    let parts: Vec<&str> = area.splitn(3, ',').collect();
    let [x, y, size] = parts.as_slice() else {
        bail!("invalid area `{area}` (expected X,Y,WIDTHxHEIGHT)");
    };
    let (width, height) = parse_size(size)?;
    Ok((
        x.parse().with_context(|| format!("invalid x `{x}`"))?,
        y.parse().with_context(|| format!("invalid y `{y}`"))?,
        width,
        height,
    ))
}

fn default_output_stem() -> Result<PathBuf> {
    let videos = dirs::video_dir().context("no user videos directory")?;
    let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    Ok(videos.join(format!("cast_{timestamp}")))
}
