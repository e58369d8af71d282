mod config;

use clap::{Parser, Subcommand};
use config::{BackendConfig, Config, MatchConfigJson};
use glyphtrigger::{
    load_image, load_template, normalize, ActionTrigger, CpuMatcher, DetectionLoop,
    DetectionOutcome, DetectionWorker, DeviceManager, EnigoTrigger, GpuMatcher, MatchResult,
    Point, ScreenCapture, TemplateMatcher, XcapCapture,
};
use serde::Serialize;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Watch a screen region for a glyph and click once it appears")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "glyphtrigger.json")]
    config: PathBuf,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Raise log output to debug level.
    #[arg(long)]
    trace: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the configured stages and fire the action once all have matched.
    /// Press enter to stop early.
    Run,
    /// Match a template against a source image file and print the result.
    Match {
        source: PathBuf,
        template: PathBuf,
        /// Overrides the configured threshold.
        #[arg(long)]
        threshold: Option<f32>,
    },
    /// Capture the detect area to an image file.
    Capture { out: PathBuf },
    /// Run the input sequence at the configured click point.
    Click,
    /// Initialize the compute device and print what was bound.
    Device,
    /// Write a default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Serialize)]
struct PointRecord {
    x: i32,
    y: i32,
}

impl From<Point> for PointRecord {
    fn from(value: Point) -> Self {
        Self {
            x: value.x,
            y: value.y,
        }
    }
}

#[derive(Debug, Serialize)]
struct MatchOutput {
    backend: &'static str,
    found: Option<PointRecord>,
    elapsed_ms: f64,
}

#[derive(Debug, Serialize)]
struct RunOutput {
    status: &'static str,
    hits: Vec<PointRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attempts: Option<u64>,
}

impl From<DetectionOutcome> for RunOutput {
    fn from(value: DetectionOutcome) -> Self {
        let (status, hits, stage, attempts) = match value {
            DetectionOutcome::Completed { hits } => ("completed", hits, None, None),
            DetectionOutcome::Stopped => ("stopped", Vec::new(), None, None),
            DetectionOutcome::AttemptsExhausted { stage, attempts } => {
                ("attempts_exhausted", Vec::new(), Some(stage), Some(attempts))
            }
            DetectionOutcome::TimedOut { stage } => ("timed_out", Vec::new(), Some(stage), None),
        };
        Self {
            status,
            hits: hits.into_iter().map(PointRecord::from).collect(),
            stage,
            attempts,
        }
    }
}

/// Picks the configured backend, falling back to the host matcher when no
/// compute device can be bound.
fn build_matcher(cfg: &MatchConfigJson) -> Box<dyn TemplateMatcher + Send> {
    let cpu = CpuMatcher::new().with_parallel(cfg.parallel);
    match cfg.backend {
        BackendConfig::Cpu => Box::new(cpu),
        BackendConfig::Gpu => {
            let mut gpu = GpuMatcher::new(cfg.device.into());
            if gpu.ensure_initialized() {
                tracing::info!("{}", gpu.describe());
                Box::new(gpu)
            } else {
                tracing::warn!("no compute device, using the {} backend", cpu.name());
                Box::new(cpu)
            }
        }
    }
}

fn load_config(path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    if path.exists() {
        Config::load(path)
    } else {
        tracing::warn!("{} not found, using defaults", path.display());
        Ok(Config::default())
    }
}

fn run(config: &Config, config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let plan = config.build_plan(base_dir)?;
    let matcher = build_matcher(&config.match_cfg);
    let action = EnigoTrigger::new(Duration::from_millis(config.action_delay_ms));
    let detection = DetectionLoop::new(plan, matcher, XcapCapture::new(), action)?;

    let worker = DetectionWorker::spawn(detection)?;
    let stop = worker.stop_handle();
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().lock().read_line(&mut line);
        stop.stop();
    });
    tracing::info!("watching, press enter to stop");

    let output = RunOutput::from(worker.join()?);
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn match_files(
    config: &Config,
    source: &Path,
    template: &Path,
    threshold: Option<f32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = normalize(&load_image(source)?);
    let template = load_template(template)?;
    let mut params = config.match_cfg.params();
    if let Some(threshold) = threshold {
        params.threshold = threshold;
    }

    let mut matcher = build_matcher(&config.match_cfg);
    let started = Instant::now();
    let result = matcher.try_find_first_match(&source, &template, &params)?;
    let output = MatchOutput {
        backend: matcher.name(),
        found: match result {
            MatchResult::FoundAt(point) => Some(point.into()),
            MatchResult::NotFound => None,
        },
        elapsed_ms: started.elapsed().as_secs_f64() * 1e3,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.trace { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(format!("glyphtrigger={level}").parse()?),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if cli.print_example {
        println!("{}", serde_json::to_string_pretty(&Config::default())?);
        return Ok(());
    }

    let Some(command) = cli.command else {
        return Err("no command given, see --help".into());
    };

    match command {
        Command::Init { force } => {
            if cli.config.exists() && !force {
                let message = format!("{} exists, pass --force to overwrite", cli.config.display());
                return Err(message.into());
            }
            Config::default().save(&cli.config)?;
            println!("wrote {}", cli.config.display());
        }
        Command::Run => {
            let config = Config::load(&cli.config)?;
            run(&config, &cli.config)?;
        }
        Command::Match {
            source,
            template,
            threshold,
        } => {
            let config = load_config(&cli.config)?;
            match_files(&config, &source, &template, threshold)?;
        }
        Command::Capture { out } => {
            let config = load_config(&cli.config)?;
            let frame = XcapCapture::new().capture(config.monitor_number, config.detect_area()?)?;
            frame.save(&out)?;
            println!("wrote {} ({}x{})", out.display(), frame.width(), frame.height());
        }
        Command::Click => {
            let config = load_config(&cli.config)?;
            let mut action = EnigoTrigger::new(Duration::from_millis(config.action_delay_ms));
            action.act(config.click_point())?;
        }
        Command::Device => {
            let config = load_config(&cli.config)?;
            let mut manager = DeviceManager::new(config.match_cfg.device.into());
            let context = manager.try_initialize()?;
            println!("{}", context.adapter_info);
            println!("backend: {:?}", context.adapter_info.backend);
            println!("workgroup: {}", context.workgroup_size);
            manager.teardown();
        }
    }

    Ok(())
}
