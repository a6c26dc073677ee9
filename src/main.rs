use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use ar_scene::descriptor::build_descriptor;
use ar_scene::presets::PlaneAspect;
use ar_scene::project::Project;
use clap::{Parser, Subcommand};
use marker_ar_viewer::analytics::{AnalyticsSink, DiscardSink};
use marker_ar_viewer::core::script_registry::ScriptRegistry;
use marker_ar_viewer::info::InfoPanel;
use marker_ar_viewer::platform::EngineSignal;
use marker_ar_viewer::platform::simulated::SimulatedBrowser;
use marker_ar_viewer::viewer::{ProjectSource, StaticProject};
use marker_ar_viewer::{ArViewer, ViewerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Inspect AR projects and run the viewer against a simulated browser.
#[derive(Parser, Debug)]
#[command(name = "arview")]
#[command(about = "📷 Marker-tracking AR viewer harness")]
#[command(long_about = "Fetch AR projects from the backend and replay viewer sessions against an
in-memory browser: camera, engine scripts, tracking events and video playback are simulated.")]
struct Cli {
    /// Viewer config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL, e.g. https://host/api/v1
    #[arg(long, global = true)]
    api: Option<String>,

    /// Bearer token for the backend
    #[arg(long, global = true)]
    token: Option<String>,

    /// Target-lost grace window in milliseconds (0 disables debouncing)
    #[arg(long, global = true)]
    grace_ms: Option<u64>,

    /// Aspect of image and video planes
    #[arg(long, global = true, value_enum)]
    aspect: Option<PlaneAspect>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a project's info panel and scene descriptor as JSON
    Inspect {
        /// Project short code
        short_code: String,
    },

    /// Replay a scripted viewer session
    Simulate {
        /// Project JSON file (as returned by the backend)
        #[arg(long, conflicts_with = "short_code")]
        project: Option<PathBuf>,

        /// Fetch the project from the backend instead
        #[arg(long)]
        short_code: Option<String>,

        /// Comma-separated steps: start, found, lost, error:<msg>, wait:<dur>,
        /// mute, play, info, fullscreen, back, retry, reload
        #[arg(
            long,
            default_value = "start,found,wait:300ms,lost,wait:600ms,mute,back",
            help = "Steps to replay. Durations: 300 or 300ms (milliseconds), 2s (seconds)"
        )]
        steps: String,

        /// Deny camera permission
        #[arg(long)]
        deny_camera: bool,

        /// Make the engine scripts fail to load
        #[arg(long)]
        fail_scripts: bool,
    },
}

/// One scripted action in a simulated session.
#[derive(Debug, Clone, PartialEq)]
enum Step {
    Start,
    Found,
    Lost,
    EngineError(String),
    Wait(Duration),
    Mute,
    Play,
    Info,
    Fullscreen,
    Back,
    Retry,
    Reload,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marker_ar_viewer=info,arview=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::default(),
    };
    if let Some(api) = &cli.api {
        config.api_base_url = api.clone();
    }
    if let Some(grace_ms) = cli.grace_ms {
        config.lost_grace_ms = grace_ms;
    }
    if let Some(aspect) = cli.aspect {
        config.plane_aspect = aspect;
    }
    config.validate().map_err(anyhow::Error::msg)?;

    match cli.command {
        Command::Inspect { short_code } => inspect(&config, cli.token, &short_code).await,
        Command::Simulate {
            project,
            short_code,
            steps,
            deny_camera,
            fail_scripts,
        } => {
            let steps = parse_steps(&steps)?;
            let source: Arc<dyn ProjectSource>;
            let analytics: Arc<dyn AnalyticsSink>;
            let short_code = match (project, short_code) {
                (Some(path), _) => {
                    let project = read_project(&path)?;
                    let code = project
                        .qr_code
                        .as_ref()
                        .map_or_else(|| project.id.clone(), |qr| qr.short_code.clone());
                    source = Arc::new(StaticProject(project));
                    analytics = Arc::new(DiscardSink);
                    code
                }
                (None, Some(code)) => {
                    let client = Arc::new(marker_ar_viewer::connect_backend(&config, cli.token)?);
                    source = client.clone();
                    analytics = client;
                    code
                }
                (None, None) => anyhow::bail!("simulate needs --project or --short-code"),
            };
            simulate(config, source, analytics, &short_code, &steps, deny_camera, fail_scripts).await
        }
    }
}

async fn inspect(config: &ViewerConfig, token: Option<String>, short_code: &str) -> Result<()> {
    let client = marker_ar_viewer::connect_backend(config, token)?;
    let project = client
        .project_by_short_code(short_code)
        .await
        .with_context(|| format!("Failed to fetch project '{}'", short_code))?;

    let descriptor = build_descriptor(&project, config.plane_aspect)?;
    let report = serde_json::json!({
        "status": project.status,
        "info": InfoPanel::for_project(&project),
        "scene": descriptor,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn read_project(path: &Path) -> Result<Project> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read project file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid project JSON in {}", path.display()))
}

async fn simulate(
    config: ViewerConfig,
    source: Arc<dyn ProjectSource>,
    analytics: Arc<dyn AnalyticsSink>,
    short_code: &str,
    steps: &[Step],
    deny_camera: bool,
    fail_scripts: bool,
) -> Result<()> {
    let browser = SimulatedBrowser::for_config(&config);
    browser.deny_camera(deny_camera);
    if fail_scripts {
        for script in &config.scripts {
            browser.fail_script(&script.id);
        }
    }

    let mut viewer = ArViewer::builder(short_code)
        .config(config)
        .platform(browser.platform())
        .project_source(source)
        .analytics(analytics)
        .script_registry(Arc::new(ScriptRegistry::new()))
        .build()?;

    let started = tokio::time::Instant::now();
    let mut last_state = viewer.state().clone();
    println!("{:>7} {:<12} {}", "t", "step", "state");
    println!("{:>7} {:<12} {}", "0ms", "-", last_state);

    viewer.initialize().await?;
    println!(
        "{:>5}ms {:<12} {}",
        started.elapsed().as_millis(),
        "initialize",
        viewer.state()
    );
    last_state = viewer.state().clone();

    for step in steps {
        let outcome = match step {
            Step::Start => viewer.start_ar().await,
            Step::Found => {
                browser.emit(EngineSignal::TargetFound);
                Ok(())
            }
            Step::Lost => {
                browser.emit(EngineSignal::TargetLost);
                Ok(())
            }
            Step::EngineError(message) => {
                browser.emit(EngineSignal::RuntimeError {
                    message: message.clone(),
                });
                Ok(())
            }
            Step::Wait(duration) => {
                tokio::time::sleep(*duration).await;
                browser.advance_playback(duration.as_secs_f64());
                Ok(())
            }
            Step::Mute => {
                viewer.toggle_mute();
                Ok(())
            }
            Step::Play => viewer.toggle_playback().map(|_| ()),
            Step::Info => {
                if viewer.toggle_info() {
                    if let Some(panel) = viewer.info_panel() {
                        println!("{}", serde_json::to_string_pretty(&panel)?);
                    }
                }
                Ok(())
            }
            Step::Fullscreen => {
                viewer.toggle_fullscreen().await;
                Ok(())
            }
            Step::Back => viewer.back(),
            Step::Retry => viewer.retry(),
            Step::Reload => viewer.reload().await,
        };
        if let Err(e) = outcome {
            println!("        rejected: {}", e);
        }
        viewer.process_pending();

        let state = viewer.state();
        let marker = if *state != last_state { "→ " } else { "  " };
        println!(
            "{:>5}ms {:<12} {}{}",
            started.elapsed().as_millis(),
            step_name(step),
            marker,
            state
        );
        last_state = state.clone();
    }

    viewer.shutdown();
    println!();
    println!("camera tracks live: {}", browser.live_camera_tracks());
    println!("getUserMedia calls: {}", browser.user_media_calls());
    println!("scenes built:       {}", browser.engines_created());
    println!("media commands:     {:?}", browser.media_log());
    if let Some(video) = browser.video() {
        println!(
            "video:              paused={} muted={} loop={} position={:.1}s",
            video.paused, video.muted, video.looping, video.position
        );
    }
    Ok(())
}

fn step_name(step: &Step) -> String {
    match step {
        Step::Wait(d) => format!("wait {}ms", d.as_millis()),
        Step::EngineError(_) => "error".to_string(),
        other => format!("{:?}", other).to_lowercase(),
    }
}

/// Parse a step list like "start,found,wait:300ms,lost"
fn parse_steps(steps: &str) -> Result<Vec<Step>> {
    steps
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|step| {
            let (name, arg) = match step.split_once(':') {
                Some((name, arg)) => (name, Some(arg)),
                None => (step, None),
            };
            match (name, arg) {
                ("start", None) => Ok(Step::Start),
                ("found", None) => Ok(Step::Found),
                ("lost", None) => Ok(Step::Lost),
                ("error", Some(message)) => Ok(Step::EngineError(message.to_string())),
                ("wait", Some(duration)) => parse_duration(duration).map(Step::Wait),
                ("mute", None) => Ok(Step::Mute),
                ("play", None) => Ok(Step::Play),
                ("info", None) => Ok(Step::Info),
                ("fullscreen", None) => Ok(Step::Fullscreen),
                ("back", None) => Ok(Step::Back),
                ("retry", None) => Ok(Step::Retry),
                ("reload", None) => Ok(Step::Reload),
                _ => Err(anyhow::anyhow!("Invalid step: {}", step)),
            }
        })
        .collect()
}

/// Parse duration string like "300", "300ms", "2s"
fn parse_duration(duration: &str) -> Result<Duration> {
    if let Ok(millis) = duration.parse::<u64>() {
        return Ok(Duration::from_millis(millis));
    }

    let (num_str, unit) = if let Some(num) = duration.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = duration.strip_suffix('s') {
        (num, "s")
    } else {
        return Err(anyhow::anyhow!(
            "Invalid duration unit: {}. Use 'ms' for milliseconds or 's' for seconds",
            duration
        ));
    };
    let num: u64 = num_str
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid number in duration: {}", num_str))?;

    match unit {
        "ms" => Ok(Duration::from_millis(num)),
        _ => Ok(Duration::from_secs(num)),
    }
}
