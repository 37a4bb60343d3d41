// src/main.rs - Replay recorded landmark streams through the form coach
use anyhow::{bail, Context, Result};
use clap::Parser;
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{error, info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;

use formcoach::export::default_session_name;
use formcoach::{ExerciseConfig, ExerciseKind, LandmarkFrame, Session, SessionRecorder};

#[derive(Parser, Debug)]
#[command(name = "formcoach")]
#[command(about = "Replay pose landmark streams and print form feedback")]
struct Args {
    /// Newline-delimited JSON streams; stdin when none are given
    inputs: Vec<PathBuf>,

    /// Exercise for streams that do not select one
    #[arg(short, long)]
    exercise: Option<String>,

    /// Exercise config JSON used instead of the built-in presets
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write feedback.csv and summary.json for each stream under this directory
    #[arg(long)]
    export: Option<PathBuf>,
}

/// One line of a stream: an exercise selection or a frame.
#[derive(Deserialize)]
#[serde(untagged)]
enum Message {
    Select { exercise: String },
    Frame(LandmarkFrame),
}

struct Settings {
    exercise: Option<String>,
    config: Option<ExerciseConfig>,
    export: Option<PathBuf>,
}

struct Replay {
    session: Session,
    recorder: Option<SessionRecorder>,
}

/// Preset for `name`, or the user's override from the platform config dir.
fn load_exercise(name: &str) -> Result<ExerciseConfig> {
    let kind: ExerciseKind = name.parse()?;
    if let Some(dirs) = ProjectDirs::from("", "", "formcoach") {
        let path = dirs.config_dir().join(format!("{}.json", kind.slug()));
        if path.exists() {
            info!(path = %path.display(), "using exercise override");
            return ExerciseConfig::from_json_file(&path)
                .with_context(|| format!("loading {}", path.display()));
        }
    }
    Ok(ExerciseConfig::preset(kind))
}

fn open_session(settings: &Settings, stream: &str, selected: Option<&str>) -> Result<Replay> {
    let config = match (&settings.config, selected.or(settings.exercise.as_deref())) {
        (Some(config), _) => config.clone(),
        (None, Some(name)) => load_exercise(name)?,
        (None, None) => bail!(
            "{stream}: no exercise selected; pass --exercise or start the stream with {{\"exercise\": ...}}"
        ),
    };

    let recorder = settings.export.as_ref().map(|dir| {
        let name = format!("{}_{}", stream, default_session_name(&config.name));
        SessionRecorder::new(dir, &config.name, Some(name))
    });
    let session = Session::new(config).context("invalid exercise configuration")?;
    Ok(Replay { session, recorder })
}

async fn replay<R>(stream: String, reader: R, settings: Arc<Settings>, prefix: bool) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut active: Option<Replay> = None;
    let mut line_no = 0usize;

    while let Some(line) = lines
        .next_line()
        .await
        .with_context(|| format!("reading {stream}"))?
    {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let message: Message = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(e) => {
                warn!(line = line_no, error = %e, "skipping malformed line");
                continue;
            }
        };

        let frame = match message {
            Message::Select { exercise } => {
                if active.is_some() {
                    warn!(line = line_no, %exercise, "exercise is fixed for the session; ignoring");
                } else {
                    active = Some(open_session(&settings, &stream, Some(&exercise))?);
                }
                continue;
            }
            Message::Frame(frame) => frame,
        };

        if active.is_none() {
            active = Some(open_session(&settings, &stream, None)?);
        }
        let Some(current) = active.as_mut() else {
            continue;
        };

        let event = current.session.process(&frame);
        let json = serde_json::to_string(&event)?;
        if prefix {
            println!("{stream}\t{json}");
        } else {
            println!("{json}");
        }
        if let Some(recorder) = current.recorder.as_mut() {
            recorder.add_frame(frame.timestamp, event);
        }
    }

    let Some(finished) = active else {
        warn!("stream contained no frames");
        return Ok(());
    };
    finished.session.finish();
    if let Some(recorder) = &finished.recorder {
        let dir = recorder.export()?;
        info!(path = %dir.display(), "session exported");
    }
    Ok(())
}

fn stream_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine readable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Some(
            ExerciseConfig::from_json_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
        ),
        None => None,
    };
    let settings = Arc::new(Settings {
        exercise: args.exercise,
        config,
        export: args.export,
    });

    if args.inputs.is_empty() {
        let stdin = BufReader::new(tokio::io::stdin());
        return replay("stdin".to_string(), stdin, settings, false)
            .instrument(info_span!("stream", name = "stdin"))
            .await;
    }

    let prefix = args.inputs.len() > 1;
    let mut tasks = Vec::with_capacity(args.inputs.len());
    for path in args.inputs {
        let settings = Arc::clone(&settings);
        let name = stream_name(&path);
        let span = info_span!("stream", name = %name);
        tasks.push(tokio::spawn(
            async move {
                let file = tokio::fs::File::open(&path)
                    .await
                    .with_context(|| format!("opening {}", path.display()))?;
                replay(name, BufReader::new(file), settings, prefix).await
            }
            .instrument(span),
        ));
    }

    let mut failed = 0;
    for task in tasks {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("{:#}", e);
                failed += 1;
            }
            Err(e) => {
                error!("replay task panicked: {}", e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} stream(s) failed");
    }
    Ok(())
}
