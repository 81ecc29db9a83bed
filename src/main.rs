//! zestbay-canvas - replay a graph snapshot and print the resulting scene
//!
//! Usage: zestbay-canvas <snapshot.json> [scene.json] [--arrange chain|facing|manual]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use zestbay_canvas::arrange::ArrangeMode;
use zestbay_canvas::scene::{GraphSnapshot, SceneDocument};
use zestbay_canvas::server::{CommandSink, EventInbox};
use zestbay_canvas::{EditError, ManualTimer, SceneError, Session, Settings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Arrangement {
    Chain,
    Facing,
    Manual,
}

impl From<Arrangement> for ArrangeMode {
    fn from(a: Arrangement) -> Self {
        match a {
            Arrangement::Chain => ArrangeMode::SignalChain,
            Arrangement::Facing => ArrangeMode::FacingColumns,
            Arrangement::Manual => ArrangeMode::Manual,
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Graph snapshot to replay
    snapshot: PathBuf,
    /// Scene to load before replaying
    scene: Option<PathBuf>,
    /// Arrange the active view once the graph is in
    #[arg(long, value_enum)]
    arrange: Option<Arrangement>,
}

fn run(args: Args) -> Result<String, SceneError> {
    let settings = Settings::load();
    let timer = ManualTimer::new();
    let mut session = Session::new(settings, CommandSink::disconnected(), Box::new(timer.clone()));

    if let Some(path) = &args.scene {
        let doc = SceneDocument::from_json(&std::fs::read_to_string(path)?)?;
        session.load_scene(&doc)?;
    }

    let snapshot = GraphSnapshot::from_json(&std::fs::read_to_string(&args.snapshot)?)?;
    log::info!(
        "Replaying {} groups, {} ports, {} connections",
        snapshot.groups.len(),
        snapshot.port_count(),
        snapshot.connections.len()
    );

    let inbox = EventInbox::new();
    for event in snapshot.replay() {
        inbox.push(event);
    }
    let diff = session.process_inbox(&inbox);
    if !diff.warnings.is_empty() {
        log::warn!("{} snapshot events were dropped", diff.warnings.len());
    }
    for token in timer.take_pending() {
        session.on_grace_expired(token);
    }

    if let Some(mode) = args.arrange {
        match session.arrange_view(mode.into()) {
            Ok(label) => log::info!("{}", label),
            Err(EditError::NoChange) => log::info!("Arrangement unchanged"),
            Err(e) => log::warn!("Cannot arrange: {}", e),
        }
    }

    session.scene().to_json_pretty()
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
