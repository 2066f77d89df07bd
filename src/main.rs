use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use arx_bridge::engine::{SimulatedEngine, event_channel};
use arx_bridge::io::PoseLog;
use arx_bridge::system::ArSession;
use arx_bridge::viz::RerunVisualizer;

/// Replay a recorded pose log through an AR scene.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scene description (YAML).
    scene: PathBuf,

    /// Recorded poses (CSV: frame,tag,visible,m0..m15).
    poses: PathBuf,

    /// Replay rate in frames per second.
    #[arg(long, default_value_t = 30.0, value_parser = parse_fps)]
    fps: f64,

    /// Frames before the engine reports initialized.
    #[arg(long, default_value_t = 0)]
    init_delay: u64,

    /// Write a recording instead of spawning a viewer.
    #[arg(long)]
    save: Option<PathBuf>,

    /// Run without visualization.
    #[arg(long)]
    no_viz: bool,
}

fn parse_fps(s: &str) -> Result<f64, String> {
    let fps: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if fps > 0.0 && fps.is_finite() {
        Ok(fps)
    } else {
        Err(format!("must be positive, got {}", fps))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let log = PoseLog::load(&args.poses)?;
    info!("Loaded {} frames of poses from {}", log.frame_count(), args.poses.display());

    // The engine comes up after `init_delay` frames, like a camera that is
    // still opening when the scene starts.
    let engine = Arc::new(SimulatedEngine::new());
    let (tx, rx) = event_channel();
    engine.subscribe(tx);
    let mut session = ArSession::from_file(&args.scene, engine.clone(), rx)?;

    let mut viz = if !args.no_viz {
        Some(RerunVisualizer::new("arx-replay", args.save.as_deref())?)
    } else {
        None
    };

    for frame in 0..log.frame_count() {
        let now = frame as f64 / args.fps;
        if frame == args.init_delay {
            info!("Engine initialized at frame {}", frame);
            engine.set_initialized(true);
        }

        let registry = session.registry();
        log.apply(frame, &engine, |tag| registry.by_tag(tag).map(|t| t.id()));

        let report = session.process_frame(now);
        let status = session.status();

        if let Some(viz) = viz.as_mut() {
            viz.set_time(report.frame, now);
            viz.log_plots(&status);
            viz.log_status_bar(&status, &report);
            viz.log_trackables(session.registry());
            viz.log_cameras(session.cameras().iter().map(|(_, node)| node));
            viz.log_objects(session.objects().iter().map(|(_, node)| node));
            viz.log_viewports(session.display(), &report.viewports);
        }
    }

    let status = session.status();
    info!(
        "Done: {} loaded, {} pending, {} load errors",
        status.loaded, status.pending, status.load_errors
    );
    session.shutdown();
    engine.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["arx-replay", "scene.yaml", "poses.csv"]).unwrap();
        assert_eq!(args.scene, PathBuf::from("scene.yaml"));
        assert_eq!(args.poses, PathBuf::from("poses.csv"));
        assert_eq!(args.fps, 30.0);
        assert_eq!(args.init_delay, 0);
        assert!(args.save.is_none());
        assert!(!args.no_viz);
    }

    #[test]
    fn test_args_flags() {
        let args = Args::try_parse_from([
            "arx-replay", "s.yaml", "p.csv", "--fps", "60", "--init-delay", "5", "--save",
            "out.rrd", "--no-viz",
        ])
        .unwrap();
        assert_eq!(args.fps, 60.0);
        assert_eq!(args.init_delay, 5);
        assert_eq!(args.save, Some(PathBuf::from("out.rrd")));
        assert!(args.no_viz);
    }

    #[test]
    fn test_args_reject_bad_input() {
        assert!(Args::try_parse_from(["arx-replay", "s.yaml"]).is_err());
        assert!(Args::try_parse_from(["arx-replay", "s.yaml", "p.csv", "--fps", "0"]).is_err());
        assert!(Args::try_parse_from(["arx-replay", "s.yaml", "p.csv", "--fps", "-3"]).is_err());
    }
}
