use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use atelier_core::app::{IterationOutcome, IterationSummary, OrchestratorBuilder, load_config};
use atelier_core::impls::{ConvergingPerception, InMemoryCanvas};

mod logging;

/// Run the drawing loop against an in-memory canvas and a simulated critic.
#[derive(Debug, Parser)]
#[command(name = "atelier", version)]
struct Args {
    /// TOML config; defaults apply when the file is missing
    #[arg(long, default_value = "atelier.toml")]
    config: PathBuf,

    #[arg(long, default_value = "figure study")]
    goal: String,

    /// Upper bound on iterations for this run
    #[arg(long, default_value_t = 50)]
    iterations: u64,

    /// Score gained per drawn stroke by the simulated critic
    #[arg(long, default_value_t = 0.12)]
    step: f64,

    /// Write the full workflow export (JSON) here
    #[arg(long)]
    export: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let args = Args::parse();

    // (A) 設定を読み込んで Orchestrator を組み立てる
    let config = load_config(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let mut orchestrator = OrchestratorBuilder::new(config)
        .canvas(InMemoryCanvas::new())
        .perception(ConvergingPerception::new(args.step))
        .build()?;
    orchestrator.set_goal(&args.goal);

    // (B) 停止理由が出るか上限に達するまで 1 イテレーションずつ回す
    for _ in 0..args.iterations {
        let summary = orchestrator.run_iteration().await?;
        println!("{}", describe(&summary));
        if summary.stop_reason().is_some() {
            break;
        }
    }

    // (C) 統計を表示し、必要ならエクスポートを書き出す
    let stats = orchestrator.statistics();
    println!(
        "phase={} iterations={} strokes={} checkpoints={} tasks={:?}",
        stats.phase, stats.iterations, stats.strokes, stats.checkpoints, stats.tasks
    );
    println!("{}", serde_json::to_string_pretty(&stats.phases)?);

    if let Some(path) = &args.export {
        let json = orchestrator.export_workflow().to_json_pretty()?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "workflow exported");
    }
    Ok(())
}

/// One line per iteration for the console.
fn describe(summary: &IterationSummary) -> String {
    match &summary.outcome {
        IterationOutcome::TaskAttempted {
            task_kind,
            attempt,
            result,
            disposition,
            ..
        } => format!(
            "#{:<3} {:<12} {:<20} attempt={} result={} -> {:?}",
            summary.iteration,
            summary.phase,
            task_kind,
            attempt,
            result.as_str(),
            disposition
        ),
        IterationOutcome::PhaseAdvanced { from, to } => {
            format!("#{:<3} phase {from} -> {to}", summary.iteration)
        }
        IterationOutcome::PhaseRegressed { from, to } => {
            format!("#{:<3} phase {from} -> {to} (regressed)", summary.iteration)
        }
        IterationOutcome::Stopped { reason } => format!("stopped: {reason:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_core::app::StopReason;
    use atelier_core::domain::DrawingPhase;

    fn summary(outcome: IterationOutcome) -> IterationSummary {
        IterationSummary {
            iteration: 7,
            phase: DrawingPhase::Sketch,
            tasks_created: 0,
            quality: Some(0.3),
            outcome,
        }
    }

    #[test]
    fn regression_reads_from_old_to_new_phase() {
        let line = describe(&summary(IterationOutcome::PhaseRegressed {
            from: DrawingPhase::Refinement,
            to: DrawingPhase::Sketch,
        }));
        assert_eq!(line, "#7   phase refinement -> sketch (regressed)");
    }

    #[test]
    fn advance_and_stop_lines() {
        let line = describe(&summary(IterationOutcome::PhaseAdvanced {
            from: DrawingPhase::Sketch,
            to: DrawingPhase::Refinement,
        }));
        assert_eq!(line, "#7   phase sketch -> refinement");

        let line = describe(&summary(IterationOutcome::Stopped {
            reason: StopReason::Exhausted,
        }));
        assert_eq!(line, "stopped: Exhausted");
    }
}
