// Terminal rendering of monitor state

use autobuild_lib::models::{Artifact, ArtifactOutcome, RunTone, WorkflowRun};
use autobuild_lib::services::MonitorState;
use autobuild_lib::utils::format_megabytes;

fn tone_marker(tone: RunTone) -> &'static str {
    match tone {
        RunTone::Success => "[ok]",
        RunTone::Failure => "[x]",
        RunTone::Running => "[..]",
        RunTone::Pending => "[ ]",
    }
}

/// Status block for one run
pub fn render_run(run: &WorkflowRun) -> String {
    format!(
        "{} {}\n    Run #{} - {}\n    {}",
        tone_marker(run.tone()),
        run.display_label(),
        run.run_number,
        run.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        run.html_url
    )
}

fn render_artifact(artifact: &Artifact) -> String {
    let expires = artifact
        .expires_at
        .map(|at| at.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "never".to_string());
    format!(
        "  - {} ({} - Expires {}) [id {}]",
        artifact.name,
        format_megabytes(artifact.size_in_bytes),
        expires,
        artifact.id
    )
}

/// Artifact section on its own, used by `autobuild artifacts`
pub fn render_artifacts(outcome: &ArtifactOutcome) -> String {
    match outcome {
        ArtifactOutcome::Produced(list) => {
            let mut lines = vec![format!("Generated artifacts ({}):", list.len())];
            lines.extend(list.iter().map(render_artifact));
            lines.join("\n")
        }
        ArtifactOutcome::Empty => "No artifacts were generated".to_string(),
        ArtifactOutcome::Unavailable(message) => format!("Failed to load artifacts: {}", message),
    }
}

/// Summary of a completed run plus its artifacts
pub fn render_results(run: &WorkflowRun, artifacts: &ArtifactOutcome) -> String {
    let succeeded = run.tone() == RunTone::Success;
    let headline = if succeeded {
        "Execution Completed Successfully"
    } else {
        "Execution Failed"
    };
    let conclusion = run.conclusion.map(|c| c.as_str()).unwrap_or("unknown");
    let count = match artifacts {
        ArtifactOutcome::Produced(list) => list.len().to_string(),
        ArtifactOutcome::Empty => "0".to_string(),
        ArtifactOutcome::Unavailable(_) => "?".to_string(),
    };

    format!(
        "{}\n  Status: {}\n  Duration: {} min\n  Artifacts: {}\n  Full log: {}\n{}",
        headline,
        conclusion,
        run.duration_minutes(),
        count,
        run.html_url,
        render_artifacts(artifacts)
    )
}

/// One rendering for every monitor state
pub fn render_state(state: &MonitorState) -> String {
    match state {
        MonitorState::Idle => "Idle".to_string(),
        MonitorState::Dispatched { release_tag } => {
            format!("Workflow triggered for {}, waiting for the run...", release_tag)
        }
        MonitorState::Located { run } | MonitorState::Polling { run } => render_run(run),
        MonitorState::Completed { run, artifacts } => {
            format!("{}\n\n{}", render_run(run), render_results(run, artifacts))
        }
        MonitorState::Errored { message } => format!("Error: {}", message),
    }
}
