// ABOUTME: Deploy and promote command implementations.
// ABOUTME: Picks the presenter, runs the orchestrator and prints the batch report.

use std::io;

use shipwright::config::Config;
use shipwright::error::{Error, Result};
use shipwright::model::{ReleaseKind, ServiceDefinition};
use shipwright::orchestrator::BatchReport;
use shipwright::output::Output;
use shipwright::release::{AutoApprove, ConsolePresenter, PlanPresenter};
use shipwright::types::EnvironmentName;

use super::backend::orchestrator;

pub async fn deploy(
    config: &Config,
    definitions: &[ServiceDefinition],
    environment: &EnvironmentName,
    yes: bool,
    verbose: bool,
    output: &mut Output,
) -> Result<()> {
    output.start_timer();
    output.progress(&format!(
        "Planning {} service(s) for {}",
        definitions.len(),
        environment
    ));

    let orchestrator = orchestrator(config);
    let mut presenter = presenter(yes);
    let report = orchestrator
        .deploy(definitions, environment, presenter.as_mut())
        .await?;
    finish(ReleaseKind::Deploy, &report, verbose, output)
}

pub async fn promote(
    config: &Config,
    definitions: &[ServiceDefinition],
    from: &EnvironmentName,
    to: &EnvironmentName,
    yes: bool,
    verbose: bool,
    output: &mut Output,
) -> Result<()> {
    output.start_timer();
    output.progress(&format!(
        "Planning {} service(s) from {} to {}",
        definitions.len(),
        from,
        to
    ));

    let orchestrator = orchestrator(config);
    let mut presenter = presenter(yes);
    let report = orchestrator
        .promote(definitions, from, to, presenter.as_mut())
        .await?;
    finish(ReleaseKind::Promote, &report, verbose, output)
}

fn presenter(yes: bool) -> Box<dyn PlanPresenter> {
    if yes {
        Box::new(AutoApprove)
    } else {
        Box::new(ConsolePresenter::new(io::stdin().lock(), io::stdout()))
    }
}

fn finish(kind: ReleaseKind, report: &BatchReport, verbose: bool, output: &Output) -> Result<()> {
    for warning in report.diagnostics.warnings() {
        output.warning(warning);
    }

    let summary = &report.summary;
    if summary.is_empty() {
        let message = if report.unselected > 0 {
            "No services selected. Exiting."
        } else {
            "No services to release. Exiting."
        };
        output.success(message);
        return Ok(());
    }

    if verbose {
        dump_logs(kind, report, output);
    }
    for outcome in &summary.outcomes {
        output.outcome(outcome);
    }
    if summary.success_count() > 0 {
        output.success(&format!(
            "Successfully {} {} services",
            past_tense(kind),
            summary.success_count()
        ));
    }
    if !report.is_success() {
        output.failure(&format!(
            "Failed to {} {} services",
            kind.verb(),
            summary.failure_count()
        ));
        return Err(Error::ReleaseFailed {
            kind,
            failed: summary.failure_count(),
        });
    }
    Ok(())
}

fn dump_logs(kind: ReleaseKind, report: &BatchReport, output: &Output) {
    for outcome in &report.summary.outcomes {
        let Some(path) = &outcome.log_file else {
            continue;
        };
        let title = format!(
            "{} {} logs",
            capitalize(kind.verb()),
            outcome.service_ref
        );
        match std::fs::read_to_string(path) {
            Ok(contents) => output.log_dump(&title, &contents),
            Err(e) => tracing::warn!("cannot read {}: {}", path.display(), e),
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn past_tense(kind: ReleaseKind) -> &'static str {
    match kind {
        ReleaseKind::Deploy => "deployed",
        ReleaseKind::Promote => "promoted",
    }
}
