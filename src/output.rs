// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use serde::Serialize;
use std::path::Path;
use std::time::Instant;

use crate::diagnostics::Warning;
use crate::model::ServiceState;
use crate::release::ReleaseOutcome;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => print_json(&JsonEvent {
                event: "success",
                message,
                duration_secs: self.duration(),
            }),
        }
    }

    /// Print the closing line of a batch that had failures.
    pub fn failure(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => print_json(&JsonEvent {
                event: "failure",
                message,
                duration_secs: self.duration(),
            }),
        }
    }

    /// Dump a captured log between markers (normal mode only).
    pub fn log_dump(&self, title: &str, contents: &str) {
        if self.mode == OutputMode::Normal {
            println!("----- {title} -----");
            println!("{}", contents.trim_end());
            println!("----- End of {title} -----");
            println!();
        }
    }

    /// Print a non-fatal warning.
    pub fn warning(&self, warning: &Warning) {
        match self.mode {
            OutputMode::Normal => eprintln!("Warning: {}", warning.message),
            OutputMode::Quiet => {}
            OutputMode::Json => print_json(&JsonEvent {
                event: "warning",
                message: &warning.message,
                duration_secs: None,
            }),
        }
    }

    /// Print one release result.
    pub fn outcome(&self, outcome: &ReleaseOutcome) {
        match self.mode {
            OutputMode::Normal => {
                let mark = if outcome.success { "✓" } else { "✗" };
                let detail = match (&outcome.state.service_url, &outcome.error) {
                    (_, Some(error)) => error.clone(),
                    (Some(url), None) => url.clone(),
                    (None, None) => outcome.state.status.to_string(),
                };
                println!("  {mark} {}: {}", outcome.service_ref, detail);
                if let Some(path) = &outcome.log_file {
                    println!("    View deployment logs at: {}", path.display());
                }
            }
            OutputMode::Quiet => {}
            OutputMode::Json => print_json(&JsonOutcome {
                event: "release",
                service: &outcome.service_ref,
                environment: outcome.environment.as_str(),
                operation: outcome.kind.verb(),
                deployment_id: outcome.deployment_id.as_str(),
                success: outcome.success,
                state: &outcome.state,
                error: outcome.error.as_deref(),
                log_file: outcome.log_file.as_deref(),
            }),
        }
    }

    /// Print persisted services as a table (or JSON lines).
    pub fn services(&self, services: &[ServiceState]) {
        match self.mode {
            OutputMode::Json => {
                for service in services {
                    print_json(service);
                }
            }
            OutputMode::Normal | OutputMode::Quiet => {
                println!(
                    "{:<20} {:<16} {:<15} {:<40} URL",
                    "SERVICE", "PRODUCT", "STATUS", "IMAGE"
                );
                for service in services {
                    println!(
                        "{:<20} {:<16} {:<15} {:<40} {}",
                        service.name,
                        service.product,
                        service.status,
                        service.image_ref.as_deref().unwrap_or("-"),
                        service.service_url.as_deref().unwrap_or("-")
                    );
                }
            }
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                    duration_secs: self.duration(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    if let Ok(json) = serde_json::to_string(value) {
        println!("{json}");
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[derive(Serialize)]
struct JsonOutcome<'a> {
    event: &'a str,
    service: &'a str,
    environment: &'a str,
    operation: &'a str,
    deployment_id: &'a str,
    success: bool,
    state: &'a ServiceState,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_file: Option<&'a Path>,
}
