// ABOUTME: Diagnostics accumulator for non-fatal problems during a release batch.
// ABOUTME: Skipped, abandoned and failed services are warnings, not batch errors.

/// Collects non-fatal warnings during a release batch.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn count(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }
}

#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// A service could not be planned and was left out of the batch.
    pub fn plan_skipped(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::PlanSkipped,
            message: message.into(),
        }
    }

    /// A selected plan was dropped at lock time.
    pub fn plan_abandoned(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::PlanAbandoned,
            message: message.into(),
        }
    }

    /// A workflow failed and the service was rolled back.
    pub fn release_failed(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::ReleaseFailed,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    PlanSkipped,
    PlanAbandoned,
    ReleaseFailed,
}
