use super::config::PhaseConfig;
use crate::error::PhaseError;
use std::time::Duration;

/// Maps elapsed session time to the active phase
#[derive(Debug, Clone)]
pub struct PhaseScheduler {
    phases: Vec<PhaseConfig>,
}

impl PhaseScheduler {
    /// Build a scheduler from a phase plan.
    ///
    /// Phases are ordered by start time and must tile the timeline from 0
    /// without gaps or overlaps. The last phase stays active past its end.
    pub fn new(mut phases: Vec<PhaseConfig>) -> Result<Self, PhaseError> {
        if phases.is_empty() {
            return Err(PhaseError::Empty);
        }

        phases.sort_by(|a, b| a.start_secs.total_cmp(&b.start_secs));

        if phases[0].start_secs != 0.0 {
            return Err(PhaseError::FirstStartNotZero(phases[0].start_secs));
        }

        let mut previous_end: Option<f64> = None;
        for (id, phase) in phases.iter_mut().enumerate() {
            if phase.end_secs.is_nan() || phase.end_secs <= phase.start_secs {
                return Err(PhaseError::EmptyWindow {
                    name: phase.name.clone(),
                    start: phase.start_secs,
                    end: phase.end_secs,
                });
            }
            if let Some(previous_end) = previous_end {
                if phase.start_secs != previous_end {
                    return Err(PhaseError::NotContiguous {
                        name: phase.name.clone(),
                        start: phase.start_secs,
                        previous_end,
                    });
                }
            }
            previous_end = Some(phase.end_secs);
            phase.id = id;
        }

        Ok(Self { phases })
    }

    pub fn phases(&self) -> &[PhaseConfig] {
        &self.phases
    }

    /// Active phase at `elapsed`; first match wins, the last phase never expires
    pub fn current_phase(&self, elapsed: Duration) -> &PhaseConfig {
        let secs = elapsed.as_secs_f64();
        self.phases
            .iter()
            .find(|phase| phase.contains(secs))
            .unwrap_or_else(|| &self.phases[self.phases.len() - 1])
    }

    /// Time left in the active phase. `Duration::ZERO` means ended, an
    /// open-ended phase (`end_secs = inf`) reports `Duration::MAX`.
    pub fn remaining_time(&self, elapsed: Duration) -> Duration {
        let phase = self.current_phase(elapsed);
        let remaining = phase.end_secs - elapsed.as_secs_f64();
        if remaining <= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(remaining).unwrap_or(Duration::MAX)
        }
    }

    pub fn is_requiring_summary(&self, elapsed: Duration) -> bool {
        self.current_phase(elapsed).require_summary
    }
}

/// Fires once, at the first check where the active phase requires a summary
#[derive(Debug, Clone, Default)]
pub struct SummaryTrigger {
    fired: bool,
}

impl SummaryTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, scheduler: &PhaseScheduler, elapsed: Duration) -> bool {
        if self.fired || !scheduler.is_requiring_summary(elapsed) {
            return false;
        }
        self.fired = true;
        true
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }
}
