//! Staged concurrency profile.

use std::time::Duration;

/// How concurrency moves to a stage's target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPolicy {
    /// Concurrency jumps to the target the instant the stage starts.
    Step,

    /// Concurrency interpolates linearly from the previous stage's target
    /// to this stage's target over the stage duration.
    Linear,
}

/// One time-boxed segment of the run with a target concurrency level.
#[derive(Debug, Clone, Copy)]
pub struct Stage {
    /// How long the stage lasts.
    pub duration: Duration,

    /// Number of simulated clients to trend toward.
    pub target: u32,

    /// Transition policy, chosen per stage.
    pub policy: TransitionPolicy,
}

impl Stage {
    /// Convenience constructor for a step stage.
    #[must_use]
    pub fn step(duration: Duration, target: u32) -> Self {
        Self {
            duration,
            target,
            policy: TransitionPolicy::Step,
        }
    }

    /// Convenience constructor for a linear-ramp stage.
    #[must_use]
    pub fn linear(duration: Duration, target: u32) -> Self {
        Self {
            duration,
            target,
            policy: TransitionPolicy::Linear,
        }
    }
}

/// An ordered sequence of stages forming the ramp timeline.
#[derive(Debug, Clone)]
pub struct RampPlan {
    stages: Vec<Stage>,
}

impl RampPlan {
    /// Builds a plan from an ordered stage list.
    #[must_use]
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// The classic load-test shape: linear ramp up, hold, linear ramp down.
    #[must_use]
    pub fn ramp_hold_ramp(ramp: Duration, hold: Duration, peak: u32) -> Self {
        Self::new(vec![
            Stage::linear(ramp, peak),
            Stage::step(hold, peak),
            Stage::linear(ramp, 0),
        ])
    }

    /// The stages in order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Total wall-clock length of the plan.
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    /// Index of the stage containing `elapsed`, or `None` past the end.
    #[must_use]
    pub fn stage_index_at(&self, elapsed: Duration) -> Option<usize> {
        let mut offset = Duration::ZERO;
        for (i, stage) in self.stages.iter().enumerate() {
            offset += stage.duration;
            if elapsed < offset {
                return Some(i);
            }
        }
        None
    }

    /// Target concurrency at a given offset from the start of the run.
    ///
    /// Past the end of the timeline this returns the final stage's target,
    /// so a scheduler polling slightly after the deadline sees a stable
    /// value.
    #[must_use]
    pub fn concurrency_at(&self, elapsed: Duration) -> u32 {
        let mut offset = Duration::ZERO;
        let mut previous = 0u32;

        for stage in &self.stages {
            let end = offset + stage.duration;
            if elapsed < end {
                return match stage.policy {
                    TransitionPolicy::Step => stage.target,
                    TransitionPolicy::Linear => {
                        let progress =
                            (elapsed - offset).as_secs_f64() / stage.duration.as_secs_f64();
                        let delta = (f64::from(stage.target) - f64::from(previous)) * progress;
                        (f64::from(previous) + delta) as u32
                    }
                };
            }
            offset = end;
            previous = stage.target;
        }

        self.stages.last().map(|s| s.target).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_stage_jumps_immediately() {
        let plan = RampPlan::new(vec![Stage::step(Duration::from_secs(10), 50)]);

        assert_eq!(plan.concurrency_at(Duration::from_secs(0)), 50);
        assert_eq!(plan.concurrency_at(Duration::from_secs(5)), 50);
        assert_eq!(plan.concurrency_at(Duration::from_secs(9)), 50);
    }

    #[test]
    fn test_linear_stage_interpolates() {
        let plan = RampPlan::new(vec![Stage::linear(Duration::from_secs(10), 100)]);

        assert_eq!(plan.concurrency_at(Duration::from_secs(0)), 0);
        assert_eq!(plan.concurrency_at(Duration::from_secs(5)), 50); // Midpoint
        assert_eq!(plan.concurrency_at(Duration::from_secs(10)), 100); // After end
    }

    #[test]
    fn test_linear_ramps_from_previous_target() {
        let plan = RampPlan::new(vec![
            Stage::step(Duration::from_secs(10), 100),
            Stage::linear(Duration::from_secs(10), 0),
        ]);

        assert_eq!(plan.concurrency_at(Duration::from_secs(10)), 100);
        assert_eq!(plan.concurrency_at(Duration::from_secs(15)), 50);
        assert_eq!(plan.concurrency_at(Duration::from_secs(25)), 0);
    }

    #[test]
    fn test_ramp_hold_ramp_shape() {
        let plan = RampPlan::ramp_hold_ramp(
            Duration::from_secs(5),
            Duration::from_secs(60),
            100,
        );

        assert_eq!(plan.total_duration(), Duration::from_secs(70));
        assert_eq!(plan.concurrency_at(Duration::from_secs(0)), 0);
        assert_eq!(plan.concurrency_at(Duration::from_secs(5)), 100); // Hold starts
        assert_eq!(plan.concurrency_at(Duration::from_secs(35)), 100);
        // Midway through the ramp down: 100 -> 0 over 5s.
        assert_eq!(plan.concurrency_at(Duration::from_millis(67_500)), 50);
    }

    #[test]
    fn test_stage_index_at() {
        let plan = RampPlan::ramp_hold_ramp(
            Duration::from_secs(5),
            Duration::from_secs(60),
            100,
        );

        assert_eq!(plan.stage_index_at(Duration::from_secs(0)), Some(0));
        assert_eq!(plan.stage_index_at(Duration::from_secs(30)), Some(1));
        assert_eq!(plan.stage_index_at(Duration::from_secs(69)), Some(2));
        assert_eq!(plan.stage_index_at(Duration::from_secs(70)), None);
    }

    #[test]
    fn test_empty_plan_is_idle() {
        let plan = RampPlan::new(Vec::new());
        assert_eq!(plan.total_duration(), Duration::ZERO);
        assert_eq!(plan.concurrency_at(Duration::from_secs(1)), 0);
    }
}
