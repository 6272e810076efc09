use crate::mppt::Observation;
use crate::mppt::local::{LocalAlgorithm, LocalCore, LocalKind};

/// Golden ratio conjugate used to place the interior points.
const PHI: f64 = 0.618;
/// Bracket width at which the search stops and holds the midpoint (V).
pub(crate) const CONVERGED_WIDTH: f64 = 0.005;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Emit the left interior point.
    Start,
    /// Measure the left point, emit the right one.
    SecondPoint,
    /// Measure a freshly emitted right point.
    MeasureRight,
    /// Measure a freshly emitted left point.
    MeasureLeft,
    Converged,
}

/// Golden-section search over the bracket.
///
/// After the two opening samples, each cycle reuses one interior point and
/// measures one new point, shrinking the bracket by `PHI` per cycle.
#[derive(Debug, Clone)]
pub struct Golden {
    core: LocalCore,
    phase: Phase,
    left_point: f64,
    right_point: f64,
    left_power: f64,
    right_power: f64,
}

impl Golden {
    pub fn new(core: LocalCore) -> Self {
        Self {
            core,
            phase: Phase::Start,
            left_point: 0.0,
            right_point: 0.0,
            left_power: 0.0,
            right_power: 0.0,
        }
    }

    fn inner_left(&self) -> f64 {
        let b = self.core.bracket;
        b.right - b.width() * PHI
    }

    fn inner_right(&self) -> f64 {
        let b = self.core.bracket;
        b.left + b.width() * PHI
    }

    /// Discards the worse end of the bracket and emits the next point.
    fn shrink(&mut self) -> f64 {
        if self.core.bracket.width() <= CONVERGED_WIDTH {
            self.phase = Phase::Converged;
            return self.core.bracket.midpoint();
        }
        if self.left_power > self.right_power {
            self.core.bracket.right = self.right_point;
            self.right_point = self.left_point;
            self.right_power = self.left_power;
            self.left_point = self.inner_left();
            self.phase = Phase::MeasureLeft;
            self.left_point
        } else {
            self.core.bracket.left = self.left_point;
            self.left_point = self.right_point;
            self.left_power = self.right_power;
            self.right_point = self.inner_right();
            self.phase = Phase::MeasureRight;
            self.right_point
        }
    }
}

impl LocalAlgorithm for Golden {
    fn kind(&self) -> LocalKind {
        LocalKind::Golden
    }

    fn core(&self) -> &LocalCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LocalCore {
        &mut self.core
    }

    fn restart(&mut self) {
        self.phase = Phase::Start;
    }

    fn reference_voltage(&mut self, obs: &Observation) -> f64 {
        let power = obs.power();
        let vref = match self.phase {
            Phase::Start => {
                self.left_point = self.inner_left();
                self.right_point = self.inner_right();
                self.phase = Phase::SecondPoint;
                self.left_point
            }
            Phase::SecondPoint => {
                self.left_power = power;
                self.phase = Phase::MeasureRight;
                self.right_point
            }
            Phase::MeasureRight => {
                self.right_power = power;
                self.shrink()
            }
            Phase::MeasureLeft => {
                self.left_power = power;
                self.shrink()
            }
            Phase::Converged => self.core.bracket.midpoint(),
        };
        self.core.history.record(obs);
        vref
    }
}
