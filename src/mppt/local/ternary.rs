use crate::mppt::Observation;
use crate::mppt::local::golden::CONVERGED_WIDTH;
use crate::mppt::local::{LocalAlgorithm, LocalCore, LocalKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Emit the one-third point.
    Start,
    /// Measure the one-third point, emit the two-thirds point.
    MeasureLeft,
    /// Measure the two-thirds point and cut a third of the bracket.
    MeasureRight,
    Converged,
}

/// Ternary search: two fresh samples per step, a third of the bracket
/// discarded per step.
#[derive(Debug, Clone)]
pub struct Ternary {
    core: LocalCore,
    phase: Phase,
    left_point: f64,
    right_point: f64,
    left_power: f64,
}

impl Ternary {
    pub fn new(core: LocalCore) -> Self {
        Self {
            core,
            phase: Phase::Start,
            left_point: 0.0,
            right_point: 0.0,
            left_power: 0.0,
        }
    }

    fn emit_left(&mut self) -> f64 {
        let b = self.core.bracket;
        self.left_point = b.left + b.width() / 3.0;
        self.phase = Phase::MeasureLeft;
        self.left_point
    }
}

impl LocalAlgorithm for Ternary {
    fn kind(&self) -> LocalKind {
        LocalKind::Ternary
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
            Phase::Start => self.emit_left(),
            Phase::MeasureLeft => {
                self.left_power = power;
                let b = self.core.bracket;
                self.right_point = b.right - b.width() / 3.0;
                self.phase = Phase::MeasureRight;
                self.right_point
            }
            Phase::MeasureRight => {
                if power < self.left_power {
                    self.core.bracket.right = self.right_point;
                } else {
                    self.core.bracket.left = self.left_point;
                }
                if self.core.bracket.width() <= CONVERGED_WIDTH {
                    self.phase = Phase::Converged;
                    self.core.bracket.midpoint()
                } else {
                    self.emit_left()
                }
            }
            Phase::Converged => self.core.bracket.midpoint(),
        };
        self.core.history.record(obs);
        vref
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mppt::Bracket;
    use crate::mppt::local::test_support::{drive, tail_deviation};
    use crate::mppt::stride::StrideKind;

    fn ternary() -> Ternary {
        Ternary::new(LocalCore::new(1, StrideKind::Fixed))
    }

    #[test]
    fn worse_right_point_drops_right_third() {
        let mut alg = ternary();
        alg.seed(0.5, Bracket::new(0.0, 0.9));
        let a = alg.reference_voltage(&Observation::default());
        assert!((a - 0.3).abs() < 1e-12);
        let b = alg.reference_voltage(&Observation::new(0.3, 5.0, 1000.0, 25.0));
        assert!((b - 0.6).abs() < 1e-12);
        alg.reference_voltage(&Observation::new(0.6, 1.0, 1000.0, 25.0));
        assert!((alg.bracket().right - 0.6).abs() < 1e-12);
        assert_eq!(alg.bracket().left, 0.0);
    }

    #[test]
    fn converges_on_ideal_cell() {
        let mut alg = ternary();
        let refs = drive(&mut alg, 40);
        assert!(tail_deviation(&refs, 10) < 0.005);
    }
}
