use crate::mppt::Observation;
use crate::mppt::local::{LocalAlgorithm, LocalCore, LocalKind};

/// |dP/dV| at or below this is treated as the MPP.
const FLAT_SLOPE: f64 = 0.01;
/// Distance of the slope sample above the midpoint (V).
const SLOPE_OFFSET: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    /// Emit the bracket midpoint.
    Midpoint,
    /// Record the midpoint sample and emit a point just above it.
    Offset,
    /// Take dP/dV between the two samples, halve the bracket and emit the
    /// new midpoint.
    Slope,
    /// Converged; keep emitting this voltage.
    Hold(f64),
}

/// Bisection on the sign of dP/dV.
///
/// Every step spends two cycles: the first at the bracket midpoint, the
/// second just above it. The slope between those consecutive samples decides
/// which half holds the peak, and the next midpoint goes out on the same
/// cycle. Once the slope is flat or the bracket is narrower than two slope
/// offsets, the algorithm holds the last midpoint.
#[derive(Debug, Clone)]
pub struct Bisection {
    core: LocalCore,
    phase: Phase,
}

impl Bisection {
    pub fn new(core: LocalCore) -> Self {
        Self {
            core,
            phase: Phase::Midpoint,
        }
    }

    fn midpoint(&mut self) -> f64 {
        self.phase = Phase::Offset;
        self.core.bracket.midpoint()
    }
}

impl LocalAlgorithm for Bisection {
    fn kind(&self) -> LocalKind {
        LocalKind::Bisection
    }

    fn core(&self) -> &LocalCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LocalCore {
        &mut self.core
    }

    fn restart(&mut self) {
        self.phase = Phase::Midpoint;
    }

    fn reference_voltage(&mut self, obs: &Observation) -> f64 {
        match self.phase {
            Phase::Midpoint => self.midpoint(),
            Phase::Offset => {
                self.core.history.record(obs);
                self.phase = Phase::Slope;
                (obs.voltage + SLOPE_OFFSET).min(self.core.bracket.right)
            }
            Phase::Slope => {
                let mid = self.core.history.v_old;
                let dv = obs.voltage - mid;
                let slope = if dv == 0.0 {
                    0.0
                } else {
                    (obs.power() - self.core.history.p_old) / dv
                };
                if slope.abs() <= FLAT_SLOPE || self.core.bracket.width() <= 2.0 * SLOPE_OFFSET {
                    self.phase = Phase::Hold(mid);
                    return mid;
                }
                if slope > 0.0 {
                    self.core.bracket.left = mid;
                } else {
                    self.core.bracket.right = mid;
                }
                self.midpoint()
            }
            Phase::Hold(v) => v,
        }
    }
}
