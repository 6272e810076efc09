use crate::mppt::global::{ChangeDetector, Delegate, GlobalAlgorithm, GlobalKind, Trigger};
use crate::mppt::local::LocalAlgorithm;
use crate::mppt::{Bracket, Observation};

/// Voltage step between trapezium edges (V).
pub const DV: f64 = 0.05;
/// Relative move of the running irradiance average that restarts the scan.
const IRRADIANCE_SHIFT: f64 = 0.1;

/// Largest trapezium seen so far.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    area: f64,
    left: f64,
    right: f64,
    /// Edge of the trapezium with the higher power.
    voltage: f64,
}

/// Trapezium-area scan.
///
/// Steps across `[0, MAX_V]` in [`DV`] increments and integrates power with
/// the trapezoidal rule between consecutive samples. The slice with the
/// largest area straddles the highest peak; its taller edge seeds the local
/// algorithm, bracketed by one step either side of the slice.
#[derive(Debug)]
pub struct Trapezium {
    max_v: f64,
    delegate: Delegate,
    scanning: bool,
    last: Option<(f64, f64)>,
    best: Option<Candidate>,
    detector: ChangeDetector,
}

impl Trapezium {
    pub fn new(max_v: f64, local: Box<dyn LocalAlgorithm>) -> Self {
        Self {
            max_v,
            delegate: Delegate::new(local, max_v),
            scanning: true,
            last: None,
            best: None,
            detector: ChangeDetector::new(Trigger::Shift(IRRADIANCE_SHIFT)),
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    /// Voltage of the current global candidate, if the scan has produced one.
    pub fn candidate(&self) -> Option<f64> {
        self.best.map(|c| c.voltage)
    }

    fn integrate(&mut self, voltage: f64, power: f64) {
        if let Some((v_old, p_old)) = self.last {
            let area = DV * 0.5 * (power + p_old);
            if self.best.is_none_or(|b| area > b.area) {
                self.best = Some(Candidate {
                    area,
                    left: v_old,
                    right: voltage,
                    voltage: if power >= p_old { voltage } else { v_old },
                });
            }
        }
        self.last = Some((voltage, power));
    }

    fn finish(&mut self, obs: &Observation) -> f64 {
        self.scanning = false;
        self.detector.arm();
        let (vmpp, bracket) = match self.best {
            Some(c) => (
                c.voltage,
                Bracket::new((c.left - DV).max(0.0), (c.right + DV).min(self.max_v)),
            ),
            None => (obs.voltage, Bracket::new(0.0, self.max_v)),
        };
        self.delegate.begin(vmpp, bracket)
    }

    fn restart(&mut self) -> f64 {
        self.scanning = true;
        self.last = None;
        self.best = None;
        self.detector.arm();
        self.delegate.reset(self.max_v);
        0.0
    }
}

impl GlobalAlgorithm for Trapezium {
    fn kind(&self) -> GlobalKind {
        GlobalKind::Trapezium
    }

    fn reference_voltage(&mut self, obs: &Observation) -> f64 {
        if !self.scanning {
            if self.detector.push(obs.irradiance) {
                tracing::info!(irradiance = obs.irradiance, "irradiance shifted, restarting trapezium scan");
                return self.restart();
            }
            return self.delegate.step(obs);
        }
        self.integrate(obs.voltage, obs.power());
        let next = obs.voltage + DV;
        if next > self.max_v + 1e-9 {
            return self.finish(obs);
        }
        next
    }

    fn reset(&mut self) {
        self.restart();
    }

    fn local(&self) -> &dyn LocalAlgorithm {
        self.delegate.local()
    }
}
