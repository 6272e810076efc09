use serde::Serialize;

use crate::mppt::global::{ChangeDetector, Delegate, GlobalAlgorithm, GlobalKind, Trigger};
use crate::mppt::local::LocalAlgorithm;
use crate::mppt::{Bracket, Observation};

/// Voltage step of the sweep (V).
pub const SWEEP_STRIDE: f64 = 0.01;
/// Relative move of the running irradiance average that restarts the sweep.
const IRRADIANCE_SHIFT: f64 = 0.1;

/// A local power maximum met during the sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Peak {
    pub voltage: f64,
    pub power: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Sweeping,
    Tracking,
}

/// Full voltage sweep followed by local tracking of the best peak.
///
/// The sweep walks `[0, MAX_V]` in [`SWEEP_STRIDE`] steps, noting each
/// point where power turns from rising to falling (a peak) and back (a
/// trough). Each peak gets a bracket reaching toward its neighbours: the
/// trough or the midpoint between the two peaks, whichever is nearer, and
/// the curve edges at either end.
#[derive(Debug)]
pub struct VoltageSweep {
    max_v: f64,
    delegate: Delegate,
    mode: Mode,
    rising: bool,
    last: Option<(f64, f64)>,
    peaks: Vec<Peak>,
    troughs: Vec<f64>,
    detector: ChangeDetector,
}

impl VoltageSweep {
    pub fn new(max_v: f64, local: Box<dyn LocalAlgorithm>) -> Self {
        Self {
            max_v,
            delegate: Delegate::new(local, max_v),
            mode: Mode::Sweeping,
            rising: true,
            last: None,
            peaks: Vec::new(),
            troughs: Vec::new(),
            detector: ChangeDetector::new(Trigger::Shift(IRRADIANCE_SHIFT)),
        }
    }

    /// Peaks found by the last completed or running sweep, in voltage order.
    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    /// Whether the sweep has finished and the local algorithm is tracking.
    pub fn is_tracking(&self) -> bool {
        self.mode == Mode::Tracking
    }

    /// Bracket of every peak, index-aligned with [`VoltageSweep::peaks`].
    pub fn candidate_brackets(&self) -> Vec<Bracket> {
        (0..self.peaks.len()).map(|k| self.bracket_of(k)).collect()
    }

    fn bracket_of(&self, k: usize) -> Bracket {
        let peak = self.peaks[k].voltage;
        let left = match k.checked_sub(1) {
            None => 0.0,
            Some(prev) => {
                let mid = (self.peaks[prev].voltage + peak) / 2.0;
                self.troughs.get(prev).map_or(mid, |t| t.max(mid))
            }
        };
        let right = match self.peaks.get(k + 1) {
            None => self.max_v,
            Some(next) => {
                let mid = (peak + next.voltage) / 2.0;
                self.troughs.get(k).map_or(mid, |t| t.min(mid))
            }
        };
        Bracket::new(left, right)
    }

    /// Records peaks and troughs from one sweep sample.
    fn observe(&mut self, voltage: f64, power: f64) {
        if let Some((v_old, p_old)) = self.last {
            if power < p_old && self.rising {
                self.peaks.push(Peak {
                    voltage: v_old,
                    power: p_old,
                });
                self.rising = false;
            } else if power >= p_old && !self.rising {
                self.troughs.push(v_old);
                self.rising = true;
            }
        }
        self.last = Some((voltage, power));
    }

    fn finish(&mut self, obs: &Observation) -> f64 {
        if self.rising {
            self.peaks.push(Peak {
                voltage: obs.voltage,
                power: obs.power(),
            });
        }
        let best = self
            .peaks
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.power.total_cmp(&b.1.power))
            .map_or(0, |(k, _)| k);
        let bracket = self.bracket_of(best);
        let vmpp = self.peaks[best].voltage;
        tracing::info!(peaks = self.peaks.len(), best = vmpp, "voltage sweep complete");
        self.mode = Mode::Tracking;
        self.detector.arm();
        self.delegate.begin(vmpp, bracket)
    }

    fn restart(&mut self) -> f64 {
        self.mode = Mode::Sweeping;
        self.rising = true;
        self.last = None;
        self.peaks.clear();
        self.troughs.clear();
        self.detector.arm();
        self.delegate.reset(self.max_v);
        0.0
    }
}

impl GlobalAlgorithm for VoltageSweep {
    fn kind(&self) -> GlobalKind {
        GlobalKind::VoltageSweep
    }

    fn reference_voltage(&mut self, obs: &Observation) -> f64 {
        match self.mode {
            Mode::Sweeping => {
                self.observe(obs.voltage, obs.power());
                let next = obs.voltage + SWEEP_STRIDE;
                if next > self.max_v + 1e-9 {
                    self.finish(obs)
                } else {
                    next
                }
            }
            Mode::Tracking => {
                if self.detector.push(obs.irradiance) {
                    tracing::info!(irradiance = obs.irradiance, "irradiance shifted, restarting sweep");
                    return self.restart();
                }
                self.delegate.step(obs)
            }
        }
    }

    fn reset(&mut self) {
        self.restart();
    }

    fn local(&self) -> &dyn LocalAlgorithm {
        self.delegate.local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mppt::global::test_support::{drive_cell, drive_two_peak};
    use crate::mppt::local::LocalKind;
    use crate::mppt::stride::StrideKind;

    fn sweep() -> VoltageSweep {
        VoltageSweep::new(0.8, LocalKind::PandO.build(1, StrideKind::Fixed))
    }

    #[test]
    fn sweep_climbs_in_fixed_steps() {
        let mut alg = sweep();
        let refs = drive_two_peak(&mut alg, 5);
        for (k, v) in refs.iter().enumerate() {
            assert!((v - SWEEP_STRIDE * (k + 1) as f64).abs() < 1e-9);
        }
        assert!(!alg.is_tracking());
    }

    #[test]
    fn two_peak_curve_hands_off_to_higher_peak() {
        let mut alg = sweep();
        let refs = drive_two_peak(&mut alg, 120);
        assert!(alg.is_tracking());

        let peaks = alg.peaks();
        assert_eq!(peaks.len(), 2);
        assert!((peaks[0].voltage - 0.2).abs() < 0.011);
        assert!((peaks[1].voltage - 0.6).abs() < 0.011);

        let brackets = alg.candidate_brackets();
        assert!(brackets[0].contains(0.2) && !brackets[0].contains(0.6));
        assert!(brackets[1].contains(0.6) && !brackets[1].contains(0.2));
        assert_eq!(alg.bracket(), brackets[1]);

        // The sweep ends after 80 steps; everything after stays in the
        // winning bracket.
        assert!(refs[80..].iter().all(|v| brackets[1].contains(*v)));
        assert!((refs[119] - 0.6).abs() < 0.03);
    }

    #[test]
    fn irradiance_shift_restarts_the_sweep() {
        let mut alg = sweep();
        let refs = drive_cell(&mut alg, 140, |c| if c < 110 { 1000.0 } else { 600.0 });
        let restarted = refs[110..].iter().position(|v| *v == 0.0);
        assert!(restarted.is_some());
        assert!(!alg.is_tracking());
    }

    #[test]
    fn steady_irradiance_keeps_tracking() {
        let mut alg = sweep();
        let refs = drive_cell(&mut alg, 200, |_| 1000.0);
        assert!(alg.is_tracking());
        assert!((refs[199] - 0.637).abs() < 0.03);
    }
}
