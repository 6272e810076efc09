//! Global MPPT algorithms.
//!
//! A global algorithm searches the whole P-V curve, which may hold several
//! peaks under partial shading, then confines its local algorithm to a
//! bracket around the best peak found. Every voltage a global algorithm
//! returns lies inside `[0, MAX_V]` and, once tracking, inside that bracket.

mod annealing;
mod sweep;
mod swarm;
mod trapezium;

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::SimError;
use crate::mppt::local::LocalAlgorithm;
use crate::mppt::{Bracket, Observation, max_voltage};
pub use annealing::SimulatedAnnealing;
pub use sweep::VoltageSweep;
pub use swarm::ParticleSwarm;
pub use trapezium::Trapezium;

/// Step added to the best voltage on the cycle after a handoff (V).
pub const KICK: f64 = 0.02;
/// Samples in the running window of the change detector.
pub const WINDOW_LEN: usize = 10;
/// Half-width of the handoff bracket of the sampling searches, as a
/// fraction of `MAX_V`.
const HANDOFF_SPAN: f64 = 0.1;

/// Global algorithm variants selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalKind {
    /// No search; the local algorithm runs over the whole curve.
    #[default]
    Default,
    VoltageSweep,
    SimulatedAnnealing,
    ImprovedSa,
    ParticleSwarm,
    Trapezium,
}

impl GlobalKind {
    /// Accepted configuration names.
    pub const NAMES: &[&str] = &[
        "default",
        "voltage_sweep",
        "simulated_annealing",
        "improved_sa",
        "particle_swarm",
        "trapezium",
    ];

    /// Configuration name of this algorithm.
    pub fn name(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::VoltageSweep => "voltage_sweep",
            Self::SimulatedAnnealing => "simulated_annealing",
            Self::ImprovedSa => "improved_sa",
            Self::ParticleSwarm => "particle_swarm",
            Self::Trapezium => "trapezium",
        }
    }

    /// Builds a global algorithm owning `local`.
    ///
    /// # Arguments
    ///
    /// * `num_cells` - Series cells of the source
    /// * `local` - Local algorithm to hand off to
    /// * `seed` - Seed of the stochastic searches; ignored by the others
    pub fn build(
        self,
        num_cells: u32,
        local: Box<dyn LocalAlgorithm>,
        seed: u64,
    ) -> Box<dyn GlobalAlgorithm> {
        let max_v = max_voltage(num_cells);
        match self {
            Self::Default => Box::new(Passthrough::new(max_v, local)),
            Self::VoltageSweep => Box::new(VoltageSweep::new(max_v, local)),
            Self::SimulatedAnnealing => {
                Box::new(SimulatedAnnealing::classic(max_v, local, seed))
            }
            Self::ImprovedSa => Box::new(SimulatedAnnealing::improved(max_v, local, seed)),
            Self::ParticleSwarm => Box::new(ParticleSwarm::new(max_v, local, seed)),
            Self::Trapezium => Box::new(Trapezium::new(max_v, local)),
        }
    }
}

impl fmt::Display for GlobalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GlobalKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "default" => Ok(Self::Default),
            "voltage_sweep" => Ok(Self::VoltageSweep),
            "simulated_annealing" => Ok(Self::SimulatedAnnealing),
            "improved_sa" => Ok(Self::ImprovedSa),
            "particle_swarm" => Ok(Self::ParticleSwarm),
            "trapezium" => Ok(Self::Trapezium),
            _ => Err(SimError::unknown("global algorithm", s, Self::NAMES)),
        }
    }
}

/// Uniform interface of the global algorithm family.
pub trait GlobalAlgorithm: fmt::Debug + Send {
    fn kind(&self) -> GlobalKind;

    /// Consumes this cycle's sample and returns the next reference voltage.
    fn reference_voltage(&mut self, obs: &Observation) -> f64;

    /// Returns to the freshly built state, local algorithm included.
    fn reset(&mut self);

    /// The wrapped local algorithm.
    fn local(&self) -> &dyn LocalAlgorithm;

    /// Bracket the local algorithm is confined to.
    fn bracket(&self) -> Bracket {
        self.local().bracket()
    }
}

/// Bracket of half-width `HANDOFF_SPAN · max_v` around `vmpp`, inside
/// `[0, max_v]`.
pub(crate) fn span_around(vmpp: f64, max_v: f64) -> Bracket {
    let half = HANDOFF_SPAN * max_v;
    Bracket::new((vmpp - half).max(0.0), (vmpp + half).min(max_v))
}

/// Hands a search result to the local algorithm and clamps everything it
/// emits afterwards.
///
/// The first cycle after [`Delegate::begin`] measures the best point and
/// answers with a [`KICK`] above it, so the local algorithm starts from a
/// real difference rather than from its stale history.
#[derive(Debug)]
pub(crate) struct Delegate {
    local: Box<dyn LocalAlgorithm>,
    bracket: Bracket,
    primed: bool,
}

impl Delegate {
    pub(crate) fn new(local: Box<dyn LocalAlgorithm>, max_v: f64) -> Self {
        Self {
            local,
            bracket: Bracket::new(0.0, max_v),
            primed: false,
        }
    }

    pub(crate) fn local(&self) -> &dyn LocalAlgorithm {
        self.local.as_ref()
    }

    /// Seeds the local algorithm and returns the voltage to emit now.
    pub(crate) fn begin(&mut self, vmpp: f64, bracket: Bracket) -> f64 {
        tracing::info!(
            vmpp,
            left = bracket.left,
            right = bracket.right,
            local = %self.local.kind(),
            "global search complete, handing off"
        );
        self.local.seed(vmpp, bracket);
        self.bracket = bracket;
        self.primed = false;
        bracket.clamp(vmpp)
    }

    /// One tracking cycle.
    pub(crate) fn step(&mut self, obs: &Observation) -> f64 {
        if !self.primed {
            self.primed = true;
            self.local.prime(obs);
            return self.bracket.clamp(obs.voltage + KICK);
        }
        self.bracket.clamp(self.local.reference_voltage(obs))
    }

    pub(crate) fn reset(&mut self, max_v: f64) {
        self.local.reset();
        self.bracket = Bracket::new(0.0, max_v);
        self.primed = false;
    }
}

/// How a [`ChangeDetector`] compares the running average to its baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Trigger {
    /// Relative move in either direction larger than the fraction.
    Shift(f64),
    /// Relative fall of at least the fraction.
    Drop(f64),
}

/// Running-window detector of environmental change.
///
/// The first full window after [`ChangeDetector::arm`] becomes the baseline;
/// each later full window is compared against it.
#[derive(Debug, Clone)]
pub(crate) struct ChangeDetector {
    trigger: Trigger,
    window: VecDeque<f64>,
    baseline: Option<f64>,
}

impl ChangeDetector {
    pub(crate) fn new(trigger: Trigger) -> Self {
        Self {
            trigger,
            window: VecDeque::with_capacity(WINDOW_LEN),
            baseline: None,
        }
    }

    /// Forgets the window and baseline.
    pub(crate) fn arm(&mut self) {
        self.window.clear();
        self.baseline = None;
    }

    /// Adds a sample.
    ///
    /// # Returns
    ///
    /// `true` when the running average has left its baseline.
    pub(crate) fn push(&mut self, value: f64) -> bool {
        if self.window.len() == WINDOW_LEN {
            self.window.pop_front();
        }
        self.window.push_back(value);
        if self.window.len() < WINDOW_LEN {
            return false;
        }
        let average = self.window.iter().sum::<f64>() / WINDOW_LEN as f64;
        let Some(baseline) = self.baseline else {
            self.baseline = Some(average);
            return false;
        };
        let scale = baseline.abs().max(f64::EPSILON);
        match self.trigger {
            Trigger::Shift(fraction) => (average - baseline).abs() > fraction * scale,
            Trigger::Drop(fraction) => baseline - average >= fraction * scale,
        }
    }
}

/// No global search: the local algorithm runs over `[0, MAX_V]`.
#[derive(Debug)]
pub struct Passthrough {
    max_v: f64,
    local: Box<dyn LocalAlgorithm>,
}

impl Passthrough {
    pub fn new(max_v: f64, local: Box<dyn LocalAlgorithm>) -> Self {
        Self { max_v, local }
    }
}

impl GlobalAlgorithm for Passthrough {
    fn kind(&self) -> GlobalKind {
        GlobalKind::Default
    }

    fn reference_voltage(&mut self, obs: &Observation) -> f64 {
        self.local.reference_voltage(obs).clamp(0.0, self.max_v)
    }

    fn reset(&mut self) {
        self.local.reset();
    }

    fn local(&self) -> &dyn LocalAlgorithm {
        self.local.as_ref()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::mppt::Observation;
    use crate::mppt::global::GlobalAlgorithm;
    use crate::source::cell::ideal_current;

    /// Two-peak P-V curve over `[0, 0.8]`: a lower hump at 0.2 V (2 W) and
    /// the global one at 0.6 V (3 W).
    pub fn two_peak_power(v: f64) -> f64 {
        let hump = |centre: f64, height: f64| height * (-((v - centre) / 0.06).powi(2)).exp();
        hump(0.2, 2.0) + hump(0.6, 3.0)
    }

    /// Closes the loop over the two-peak curve from 0 V.
    pub fn drive_two_peak(alg: &mut dyn GlobalAlgorithm, cycles: usize) -> Vec<f64> {
        let mut v: f64 = 0.0;
        let mut out = Vec::with_capacity(cycles);
        for _ in 0..cycles {
            let current = if v > 0.0 { two_peak_power(v) / v } else { 0.0 };
            v = alg.reference_voltage(&Observation::new(v, current, 1000.0, 25.0));
            out.push(v);
        }
        out
    }

    /// Closes the loop over one ideal cell from 0 V with a per-cycle
    /// irradiance schedule.
    pub fn drive_cell(
        alg: &mut dyn GlobalAlgorithm,
        cycles: usize,
        irradiance: impl Fn(usize) -> f64,
    ) -> Vec<f64> {
        let mut v = 0.0;
        let mut out = Vec::with_capacity(cycles);
        for cycle in 0..cycles {
            let g = irradiance(cycle);
            let i = ideal_current(1, v, g, 25.0);
            v = alg.reference_voltage(&Observation::new(v, i, g, 25.0));
            out.push(v);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mppt::local::LocalKind;
    use crate::mppt::stride::StrideKind;

    #[test]
    fn every_name_round_trips() {
        for name in GlobalKind::NAMES {
            let kind: Result<GlobalKind, _> = name.parse();
            assert_eq!(kind.map(GlobalKind::name).ok(), Some(*name));
        }
        assert_eq!("Voltage Sweep".parse::<GlobalKind>().ok(), Some(GlobalKind::VoltageSweep));
        assert!("firefly".parse::<GlobalKind>().is_err());
    }

    #[test]
    fn factory_builds_requested_kind() {
        for name in GlobalKind::NAMES {
            let kind: GlobalKind = name.parse().unwrap();
            let local = LocalKind::PandO.build(1, StrideKind::Fixed);
            assert_eq!(kind.build(1, local, 7).kind(), kind);
        }
    }

    #[test]
    fn passthrough_clamps_to_curve() {
        let local = LocalKind::PandO.build(1, StrideKind::Fixed);
        let mut alg = Passthrough::new(0.8, local);
        let v = alg.reference_voltage(&Observation::new(0.8, 0.0, 1000.0, 25.0));
        assert!(v <= 0.8);
    }

    #[test]
    fn detector_shift_needs_full_windows() {
        let mut d = ChangeDetector::new(Trigger::Shift(0.1));
        for _ in 0..WINDOW_LEN {
            assert!(!d.push(1000.0));
        }
        // Baseline 1000; the fourth sample at 700 pulls the average to 880.
        let fired: Vec<bool> = (0..5).map(|_| d.push(700.0)).collect();
        assert_eq!(fired, vec![false, false, false, true, true]);
        d.arm();
        assert!(!d.push(700.0));
    }

    #[test]
    fn detector_drop_ignores_rises() {
        let mut d = ChangeDetector::new(Trigger::Drop(0.3));
        for _ in 0..WINDOW_LEN {
            d.push(3.0);
        }
        for _ in 0..WINDOW_LEN {
            assert!(!d.push(6.0));
        }
        let mut d = ChangeDetector::new(Trigger::Drop(0.3));
        for _ in 0..WINDOW_LEN {
            d.push(3.0);
        }
        let fired = (0..WINDOW_LEN).any(|_| d.push(1.0));
        assert!(fired);
    }

    #[test]
    fn delegate_kicks_then_tracks_inside_bracket() {
        let local = LocalKind::PandO.build(1, StrideKind::Fixed);
        let mut d = Delegate::new(local, 0.8);
        let bracket = Bracket::new(0.5, 0.7);
        assert_eq!(d.begin(0.9, bracket), 0.7);
        let kicked = d.step(&Observation::new(0.6, 5.0, 1000.0, 25.0));
        assert!((kicked - 0.62).abs() < 1e-12);
        let next = d.step(&Observation::new(0.62, 5.0, 1000.0, 25.0));
        assert!(bracket.contains(next));
        assert_eq!(d.local().bracket(), bracket);
    }
}
