//! Local MPPT algorithms.
//!
//! Each algorithm is a small state machine emitting one reference voltage
//! per call. They assume a single peak in their bracket and do not clamp
//! their output; the owning global algorithm does.

mod bisection;
mod fc;
mod fuzzy;
mod golden;
mod ic;
mod pando;
mod ternary;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::SimError;
use crate::mppt::stride::{Stride, StrideKind};
use crate::mppt::{Bracket, History, Observation, max_voltage};
pub use bisection::Bisection;
pub use fc::FeedbackControl;
pub use fuzzy::FuzzyLogic;
pub use golden::Golden;
pub use ic::IncrementalConductance;
pub use pando::PerturbObserve;
pub use ternary::Ternary;

/// Local algorithm variants selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalKind {
    /// Perturb and observe.
    #[default]
    #[serde(rename = "pando")]
    PandO,
    /// Incremental conductance.
    Ic,
    /// Feedback control on dP/dV.
    Fc,
    Bisection,
    Golden,
    Ternary,
    Fuzzy,
}

impl LocalKind {
    /// Accepted configuration names.
    pub const NAMES: &[&str] = &["pando", "ic", "fc", "bisection", "golden", "ternary", "fuzzy"];

    /// Configuration name of this algorithm.
    pub fn name(self) -> &'static str {
        match self {
            Self::PandO => "pando",
            Self::Ic => "ic",
            Self::Fc => "fc",
            Self::Bisection => "bisection",
            Self::Golden => "golden",
            Self::Ternary => "ternary",
            Self::Fuzzy => "fuzzy",
        }
    }

    /// Builds a fresh algorithm for a string of `num_cells` cells.
    pub fn build(self, num_cells: u32, stride: StrideKind) -> Box<dyn LocalAlgorithm> {
        let core = LocalCore::new(num_cells, stride);
        match self {
            Self::PandO => Box::new(PerturbObserve::new(core)),
            Self::Ic => Box::new(IncrementalConductance::new(core)),
            Self::Fc => Box::new(FeedbackControl::new(core)),
            Self::Bisection => Box::new(Bisection::new(core)),
            Self::Golden => Box::new(Golden::new(core)),
            Self::Ternary => Box::new(Ternary::new(core)),
            Self::Fuzzy => Box::new(FuzzyLogic::new(core, num_cells)),
        }
    }
}

impl fmt::Display for LocalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LocalKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pando" | "p&o" => Ok(Self::PandO),
            "ic" => Ok(Self::Ic),
            "fc" => Ok(Self::Fc),
            "bisection" => Ok(Self::Bisection),
            "golden" => Ok(Self::Golden),
            "ternary" => Ok(Self::Ternary),
            "fuzzy" => Ok(Self::Fuzzy),
            _ => Err(SimError::unknown("local algorithm", s, Self::NAMES)),
        }
    }
}

/// State shared by every local algorithm.
#[derive(Debug, Clone)]
pub struct LocalCore {
    /// Previous sample.
    pub history: History,
    /// Interval the algorithm currently searches.
    pub bracket: Bracket,
    /// Whole-curve interval restored on reset.
    full: Bracket,
    pub stride: Stride,
}

impl LocalCore {
    pub fn new(num_cells: u32, stride: StrideKind) -> Self {
        let full = Bracket::new(0.0, max_voltage(num_cells));
        Self {
            history: History::default(),
            bracket: full,
            full,
            stride: Stride::new(stride, num_cells),
        }
    }

    fn reset(&mut self) {
        self.history = History::default();
        self.bracket = self.full;
        self.stride.reset();
    }

    fn seed(&mut self, vmpp: f64, bracket: Bracket) {
        self.bracket = bracket;
        self.stride.seed(vmpp);
    }
}

/// Uniform interface of the local algorithm family.
pub trait LocalAlgorithm: fmt::Debug + Send {
    /// Which variant this is.
    fn kind(&self) -> LocalKind;

    fn core(&self) -> &LocalCore;

    fn core_mut(&mut self) -> &mut LocalCore;

    /// Consumes this cycle's sample and returns the next reference voltage.
    fn reference_voltage(&mut self, obs: &Observation) -> f64;

    /// Clears algorithm-specific state after a handoff.
    fn restart(&mut self) {}

    /// Clears algorithm-specific state on a full reset.
    fn reset_state(&mut self) {
        self.restart();
    }

    /// Returns to the freshly built state.
    fn reset(&mut self) {
        self.core_mut().reset();
        self.reset_state();
    }

    /// Hands over a global search result.
    ///
    /// # Arguments
    ///
    /// * `vmpp` - Voltage of the best point found; becomes the stride's estimate
    /// * `bracket` - Interval the algorithm is confined to from now on
    fn seed(&mut self, vmpp: f64, bracket: Bracket) {
        self.core_mut().seed(vmpp, bracket);
        self.restart();
    }

    /// Records a sample without deciding on it, so the next call sees a
    /// meaningful difference.
    fn prime(&mut self, obs: &Observation) {
        let core = self.core_mut();
        core.history.record(obs);
        core.stride.prime(obs);
    }

    fn bracket(&self) -> Bracket {
        self.core().bracket
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_name_round_trips() {
        for name in LocalKind::NAMES {
            let kind: Result<LocalKind, _> = name.parse();
            assert_eq!(kind.map(LocalKind::name).ok(), Some(*name));
        }
    }

    #[test]
    fn unknown_name_lists_alternatives() {
        let err = "hill".parse::<LocalKind>().err().map(|e| e.to_string());
        assert!(err.is_some_and(|m| m.contains("golden")));
    }

    #[test]
    fn factory_builds_requested_kind() {
        for name in LocalKind::NAMES {
            let kind: LocalKind = name.parse().unwrap();
            let alg = kind.build(2, StrideKind::Fixed);
            assert_eq!(alg.kind(), kind);
            assert_eq!(alg.bracket(), Bracket::new(0.0, 1.6));
        }
    }

    #[test]
    fn seed_then_reset_restores_bracket() {
        let mut alg = LocalKind::PandO.build(1, StrideKind::Optimal);
        alg.seed(0.3, Bracket::new(0.2, 0.4));
        assert_eq!(alg.bracket(), Bracket::new(0.2, 0.4));
        assert_eq!(alg.core().stride.vmpp_estimate(), 0.3);
        alg.reset();
        assert_eq!(alg.bracket(), Bracket::new(0.0, 0.8));
        assert!((alg.core().stride.vmpp_estimate() - 0.621).abs() < 1e-12);
    }
}
