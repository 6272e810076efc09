//! JSON environment profiles.
//!
//! A profile describes every module of the source and its environmental
//! regime over time:
//!
//! ```json
//! {
//!   "name": "Two modules",
//!   "description": "A shaded second module.",
//!   "num_modules": 2,
//!   "pv_model": {
//!     "0": { "module_type": "1x1", "env_type": "Step", "env_regime": [1000, 25] },
//!     "1": { "module_type": "1x2", "env_type": "Array",
//!            "env_regime": [[0, 1000, 25], [50, 400, 30]] }
//!   }
//! }
//! ```
//!
//! `Step` regimes hold `[irradiance, temperature]`; `Array` regimes hold
//! `[cycle, irradiance, temperature]` rows. An optional `needs_interp: true`
//! interpolates linearly between Array rows.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SimError, SimResult};

/// Physical layout of a module, which fixes its cell count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModuleType {
    #[serde(rename = "1x1")]
    OneByOne,
    #[serde(rename = "1x2")]
    OneByTwo,
    #[serde(rename = "2x2")]
    TwoByTwo,
    #[serde(rename = "2x4")]
    TwoByFour,
}

impl ModuleType {
    /// Accepted layout names.
    pub const NAMES: &[&str] = &["1x1", "1x2", "2x2", "2x4"];

    /// Number of series cells in the layout.
    pub fn num_cells(self) -> u32 {
        match self {
            Self::OneByOne => 1,
            Self::OneByTwo => 2,
            Self::TwoByTwo => 4,
            Self::TwoByFour => 8,
        }
    }

    /// Layout name as written in profiles.
    pub fn name(self) -> &'static str {
        match self {
            Self::OneByOne => "1x1",
            Self::OneByTwo => "1x2",
            Self::TwoByTwo => "2x2",
            Self::TwoByFour => "2x4",
        }
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModuleType {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1x1" => Ok(Self::OneByOne),
            "1x2" => Ok(Self::OneByTwo),
            "2x2" => Ok(Self::TwoByTwo),
            "2x4" => Ok(Self::TwoByFour),
            _ => Err(SimError::unknown("module type", s, Self::NAMES)),
        }
    }
}

/// One logged environment sample of an Array regime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegimeEntry {
    /// Cycle the sample applies from.
    pub cycle: usize,
    /// Irradiance (W/m²).
    pub irradiance: f64,
    /// Temperature (°C).
    pub temperature: f64,
}

/// How a module's environment evolves with the cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Regime {
    /// Constant conditions for every cycle.
    Step {
        /// Irradiance (W/m²).
        irradiance: f64,
        /// Temperature (°C).
        temperature: f64,
    },
    /// Logged samples, sorted by cycle.
    Array {
        /// Samples in ascending cycle order.
        entries: Vec<RegimeEntry>,
        /// Interpolate linearly between samples instead of holding.
        interpolate: bool,
    },
}

impl Regime {
    /// Irradiance and temperature at `cycle`.
    ///
    /// Array regimes hold the latest sample at or before `cycle` (the first
    /// sample before it is logged). Past the last sample the final reading is
    /// repeated.
    pub fn at(&self, cycle: usize) -> (f64, f64) {
        match self {
            Self::Step {
                irradiance,
                temperature,
            } => (*irradiance, *temperature),
            Self::Array {
                entries,
                interpolate,
            } => {
                let upper = entries.partition_point(|e| e.cycle <= cycle);
                let Some(prev) = upper.checked_sub(1).and_then(|i| entries.get(i)) else {
                    return entries
                        .first()
                        .map_or((0.0, 0.0), |e| (e.irradiance, e.temperature));
                };
                match entries.get(upper) {
                    Some(next) if *interpolate && next.cycle > prev.cycle => {
                        let frac = (cycle - prev.cycle) as f64 / (next.cycle - prev.cycle) as f64;
                        (
                            prev.irradiance + frac * (next.irradiance - prev.irradiance),
                            prev.temperature + frac * (next.temperature - prev.temperature),
                        )
                    }
                    _ => (prev.irradiance, prev.temperature),
                }
            }
        }
    }
}

/// A validated module entry of a profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleEnvironment {
    /// Module layout.
    pub module_type: ModuleType,
    /// Environmental regime.
    pub regime: Regime,
}

/// Raw module entry as it appears in JSON.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawModule {
    module_type: String,
    env_type: String,
    env_regime: Value,
    #[serde(default)]
    needs_interp: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProfile {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    num_modules: Option<usize>,
    pv_model: BTreeMap<String, RawModule>,
}

/// A validated environment profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentProfile {
    /// Short profile name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Modules keyed by name.
    pub modules: BTreeMap<String, ModuleEnvironment>,
}

impl EnvironmentProfile {
    /// A single 1x1 module under constant conditions.
    pub fn step(irradiance: f64, temperature: f64) -> Self {
        let mut modules = BTreeMap::new();
        modules.insert(
            "0".to_string(),
            ModuleEnvironment {
                module_type: ModuleType::OneByOne,
                regime: Regime::Step {
                    irradiance,
                    temperature,
                },
            },
        );
        Self {
            name: "Single Cell".to_string(),
            description: format!(
                "A single cell under a step of {irradiance} W/m^2 at {temperature} C."
            ),
            modules,
        }
    }

    /// Reads and validates a profile from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the profile is invalid.
    pub fn from_json_file(path: &Path) -> SimResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Parses and validates a profile from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Json`] for malformed JSON, [`SimError::UnknownKind`]
    /// for an unknown module or environment type, and
    /// [`SimError::InvalidProfile`] for unusable regimes.
    pub fn from_json_str(s: &str) -> SimResult<Self> {
        let raw: RawProfile = serde_json::from_str(s)?;
        if raw.pv_model.is_empty() {
            return Err(SimError::InvalidProfile("pv_model has no modules".into()));
        }
        if let Some(n) = raw.num_modules.filter(|&n| n != raw.pv_model.len()) {
            return Err(SimError::InvalidProfile(format!(
                "num_modules is {n} but pv_model defines {}",
                raw.pv_model.len()
            )));
        }

        let mut modules = BTreeMap::new();
        for (key, module) in raw.pv_model {
            modules.insert(key.clone(), parse_module(&key, module)?);
        }

        Ok(Self {
            name: raw.name,
            description: raw.description,
            modules,
        })
    }
}

fn parse_module(key: &str, raw: RawModule) -> SimResult<ModuleEnvironment> {
    let module_type: ModuleType = raw.module_type.parse()?;
    let numbers = |v: &Value| -> Option<Vec<f64>> {
        v.as_array()?.iter().map(Value::as_f64).collect()
    };
    let invalid = |msg: &str| SimError::InvalidProfile(format!("module \"{key}\": {msg}"));

    let regime = match raw.env_type.as_str() {
        "Step" => {
            let values = numbers(&raw.env_regime)
                .filter(|v| v.len() == 2)
                .ok_or_else(|| invalid("Step regime must be [irradiance, temperature]"))?;
            Regime::Step {
                irradiance: values[0],
                temperature: values[1],
            }
        }
        "Array" => {
            let rows = raw
                .env_regime
                .as_array()
                .ok_or_else(|| invalid("Array regime must be a list of rows"))?;
            let mut entries = Vec::with_capacity(rows.len());
            for row in rows {
                let values = numbers(row)
                    .filter(|v| v.len() == 3 && v[0] >= 0.0)
                    .ok_or_else(|| invalid("Array rows must be [cycle, irradiance, temperature]"))?;
                entries.push(RegimeEntry {
                    cycle: values[0].round() as usize,
                    irradiance: values[1],
                    temperature: values[2],
                });
            }
            if entries.is_empty() {
                return Err(invalid("Array regime has no rows"));
            }
            entries.sort_by_key(|e| e.cycle);
            Regime::Array {
                entries,
                interpolate: raw.needs_interp,
            }
        }
        other => return Err(SimError::unknown("environment type", other, &["Step", "Array"])),
    };

    let negative = match &regime {
        Regime::Step { irradiance, .. } => *irradiance < 0.0,
        Regime::Array { entries, .. } => entries.iter().any(|e| e.irradiance < 0.0),
    };
    if negative {
        return Err(invalid("irradiance must be >= 0"));
    }

    Ok(ModuleEnvironment {
        module_type,
        regime,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_MODULES: &str = r#"{
        "name": "Two modules",
        "description": "Second module shaded after cycle 10.",
        "num_modules": 2,
        "pv_model": {
            "0": { "module_type": "1x1", "env_type": "Step", "env_regime": [1000, 25] },
            "1": { "module_type": "1x2", "env_type": "Array",
                   "env_regime": [[0, 1000, 25], [10, 400, 30]] }
        }
    }"#;

    #[test]
    fn parses_step_and_array_modules() {
        let profile = EnvironmentProfile::from_json_str(TWO_MODULES).unwrap();
        assert_eq!(profile.modules.len(), 2);
        assert_eq!(profile.modules["1"].module_type.num_cells(), 2);
        assert_eq!(profile.modules["0"].regime.at(99), (1000.0, 25.0));
    }

    #[test]
    fn array_holds_then_extrapolates_flat() {
        let regime = Regime::Array {
            entries: vec![
                RegimeEntry { cycle: 0, irradiance: 1000.0, temperature: 25.0 },
                RegimeEntry { cycle: 10, irradiance: 400.0, temperature: 30.0 },
            ],
            interpolate: false,
        };
        assert_eq!(regime.at(0), (1000.0, 25.0));
        assert_eq!(regime.at(9), (1000.0, 25.0));
        assert_eq!(regime.at(10), (400.0, 30.0));
        assert_eq!(regime.at(500), (400.0, 30.0));
    }

    #[test]
    fn array_interpolates_when_requested() {
        let regime = Regime::Array {
            entries: vec![
                RegimeEntry { cycle: 0, irradiance: 1000.0, temperature: 20.0 },
                RegimeEntry { cycle: 10, irradiance: 500.0, temperature: 30.0 },
            ],
            interpolate: true,
        };
        let (g, t) = regime.at(5);
        assert!((g - 750.0).abs() < 1e-9);
        assert!((t - 25.0).abs() < 1e-9);
        assert_eq!(regime.at(20), (500.0, 30.0));
    }

    #[test]
    fn unknown_env_type_is_rejected() {
        let json = r#"{ "pv_model": { "0": { "module_type": "1x1", "env_type": "Ramp", "env_regime": [1, 2] } } }"#;
        let err = EnvironmentProfile::from_json_str(json);
        assert!(matches!(err, Err(SimError::UnknownKind { .. })));
    }

    #[test]
    fn unknown_module_type_is_rejected() {
        let json = r#"{ "pv_model": { "0": { "module_type": "3x3", "env_type": "Step", "env_regime": [1000, 25] } } }"#;
        assert!(EnvironmentProfile::from_json_str(json).is_err());
    }

    #[test]
    fn negative_irradiance_is_rejected() {
        let json = r#"{ "pv_model": { "0": { "module_type": "1x1", "env_type": "Step", "env_regime": [-5, 25] } } }"#;
        assert!(matches!(
            EnvironmentProfile::from_json_str(json),
            Err(SimError::InvalidProfile(_))
        ));
    }

    #[test]
    fn module_count_mismatch_is_rejected() {
        let json = r#"{ "num_modules": 3, "pv_model": { "0": { "module_type": "1x1", "env_type": "Step", "env_regime": [1000, 25] } } }"#;
        assert!(EnvironmentProfile::from_json_str(json).is_err());
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(
            EnvironmentProfile::from_json_str("{ not json"),
            Err(SimError::Json(_))
        ));
    }
}
