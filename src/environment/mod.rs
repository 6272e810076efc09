//! Simulated environment: cycle time and per-module irradiance/temperature.

pub mod profile;

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::error::{SimError, SimResult};
use crate::sim::clock::Clock;
use crate::source::{ModuleDefinition, SourceDefinition};
pub use profile::{EnvironmentProfile, ModuleEnvironment, ModuleType, Regime, RegimeEntry};

/// Default last cycle of a run.
pub const DEFAULT_MAX_CYCLES: usize = 200;

/// How the environment is defined for a run.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvironmentSpec {
    /// One 1x1 module under constant conditions.
    Step {
        /// Irradiance (W/m²).
        irradiance: f64,
        /// Temperature (°C).
        temperature: f64,
    },
    /// An explicit per-module profile.
    Profile(EnvironmentProfile),
}

impl EnvironmentSpec {
    /// Loads a JSON profile from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable or the profile is invalid.
    pub fn from_json_file(path: &Path) -> SimResult<Self> {
        Ok(Self::Profile(EnvironmentProfile::from_json_file(path)?))
    }

    fn into_profile(self) -> SimResult<EnvironmentProfile> {
        match self {
            Self::Step {
                irradiance,
                temperature,
            } => {
                if irradiance < 0.0 {
                    return Err(SimError::InvalidProfile("irradiance must be >= 0".into()));
                }
                Ok(EnvironmentProfile::step(irradiance, temperature))
            }
            Self::Profile(profile) => Ok(profile),
        }
    }
}

/// Cell-count weighted environment of the whole source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnvironmentReading {
    /// Irradiance (W/m²).
    pub irradiance: f64,
    /// Temperature (°C).
    pub temperature: f64,
}

/// Owner of simulation time and of the environmental conditions each module
/// sees at the current cycle.
#[derive(Debug, Clone)]
pub struct PvEnvironment {
    clock: Clock,
    profile: EnvironmentProfile,
}

impl PvEnvironment {
    /// Builds an environment at cycle 0.
    ///
    /// # Arguments
    ///
    /// * `spec` - Step conditions or a module profile
    /// * `max_cycles` - Last cycle the environment extends to
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidProfile`] for physically invalid conditions.
    pub fn new(spec: EnvironmentSpec, max_cycles: usize) -> SimResult<Self> {
        Ok(Self {
            clock: Clock::new(max_cycles),
            profile: spec.into_profile()?,
        })
    }

    /// Replaces the environment definition and rewinds to cycle 0.
    ///
    /// # Errors
    ///
    /// Same as [`PvEnvironment::new`]; on error the environment is unchanged.
    pub fn setup(&mut self, spec: EnvironmentSpec, max_cycles: usize) -> SimResult<()> {
        *self = Self::new(spec, max_cycles)?;
        Ok(())
    }

    /// Active profile.
    pub fn profile(&self) -> &EnvironmentProfile {
        &self.profile
    }

    /// Current cycle.
    pub fn cycle(&self) -> usize {
        self.clock.current()
    }

    /// Last cycle of the run.
    pub fn max_cycle(&self) -> usize {
        self.clock.max()
    }

    /// Jumps to `cycle`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::CycleOutOfRange`] outside `[0, max_cycle]`.
    pub fn set_cycle(&mut self, cycle: usize) -> SimResult<()> {
        self.clock.set(cycle)
    }

    /// Advances one cycle, saturating at the last cycle.
    ///
    /// # Returns
    ///
    /// `false` once the environment was already at its last cycle.
    pub fn increment_cycle(&mut self) -> bool {
        self.clock.tick()
    }

    /// Total series cells across modules.
    pub fn total_cells(&self) -> u32 {
        self.profile
            .modules
            .values()
            .map(|m| m.module_type.num_cells())
            .sum()
    }

    fn define(&self, module: &ModuleEnvironment, voltage: f64) -> ModuleDefinition {
        let (irradiance, temperature) = module.regime.at(self.cycle());
        ModuleDefinition {
            num_cells: module.module_type.num_cells(),
            voltage,
            irradiance,
            temperature,
        }
    }

    /// Every module's definition at the current cycle.
    ///
    /// # Arguments
    ///
    /// * `voltage` - Voltage applied across the source
    pub fn source_definition(&self, voltage: f64) -> SourceDefinition {
        self.profile
            .modules
            .iter()
            .map(|(name, module)| (name.clone(), self.define(module, voltage)))
            .collect()
    }

    /// One module's definition at the current cycle.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownModule`] if `name` is not in the profile.
    pub fn module_definition(&self, name: &str, voltage: f64) -> SimResult<ModuleDefinition> {
        self.profile
            .modules
            .get(name)
            .map(|module| self.define(module, voltage))
            .ok_or_else(|| SimError::UnknownModule(name.to_string()))
    }

    /// Module names mapped to their layouts.
    pub fn module_mapping(&self) -> BTreeMap<String, ModuleType> {
        self.profile
            .modules
            .iter()
            .map(|(name, module)| (name.clone(), module.module_type))
            .collect()
    }

    /// Cell-count weighted average irradiance and temperature at the current cycle.
    pub fn agglomerated_environment(&self) -> EnvironmentReading {
        let mut cells = 0.0;
        let mut irradiance = 0.0;
        let mut temperature = 0.0;
        for module in self.profile.modules.values() {
            let weight = f64::from(module.module_type.num_cells());
            let (g, t) = module.regime.at(self.cycle());
            cells += weight;
            irradiance += weight * g;
            temperature += weight * t;
        }
        if cells == 0.0 {
            return EnvironmentReading {
                irradiance: 0.0,
                temperature: 0.0,
            };
        }
        EnvironmentReading {
            irradiance: irradiance / cells,
            temperature: temperature / cells,
        }
    }
}
