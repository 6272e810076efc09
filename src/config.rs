//! TOML-based scenario configuration and preset definitions.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::converter::DEFAULT_LOAD_VOLTAGE;
use crate::environment::{
    DEFAULT_MAX_CYCLES, EnvironmentProfile, EnvironmentSpec, ModuleEnvironment, ModuleType,
    Regime,
};
use crate::error::SimResult;
use crate::mppt::{GlobalKind, LocalKind, MpptKinds, StrideKind};
use crate::sim::pipeline::{DEFAULT_IV_RESOLUTION, PipelineSetup};
use crate::source::{CellModelKind, LookupTable};

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the baseline scenario. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Run length, sweep resolution and seed.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Cell model and lookup selection.
    #[serde(default)]
    pub source: SourceConfig,
    /// Module layout and conditions.
    #[serde(default)]
    pub environment: EnvironmentConfig,
    /// Tracker stack.
    #[serde(default)]
    pub mppt: MpptConfig,
    /// Converter voltages.
    #[serde(default)]
    pub converter: ConverterConfig,
}

/// Run length, sweep resolution and seed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Last cycle of the run (must be > 0).
    pub max_cycles: usize,
    /// Voltage step of the per-cycle I-V sweep (V, must be > 0).
    pub iv_resolution: f64,
    /// Seed of the stochastic global algorithms.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_cycles: DEFAULT_MAX_CYCLES,
            iv_resolution: DEFAULT_IV_RESOLUTION,
            seed: 42,
        }
    }
}

/// Cell model and lookup selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// Cell model: `"ideal"` or `"nonideal"`.
    pub model: String,
    /// Serve currents from a lookup table.
    pub use_lookup: bool,
    /// CSV lookup table to attach.
    pub lookup_path: Option<PathBuf>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            model: "ideal".to_string(),
            use_lookup: false,
            lookup_path: None,
        }
    }
}

/// One module under constant conditions.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StepModuleConfig {
    /// Module name; defaults to the module's position.
    pub name: Option<String>,
    /// Layout: `"1x1"`, `"1x2"`, `"2x2"` or `"2x4"`.
    pub module_type: String,
    /// Irradiance (W/m², must be >= 0).
    pub irradiance: f64,
    /// Temperature (°C).
    pub temperature: f64,
}

impl Default for StepModuleConfig {
    fn default() -> Self {
        Self {
            name: None,
            module_type: "1x1".to_string(),
            irradiance: 1000.0,
            temperature: 25.0,
        }
    }
}

/// Module layout and conditions.
///
/// A JSON `profile` takes precedence over the inline step `modules`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentConfig {
    pub profile: Option<PathBuf>,
    pub modules: Vec<StepModuleConfig>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            profile: None,
            modules: vec![StepModuleConfig::default()],
        }
    }
}

/// Tracker stack, by name.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MpptConfig {
    pub global: String,
    pub local: String,
    pub stride: String,
}

impl Default for MpptConfig {
    fn default() -> Self {
        Self {
            global: "default".to_string(),
            local: "pando".to_string(),
            stride: "fixed".to_string(),
        }
    }
}

/// Converter voltages.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConverterConfig {
    /// Initial array-side voltage (V).
    pub array_voltage: f64,
    /// Load-side voltage (V, must be >= 0).
    pub load_voltage: f64,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            array_voltage: 0.0,
            load_voltage: DEFAULT_LOAD_VOLTAGE,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.max_cycles"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Pushes an error when `value` does not name a member of `T`.
fn check_name<T: FromStr>(errors: &mut Vec<ConfigError>, field: &str, value: &str)
where
    T::Err: std::fmt::Display,
{
    if let Err(e) = value.parse::<T>() {
        errors.push(ConfigError::new(field, e.to_string()));
    }
}

impl ScenarioConfig {
    /// Single 1x1 cell at STC tracked by pass-through P&O with a fixed stride.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Two series modules, the second one shaded, under a voltage sweep.
    pub fn partial_shade() -> Self {
        Self {
            environment: EnvironmentConfig {
                profile: None,
                modules: vec![
                    StepModuleConfig {
                        name: Some("lit".to_string()),
                        ..StepModuleConfig::default()
                    },
                    StepModuleConfig {
                        name: Some("shaded".to_string()),
                        irradiance: 400.0,
                        temperature: 30.0,
                        ..StepModuleConfig::default()
                    },
                ],
            },
            mppt: MpptConfig {
                global: "voltage_sweep".to_string(),
                stride: "adaptive".to_string(),
                ..MpptConfig::default()
            },
            ..Self::default()
        }
    }

    /// A 1x2 module tracked by particle swarm with IC and the optimal stride.
    pub fn swarm() -> Self {
        Self {
            environment: EnvironmentConfig {
                profile: None,
                modules: vec![StepModuleConfig {
                    module_type: "1x2".to_string(),
                    ..StepModuleConfig::default()
                }],
            },
            mppt: MpptConfig {
                global: "particle_swarm".to_string(),
                local: "ic".to_string(),
                stride: "optimal".to_string(),
            },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "partial_shade", "swarm"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "partial_shade" => Ok(Self::partial_shade()),
            "swarm" => Ok(Self::swarm()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Every algorithm, model and layout name is resolved here, so a valid
    /// configuration cannot fail on a name once the run starts.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let s = &self.simulation;
        if s.max_cycles == 0 {
            errors.push(ConfigError::new("simulation.max_cycles", "must be > 0"));
        }
        if s.iv_resolution <= 0.0 || !s.iv_resolution.is_finite() {
            errors.push(ConfigError::new("simulation.iv_resolution", "must be > 0"));
        }

        check_name::<CellModelKind>(&mut errors, "source.model", &self.source.model);

        let env = &self.environment;
        if env.profile.is_none() {
            if env.modules.is_empty() {
                errors.push(ConfigError::new(
                    "environment.modules",
                    "at least one module is required without a profile",
                ));
            }
            for (i, module) in env.modules.iter().enumerate() {
                check_name::<ModuleType>(
                    &mut errors,
                    &format!("environment.modules[{i}].module_type"),
                    &module.module_type,
                );
                if module.irradiance < 0.0 {
                    errors.push(ConfigError::new(
                        format!("environment.modules[{i}].irradiance"),
                        "must be >= 0",
                    ));
                }
            }
        }

        check_name::<GlobalKind>(&mut errors, "mppt.global", &self.mppt.global);
        check_name::<LocalKind>(&mut errors, "mppt.local", &self.mppt.local);
        check_name::<StrideKind>(&mut errors, "mppt.stride", &self.mppt.stride);

        if self.converter.load_voltage < 0.0 {
            errors.push(ConfigError::new("converter.load_voltage", "must be >= 0"));
        }

        errors
    }

    /// Environment described by this configuration.
    ///
    /// # Errors
    ///
    /// Fails when the profile cannot be loaded or a module layout is unknown.
    pub fn environment_spec(&self) -> SimResult<EnvironmentSpec> {
        if let Some(path) = &self.environment.profile {
            return EnvironmentSpec::from_json_file(path);
        }

        let mut modules = BTreeMap::new();
        for (i, module) in self.environment.modules.iter().enumerate() {
            let name = module.name.clone().unwrap_or_else(|| i.to_string());
            modules.insert(
                name,
                ModuleEnvironment {
                    module_type: module.module_type.parse()?,
                    regime: Regime::Step {
                        irradiance: module.irradiance,
                        temperature: module.temperature,
                    },
                },
            );
        }
        Ok(EnvironmentSpec::Profile(EnvironmentProfile {
            name: "Scenario".to_string(),
            description: format!("{} step module(s) from the scenario file.", modules.len()),
            modules,
        }))
    }

    /// Resolves the configuration into a pipeline setup.
    ///
    /// # Errors
    ///
    /// Returns the first validation error, or a loading error for the
    /// profile or lookup table.
    pub fn pipeline_setup(&self) -> SimResult<PipelineSetup> {
        if let Some(first) = self.validate().into_iter().next() {
            return Err(first.into());
        }

        let model: CellModelKind = self.source.model.parse()?;
        let mppt = MpptKinds {
            global: self.mppt.global.parse()?,
            local: self.mppt.local.parse()?,
            stride: self.mppt.stride.parse()?,
        };

        let mut setup = PipelineSetup::new(
            model,
            self.environment_spec()?,
            self.simulation.max_cycles,
            mppt,
        );
        setup.use_lookup = self.source.use_lookup;
        if self.source.use_lookup {
            setup.lookup = self
                .source
                .lookup_path
                .as_deref()
                .map(LookupTable::from_csv_file)
                .transpose()?;
            if let Some(table) = &setup.lookup {
                table.ensure_model(model)?;
            }
        }
        setup.iv_resolution = self.simulation.iv_resolution;
        setup.seed = self.simulation.seed;
        setup.array_voltage = self.converter.array_voltage;
        setup.load_voltage = self.converter.load_voltage;
        Ok(setup)
    }
}
