//! Cycle-by-cycle PV power chain: environment → source → MPPT → converter.

use crate::config::ScenarioConfig;
use crate::converter::{DEFAULT_LOAD_VOLTAGE, DcDcConverter};
use crate::environment::{EnvironmentSpec, PvEnvironment};
use crate::error::{SimError, SimResult};
use crate::mppt::{GlobalKind, LocalKind, Mppt, MpptKinds, StrideKind};
use crate::source::{
    CellModelKind, IvCurve, LookupTable, ModuleDefinition, PvSource, SourceDefinition,
};

use super::types::{CycleRecord, RunSummary, SourceOutput};

/// Default voltage step of the per-cycle I-V sweep (V).
pub const DEFAULT_IV_RESOLUTION: f64 = 0.01;

/// Everything needed to assemble a [`Pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineSetup {
    pub model: CellModelKind,
    pub use_lookup: bool,
    /// Table attached to the source; only consulted with `use_lookup`.
    pub lookup: Option<LookupTable>,
    pub environment: EnvironmentSpec,
    /// Last cycle of the run.
    pub max_cycles: usize,
    pub mppt: MpptKinds,
    pub iv_resolution: f64,
    /// Seed of the stochastic global algorithms.
    pub seed: u64,
    pub array_voltage: f64,
    pub load_voltage: f64,
}

impl PipelineSetup {
    /// A setup with the default resolution, seed 0 and converter voltages.
    pub fn new(
        model: CellModelKind,
        environment: EnvironmentSpec,
        max_cycles: usize,
        mppt: MpptKinds,
    ) -> Self {
        Self {
            model,
            use_lookup: false,
            lookup: None,
            environment,
            max_cycles,
            mppt,
            iv_resolution: DEFAULT_IV_RESOLUTION,
            seed: 0,
            array_voltage: 0.0,
            load_voltage: DEFAULT_LOAD_VOLTAGE,
        }
    }
}

/// The simulation pipeline.
///
/// Each [`Pipeline::iterate_cycle`] call runs one cycle: the environment is
/// read at the previous cycle's reference voltage, the source is evaluated,
/// the tracker picks the next reference and the converter turns it into a
/// pulse width. Records accumulate until the environment reaches its last
/// cycle, so a run of `max_cycles` yields `max_cycles + 1` records.
#[derive(Debug)]
pub struct Pipeline {
    source: PvSource,
    environment: PvEnvironment,
    mppt: Mppt,
    converter: DcDcConverter,
    iv_resolution: f64,
    seed: u64,
    vref: f64,
    records: Vec<CycleRecord>,
    finished: bool,
}

impl Pipeline {
    /// Assembles a pipeline at cycle 0 with a zero reference voltage.
    ///
    /// # Errors
    ///
    /// Fails when the environment definition is invalid or the lookup table
    /// was built for a different cell model.
    pub fn new(setup: PipelineSetup) -> SimResult<Self> {
        if let Some(table) = &setup.lookup {
            table.ensure_model(setup.model)?;
        }
        let environment = PvEnvironment::new(setup.environment, setup.max_cycles)?;

        let mut source = PvSource::new();
        if let Some(table) = setup.lookup {
            source.attach_lookup(table);
        }
        source.setup_model(setup.model, setup.use_lookup);

        let mppt = Mppt::new(
            environment.total_cells(),
            setup.mppt.global,
            setup.mppt.local,
            setup.mppt.stride,
            setup.seed,
        );

        tracing::info!(
            model = %setup.model,
            cells = environment.total_cells(),
            max_cycles = setup.max_cycles,
            global = %setup.mppt.global,
            local = %setup.mppt.local,
            stride = %setup.mppt.stride,
            "pipeline configured"
        );

        Ok(Self {
            source,
            environment,
            mppt,
            converter: DcDcConverter::new(setup.array_voltage, setup.load_voltage),
            iv_resolution: setup.iv_resolution,
            seed: setup.seed,
            vref: 0.0,
            records: Vec::with_capacity(setup.max_cycles + 1),
            finished: false,
        })
    }

    /// Builds a pipeline from a scenario configuration.
    ///
    /// # Errors
    ///
    /// Fails when the configuration does not validate, the environment
    /// profile or lookup table cannot be loaded, or any name is unknown.
    pub fn from_config(config: &ScenarioConfig) -> SimResult<Self> {
        Self::new(config.pipeline_setup()?)
    }

    /// Reconfigures the whole chain by name and rewinds to cycle 0.
    ///
    /// Every name is resolved before anything changes, so an unknown name
    /// leaves the pipeline untouched. Resolution, seed and converter voltages
    /// are kept. The lookup table is kept only while the cell model stays the
    /// same; a table built for the old model is dropped and the new model is
    /// evaluated in closed form.
    ///
    /// # Arguments
    ///
    /// * `model` - Cell model name (`ideal`, `nonideal`)
    /// * `environment` - Step conditions or a module profile
    /// * `max_cycles` - Last cycle of the run
    /// * `global` - Global algorithm name
    /// * `local` - Local algorithm name
    /// * `stride` - Stride strategy name
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::SimError::UnknownKind`] for an unknown name or
    /// a profile error for an invalid environment.
    pub fn reset_pipeline(
        &mut self,
        model: &str,
        environment: EnvironmentSpec,
        max_cycles: usize,
        global: &str,
        local: &str,
        stride: &str,
    ) -> SimResult<()> {
        let model: CellModelKind = model.parse()?;
        let mppt = MpptKinds {
            global: global.parse::<GlobalKind>()?,
            local: local.parse::<LocalKind>()?,
            stride: stride.parse::<StrideKind>()?,
        };

        let mut setup = PipelineSetup::new(model, environment, max_cycles, mppt);
        let lookup = self.source.lookup().filter(|t| t.model() == model).cloned();
        if let (Some(old), None) = (self.source.lookup(), &lookup) {
            tracing::warn!(
                table = %old.model(),
                %model,
                "dropping lookup table built for another cell model"
            );
        }
        setup.use_lookup = self.source.uses_lookup() && lookup.is_some();
        setup.lookup = lookup;
        setup.iv_resolution = self.iv_resolution;
        setup.seed = self.seed;
        setup.array_voltage = 0.0;
        setup.load_voltage = self.converter.voltage_out();

        *self = Self::new(setup)?;
        Ok(())
    }

    /// Runs one cycle.
    ///
    /// # Returns
    ///
    /// The series accumulated so far and whether another cycle remains.
    /// Once the run has finished further calls add nothing.
    ///
    /// # Errors
    ///
    /// Fails when the source cannot be evaluated, e.g. a lookup falls
    /// outside its table.
    pub fn iterate_cycle(&mut self) -> SimResult<(&[CycleRecord], bool)> {
        if self.finished {
            return Ok((&self.records, false));
        }

        let cycle = self.environment.cycle();
        let vref_in = self.vref;
        let source_definition = self.environment.source_definition(vref_in);
        let reading = self.environment.agglomerated_environment();

        let current = self.source.source_current(&source_definition)?;
        let iv_curve = self.source.iv_curve(&source_definition, self.iv_resolution)?;
        let edge = iv_curve.edge_characteristics();

        let vref_out =
            self.mppt
                .reference_voltage(vref_in, current, reading.irradiance, reading.temperature);
        self.converter.set_pulse_width(vref_out);
        let pulse_width = self.converter.pulse_width();

        tracing::debug!(cycle, vref_in, current, vref_out, pulse_width, "cycle");

        self.records.push(CycleRecord {
            cycle,
            source_definition,
            environment: reading,
            vref_in,
            source_output: SourceOutput {
                current,
                iv_curve,
                edge,
            },
            vref_out,
            pulse_width,
        });
        self.vref = vref_out;

        let more = self.environment.increment_cycle();
        if !more {
            self.finished = true;
            tracing::info!(cycles = self.records.len(), "run finished");
        }
        Ok((&self.records, more))
    }

    /// Runs every remaining cycle.
    ///
    /// # Errors
    ///
    /// Same as [`Pipeline::iterate_cycle`]; records up to the failure are kept.
    pub fn run(&mut self) -> SimResult<&[CycleRecord]> {
        while !self.finished {
            self.iterate_cycle()?;
        }
        Ok(&self.records)
    }

    /// Series accumulated so far.
    pub fn records(&self) -> &[CycleRecord] {
        &self.records
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Reference voltage to be applied next cycle (V).
    pub fn reference_voltage(&self) -> f64 {
        self.vref
    }

    pub fn environment(&self) -> &PvEnvironment {
        &self.environment
    }

    pub fn converter(&self) -> &DcDcConverter {
        &self.converter
    }

    pub fn mppt(&self) -> &Mppt {
        &self.mppt
    }

    /// Static description of the configured run.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            model: self
                .source
                .model_kind()
                .map_or_else(String::new, |m| m.name().to_string()),
            use_lookup: self.source.uses_lookup(),
            mppt: self.mppt.kinds(),
            num_cells: self.environment.total_cells(),
            max_cycles: self.environment.max_cycle(),
            cycles_run: self.records.len(),
            finished: self.finished,
        }
    }

    /// I-V curve of `num_cells` cells under uniform conditions, evaluated
    /// with this pipeline's source (and its lookup table, if enabled).
    ///
    /// # Errors
    ///
    /// Fails when a lookup falls outside its table.
    pub fn source_curve(
        &self,
        num_cells: u32,
        irradiance: f64,
        temperature: f64,
        resolution: f64,
    ) -> SimResult<IvCurve> {
        self.source.iv_curve(
            &uniform_source(num_cells, irradiance, temperature),
            resolution,
        )
    }
}

fn uniform_source(num_cells: u32, irradiance: f64, temperature: f64) -> SourceDefinition {
    let mut source = SourceDefinition::new();
    source.insert(
        "0".to_string(),
        ModuleDefinition {
            num_cells: num_cells.max(1),
            voltage: 0.0,
            irradiance,
            temperature,
        },
    );
    source
}

/// Standalone I-V curve of `num_cells` series cells under uniform conditions.
///
/// Sweeps `[0, 0.8 · num_cells]` at `resolution`. With `use_lookup` every
/// point is read from `lookup`; otherwise `lookup` is ignored and the
/// closed-form model is evaluated.
///
/// # Errors
///
/// With `use_lookup`: [`SimError::NoLookupTable`] when `lookup` is `None`,
/// [`SimError::LookupModelMismatch`] when the table was built for another
/// model, and [`SimError::LookupOutOfBounds`] when a sweep point or the
/// conditions fall outside the table.
///
/// # Examples
///
/// ```
/// use pv_sim::sim::pipeline::generate_source_curve;
/// use pv_sim::source::CellModelKind;
///
/// let curve =
///     generate_source_curve(1, 1000.0, 25.0, 0.1, CellModelKind::Ideal, false, None).unwrap();
/// assert_eq!(curve.len(), 9);
/// assert!(curve.currents[0] > 6.0);
/// ```
pub fn generate_source_curve(
    num_cells: u32,
    irradiance: f64,
    temperature: f64,
    resolution: f64,
    model: CellModelKind,
    use_lookup: bool,
    lookup: Option<&LookupTable>,
) -> SimResult<IvCurve> {
    let mut source = PvSource::new();
    if use_lookup {
        let table = lookup.ok_or(SimError::NoLookupTable)?;
        table.ensure_model(model)?;
        source.attach_lookup(table.clone());
    }
    source.setup_model(model, use_lookup);
    source.iv_curve(
        &uniform_source(num_cells, irradiance, temperature),
        resolution,
    )
}
