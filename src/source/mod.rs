//! PV source modelling: cell models, lookup tables, and source aggregation.

pub mod cell;
pub mod lookup;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{SimError, SimResult};
pub use cell::{CellModelKind, MAX_CELL_VOLTAGE, MIN_RESOLUTION};
pub use lookup::{Axis, LookupParams, LookupTable};

/// Electrical and environmental state of one module for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModuleDefinition {
    /// Cells in series (>= 1).
    pub num_cells: u32,
    /// Voltage applied across the whole source (V).
    pub voltage: f64,
    /// Irradiance on the module (W/m², >= 0).
    pub irradiance: f64,
    /// Cell temperature (°C).
    pub temperature: f64,
}

/// Every module of the source at one instant, keyed by module name.
pub type SourceDefinition = BTreeMap<String, ModuleDefinition>;

/// Total series cell count of a source.
pub fn total_cells(source: &SourceDefinition) -> u32 {
    source.values().map(|m| m.num_cells).sum()
}

/// Open-circuit, short-circuit and maximum power point of a curve.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct EdgeCharacteristics {
    /// Open-circuit voltage (V).
    pub v_oc: f64,
    /// Short-circuit current (A).
    pub i_sc: f64,
    /// Voltage at the maximum power point (V).
    pub v_mpp: f64,
    /// Current at the maximum power point (A).
    pub i_mpp: f64,
}

impl EdgeCharacteristics {
    /// Power at the maximum power point (W).
    pub fn p_mpp(&self) -> f64 {
        self.v_mpp * self.i_mpp
    }
}

/// Sampled current-voltage curve, ascending in voltage.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct IvCurve {
    /// Sample voltages (V).
    pub voltages: Vec<f64>,
    /// Current at each sample voltage (A).
    pub currents: Vec<f64>,
}

impl IvCurve {
    /// Number of samples.
    pub fn len(&self) -> usize {
        self.voltages.len()
    }

    /// Whether the curve holds no samples.
    pub fn is_empty(&self) -> bool {
        self.voltages.is_empty()
    }

    /// Iterates `(voltage, current)` pairs.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.voltages.iter().copied().zip(self.currents.iter().copied())
    }

    /// Derives the edge characteristics from the samples.
    ///
    /// - `i_sc` is the first sample's current.
    /// - `v_oc` is the first voltage with `I <= 0`, or the last voltage if the
    ///   current never reaches zero.
    /// - the MPP is the sample with the largest `V · I` (first wins on ties).
    pub fn edge_characteristics(&self) -> EdgeCharacteristics {
        let Some((&v_last, &i_sc)) = self.voltages.last().zip(self.currents.first()) else {
            return EdgeCharacteristics::default();
        };

        let v_oc = self
            .points()
            .find(|&(_, i)| i <= 0.0)
            .map_or(v_last, |(v, _)| v);

        let (mut v_mpp, mut i_mpp) = (0.0, 0.0);
        let mut p_max = f64::NEG_INFINITY;
        for (v, i) in self.points() {
            if v * i > p_max {
                p_max = v * i;
                v_mpp = v;
                i_mpp = i;
            }
        }

        EdgeCharacteristics {
            v_oc,
            i_sc,
            v_mpp,
            i_mpp,
        }
    }
}

/// A PV source built from one or more modules sharing one cell model.
///
/// The source is inert until [`PvSource::setup_model`] selects a model; every
/// query before that fails with [`SimError::NoCellModel`].
#[derive(Debug, Clone, Default)]
pub struct PvSource {
    model: Option<CellModelKind>,
    use_lookup: bool,
    lookup: Option<LookupTable>,
}

impl PvSource {
    /// Creates a source with no cell model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the cell model and whether queries should go through a table.
    ///
    /// # Arguments
    ///
    /// * `model` - Cell model used for every module
    /// * `use_lookup` - Query the attached [`LookupTable`] instead of the formula
    pub fn setup_model(&mut self, model: CellModelKind, use_lookup: bool) {
        if use_lookup && self.lookup.is_none() {
            tracing::warn!(%model, "lookup requested without a table; using the closed-form model");
        }
        self.model = Some(model);
        self.use_lookup = use_lookup;
    }

    /// Attaches a precomputed table used when lookups are enabled.
    pub fn attach_lookup(&mut self, table: LookupTable) {
        self.lookup = Some(table);
    }

    /// The attached table, used or not.
    pub fn lookup(&self) -> Option<&LookupTable> {
        self.lookup.as_ref()
    }

    /// The configured cell model, if any.
    pub fn model_kind(&self) -> Option<CellModelKind> {
        self.model
    }

    /// Whether queries are served from the attached table.
    pub fn uses_lookup(&self) -> bool {
        self.use_lookup && self.lookup.is_some()
    }

    fn cell_current(&self, num_cells: u32, voltage: f64, irradiance: f64, temperature: f64) -> SimResult<f64> {
        let model = self.model.ok_or(SimError::NoCellModel)?;
        match (&self.lookup, self.use_lookup) {
            (Some(table), true) => {
                table.ensure_model(model)?;
                table.current(num_cells, voltage, irradiance, temperature)
            }
            _ => Ok(model.current(num_cells, voltage, irradiance, temperature)),
        }
    }

    /// Current of a single module at its own voltage.
    ///
    /// # Errors
    ///
    /// Fails without a cell model or when a lookup falls outside its table.
    pub fn module_current(&self, module: &ModuleDefinition) -> SimResult<f64> {
        self.cell_current(
            module.num_cells,
            module.voltage,
            module.irradiance,
            module.temperature,
        )
    }

    /// Current of the whole source at the voltage carried by its modules.
    ///
    /// Modules are in series, so the source current is the limiting
    /// (minimum) module current. Each module receives a share of the source
    /// voltage proportional to its cell count.
    ///
    /// # Errors
    ///
    /// Fails without a cell model or when a lookup falls outside its table.
    pub fn source_current(&self, source: &SourceDefinition) -> SimResult<f64> {
        let voltage = source.values().map(|m| m.voltage).fold(0.0, f64::max);
        self.current_at(source, voltage)
    }

    fn current_at(&self, source: &SourceDefinition, voltage: f64) -> SimResult<f64> {
        if self.model.is_none() {
            return Err(SimError::NoCellModel);
        }
        let cells = f64::from(total_cells(source).max(1));
        let mut limiting: Option<f64> = None;
        for module in source.values() {
            let share = voltage * f64::from(module.num_cells) / cells;
            let current =
                self.cell_current(module.num_cells, share, module.irradiance, module.temperature)?;
            limiting = Some(limiting.map_or(current, |l| l.min(current)));
        }
        Ok(limiting.unwrap_or(0.0))
    }

    /// Sweeps the source over `[0, MAX_CELL_VOLTAGE · total cells]`.
    ///
    /// The voltage carried by the module definitions is ignored. A
    /// `resolution` below [`MIN_RESOLUTION`] (or NaN) is raised to it.
    ///
    /// # Errors
    ///
    /// Fails without a cell model or when a lookup falls outside its table.
    pub fn iv_curve(&self, source: &SourceDefinition, resolution: f64) -> SimResult<IvCurve> {
        // `max` also maps NaN to the minimum.
        let resolution = resolution.max(MIN_RESOLUTION);
        let max_voltage = MAX_CELL_VOLTAGE * f64::from(total_cells(source).max(1));
        let steps = (max_voltage / resolution + 1e-9).floor() as usize;

        let mut curve = IvCurve {
            voltages: Vec::with_capacity(steps + 1),
            currents: Vec::with_capacity(steps + 1),
        };
        for k in 0..=steps {
            let v = k as f64 * resolution;
            curve.voltages.push(v);
            curve.currents.push(self.current_at(source, v)?);
        }
        Ok(curve)
    }

    /// Edge characteristics of the source's I-V curve at `resolution`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`PvSource::iv_curve`].
    pub fn edge_characteristics(
        &self,
        source: &SourceDefinition,
        resolution: f64,
    ) -> SimResult<EdgeCharacteristics> {
        Ok(self.iv_curve(source, resolution)?.edge_characteristics())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(voltage: f64) -> SourceDefinition {
        let mut s = SourceDefinition::new();
        s.insert(
            "0".into(),
            ModuleDefinition {
                num_cells: 1,
                voltage,
                irradiance: 1000.0,
                temperature: 25.0,
            },
        );
        s
    }

    fn ideal_source() -> PvSource {
        let mut src = PvSource::new();
        src.setup_model(CellModelKind::Ideal, false);
        src
    }

    #[test]
    fn query_without_model_fails() {
        let src = PvSource::new();
        assert!(matches!(
            src.source_current(&single(0.3)),
            Err(SimError::NoCellModel)
        ));
        assert!(src.iv_curve(&single(0.3), 0.01).is_err());
    }

    #[test]
    fn sweep_covers_zero_to_max_inclusive() {
        let curve = ideal_source().iv_curve(&single(0.0), 0.01).unwrap();
        assert_eq!(curve.len(), 81);
        assert_eq!(curve.voltages[0], 0.0);
        assert!((curve.voltages[80] - 0.8).abs() < 1e-9);
    }

    #[test]
    fn edge_characteristics_are_consistent_with_curve() {
        let src = ideal_source();
        let curve = src.iv_curve(&single(0.0), 0.01).unwrap();
        let edge = curve.edge_characteristics();

        assert_eq!(edge.i_sc, curve.currents[0]);
        let p_max = curve.points().map(|(v, i)| v * i).fold(f64::MIN, f64::max);
        assert_eq!(edge.p_mpp(), p_max);
        let first_dead = curve.points().find(|&(_, i)| i <= 0.0).map(|(v, _)| v);
        assert_eq!(Some(edge.v_oc), first_dead);
        assert!(edge.v_mpp > 0.55 && edge.v_mpp < 0.7);
    }

    #[test]
    fn repeated_sweeps_are_identical() {
        let src = ideal_source();
        let a = src.iv_curve(&single(0.0), 0.005).unwrap();
        let b = src.iv_curve(&single(0.0), 0.005).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn non_positive_resolution_uses_minimum() {
        let curve = ideal_source().iv_curve(&single(0.0), 0.0).unwrap();
        assert_eq!(curve.len(), 801);
    }

    #[test]
    fn tiny_resolution_is_raised_to_minimum() {
        let curve = ideal_source().iv_curve(&single(0.0), 1e-12).unwrap();
        assert_eq!(curve.len(), 801);
        let curve = ideal_source().iv_curve(&single(0.0), f64::NAN).unwrap();
        assert_eq!(curve.len(), 801);
    }

    #[test]
    fn series_string_is_limited_by_weakest_module() {
        let src = ideal_source();
        let mut s = single(1.0);
        s.insert(
            "1".into(),
            ModuleDefinition {
                num_cells: 1,
                voltage: 1.0,
                irradiance: 300.0,
                temperature: 25.0,
            },
        );
        let shaded = src.source_current(&s).unwrap();
        let unshaded = src.source_current(&single(0.5)).unwrap();
        assert!(shaded < unshaded);
        assert!(shaded < 0.3 * 6.15 + 1e-6);
    }

    #[test]
    fn lookup_without_table_falls_back_to_formula() {
        let mut src = PvSource::new();
        src.setup_model(CellModelKind::Ideal, true);
        assert!(!src.uses_lookup());
        let via_source = src.source_current(&single(0.4)).unwrap();
        let direct = CellModelKind::Ideal.current(1, 0.4, 1000.0, 25.0);
        assert_eq!(via_source, direct);
    }

    #[test]
    fn lookup_out_of_range_propagates() {
        let mut src = PvSource::new();
        src.attach_lookup(LookupTable::build(
            CellModelKind::Ideal,
            LookupParams {
                voltage: Axis::new(0.1, 5),
                irradiance: Axis::new(500.0, 3),
                temperature: Axis::new(25.0, 2),
            },
        ));
        src.setup_model(CellModelKind::Ideal, true);
        assert!(src.uses_lookup());
        assert!(src.source_current(&single(0.3)).is_ok());
        assert!(src.source_current(&single(0.7)).is_err());
    }

    #[test]
    fn table_for_another_model_is_refused() {
        let mut src = PvSource::new();
        src.attach_lookup(LookupTable::build(
            CellModelKind::Ideal,
            LookupParams {
                voltage: Axis::new(0.1, 9),
                irradiance: Axis::new(500.0, 3),
                temperature: Axis::new(25.0, 2),
            },
        ));
        src.setup_model(CellModelKind::Nonideal, true);
        assert!(matches!(
            src.source_current(&single(0.3)),
            Err(SimError::LookupModelMismatch { .. })
        ));
    }

    #[test]
    fn model_kind_reports_selection() {
        let mut src = PvSource::new();
        assert_eq!(src.model_kind(), None);
        src.setup_model(CellModelKind::Nonideal, false);
        assert_eq!(src.model_kind().map(CellModelKind::name), Some("Nonideal"));
    }
}
