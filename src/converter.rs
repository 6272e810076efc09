//! DC-DC converter stage.

use serde::Serialize;

/// Default load-side voltage (V).
pub const DEFAULT_LOAD_VOLTAGE: f64 = 0.6;

/// Pass-through boost converter model.
///
/// Translates the tracker's target array voltage into the duty cycle that
/// would hold the array there against a fixed load voltage.
///
/// # Examples
///
/// ```
/// use pv_sim::converter::DcDcConverter;
///
/// let mut dcdc = DcDcConverter::new(0.0, 0.3);
/// dcdc.set_pulse_width(0.6);
/// assert!((dcdc.pulse_width() - 0.5).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DcDcConverter {
    array_voltage: f64,
    load_voltage: f64,
    pulse_width: f64,
}

impl Default for DcDcConverter {
    fn default() -> Self {
        Self::new(0.0, DEFAULT_LOAD_VOLTAGE)
    }
}

impl DcDcConverter {
    /// Creates a converter with zero pulse width.
    ///
    /// # Arguments
    ///
    /// * `array_voltage` - Initial array-side voltage (V)
    /// * `load_voltage` - Load-side voltage (V)
    pub fn new(array_voltage: f64, load_voltage: f64) -> Self {
        Self {
            array_voltage,
            load_voltage,
            pulse_width: 0.0,
        }
    }

    /// Reconfigures both voltages; the pulse width is kept.
    pub fn setup(&mut self, array_voltage: f64, load_voltage: f64) {
        self.array_voltage = array_voltage;
        self.load_voltage = load_voltage;
    }

    /// Drives the converter toward `target_voltage`.
    ///
    /// A positive target sets `pulse_width = 1 − load/target` and becomes the
    /// new array voltage. A non-positive target leaves all state unchanged.
    pub fn set_pulse_width(&mut self, target_voltage: f64) {
        if target_voltage > 0.0 {
            self.pulse_width = 1.0 - self.load_voltage / target_voltage;
            self.array_voltage = target_voltage;
        }
    }

    pub fn pulse_width(&self) -> f64 {
        self.pulse_width
    }

    pub fn set_load_voltage(&mut self, load_voltage: f64) {
        self.load_voltage = load_voltage;
    }

    /// Load-side voltage (V).
    pub fn voltage_out(&self) -> f64 {
        self.load_voltage
    }

    /// Last applied array-side voltage (V).
    pub fn voltage_in(&self) -> f64 {
        self.array_voltage
    }

    /// Zeroes every field.
    pub fn reset(&mut self) {
        self.array_voltage = 0.0;
        self.load_voltage = 0.0;
        self.pulse_width = 0.0;
    }
}
