use crate::error::{SimError, SimResult};

/// A bounded cycle counter over the closed interval `[0, max]`.
///
/// Advancing saturates at `max`; jumping outside the interval is an error.
///
/// # Examples
///
/// ```
/// use pv_sim::sim::clock::Clock;
///
/// let mut clock = Clock::new(2);
/// assert!(clock.tick());
/// assert!(clock.tick());
/// assert!(!clock.tick());
/// assert_eq!(clock.current(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Clock {
    /// Current cycle
    current: usize,
    /// Last reachable cycle
    max: usize,
}

impl Clock {
    /// Creates a clock at cycle 0.
    ///
    /// # Arguments
    ///
    /// * `max` - The last cycle the clock may reach
    pub fn new(max: usize) -> Self {
        Self { current: 0, max }
    }

    /// Current cycle.
    pub fn current(&self) -> usize {
        self.current
    }

    /// Last reachable cycle.
    pub fn max(&self) -> usize {
        self.max
    }

    /// Advances by one cycle.
    ///
    /// # Returns
    ///
    /// * `true` - The clock moved forward
    /// * `false` - The clock was already at `max` and stays there
    pub fn tick(&mut self) -> bool {
        if self.current < self.max {
            self.current += 1;
            true
        } else {
            false
        }
    }

    /// Jumps to `cycle`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::CycleOutOfRange`] if `cycle > max`.
    pub fn set(&mut self, cycle: usize) -> SimResult<()> {
        if cycle > self.max {
            return Err(SimError::CycleOutOfRange {
                cycle,
                max: self.max,
            });
        }
        self.current = cycle;
        Ok(())
    }
}
