//! Oscillator calibration.
//!
//! The AS3935 needs two calibrations before its readings mean anything:
//!
//! * **Antenna tuning.** The LC oscillator formed by the external antenna and
//!   the internal tuning capacitors must resonate at 500 kHz ± 3.5 %. The chip
//!   cannot measure this itself, so the driver routes the divided LCO clock to
//!   the IRQ pin, counts its edges for a fixed window for each of the 16
//!   capacitor steps and keeps the step that lands closest to the expected count.
//! * **RC oscillators.** The TRCO and SRCO are trimmed by the chip against the
//!   (already tuned) LCO after a direct command; the driver only triggers it and
//!   reads back the result flags.
//!
//! Edge counting is a busy-wait over a wall-clock window. It is abstracted
//! behind [`EdgeSampler`] so the search can be driven by a deterministic source
//! in tests; [`PinSampler`] is the real implementation over an
//! [`InputPin`] and a millisecond [`Clock`].

#[cfg(not(feature = "async"))]
use embedded_hal::delay::DelayNs;
#[cfg(feature = "async")]
use embedded_hal_async::delay::DelayNs;

use embedded_hal::digital::InputPin;

use crate::interface::RegisterInterface;
use crate::register::{
    CALIB_RCO, DIRECT_COMMAND, DISP_LCO, DISP_SRCO, PWD, SRCO_CALIB_DONE, SRCO_CALIB_NOK,
    TRCO_CALIB_DONE, TRCO_CALIB_NOK, TUN_CAP,
};
use crate::settings::DivisionRatio;
use crate::{As3935, Error};

/// Time the chip needs after a command or an oscillator switch, in microseconds.
pub const SETTLE_DELAY_US: u32 = 2000;
/// Length of one edge-counting window, in milliseconds.
pub const OBSERVATION_WINDOW_MS: u32 = 100;
/// Nominal antenna resonance frequency, in Hz.
pub const LCO_NOMINAL_HZ: u32 = 500_000;
/// Accepted deviation from the target count, in per mille.
pub const TOLERANCE_PER_MILLE: u32 = 35;
/// Number of tuning capacitor steps.
pub const TUNING_STEPS: u8 = 16;

/// Expected number of IRQ level changes in one observation window.
///
/// The pin toggles twice per period of the divided LCO clock, so the target is
/// `2 * 500 kHz / ratio * 100 ms`: 6250 for a ratio of 16, 781 for 128.
#[must_use]
pub fn edge_target(ratio: DivisionRatio) -> u32 {
    2 * LCO_NOMINAL_HZ / ratio.divisor() * OBSERVATION_WINDOW_MS / 1000
}

/// Largest deviation from `target` that still fails tuning.
///
/// A run succeeds only if its best difference is strictly below this value.
#[must_use]
pub fn tolerance(target: u32) -> u32 {
    target * TOLERANCE_PER_MILLE / 1000
}

/// Monotonic millisecond time source.
///
/// The value may wrap; only differences between readings are used.
pub trait Clock {
    /// Current time in milliseconds.
    fn now_ms(&mut self) -> u32;
}

impl<F> Clock for F
where
    F: FnMut() -> u32,
{
    fn now_ms(&mut self) -> u32 {
        self()
    }
}

/// Counts level changes on the IRQ pin.
pub trait EdgeSampler {
    /// Error raised while reading the pin
    type Error: core::fmt::Debug;

    /// Busy-polls the pin for `window_ms` and returns the number of level
    /// changes observed between consecutive samples.
    ///
    /// # Errors
    ///
    /// Returns the pin's error if any sample could not be taken.
    fn count_edges(&mut self, window_ms: u32) -> Result<u32, Self::Error>;
}

/// [`EdgeSampler`] polling a GPIO input against a [`Clock`].
pub struct PinSampler<P, C> {
    pin: P,
    clock: C,
}

impl<P, C> PinSampler<P, C> {
    /// Samples `pin`, timing the window with `clock`.
    pub fn new(pin: P, clock: C) -> Self {
        Self { pin, clock }
    }

    /// Gives back the pin and the clock.
    pub fn release(self) -> (P, C) {
        (self.pin, self.clock)
    }
}

impl<P, C> EdgeSampler for PinSampler<P, C>
where
    P: InputPin,
    C: Clock,
{
    type Error = P::Error;

    fn count_edges(&mut self, window_ms: u32) -> Result<u32, Self::Error> {
        let mut last = self.pin.is_high()?;
        let mut edges = 0u32;
        let start = self.clock.now_ms();
        while self.clock.now_ms().wrapping_sub(start) < window_ms {
            let level = self.pin.is_high()?;
            if level != last {
                edges = edges.saturating_add(1);
            }
            last = level;
        }
        Ok(edges)
    }
}

/// Outcome of an antenna tuning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationResult {
    /// Capacitor step left in the tuning register (0..=15)
    pub setting: u8,
    /// Edges counted for that step
    pub measured_count: u32,
    /// Edges expected for a perfectly tuned antenna
    pub target: u32,
    /// `|target - measured_count|`
    pub difference: u32,
    /// Whether the difference is within tolerance
    pub success: bool,
}

/// Result flags reported by the chip after RC oscillator calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RcoCalibration {
    /// TRCO reported a failed calibration
    pub trco_failed: bool,
    /// SRCO reported a failed calibration
    pub srco_failed: bool,
}

impl RcoCalibration {
    /// Neither oscillator reported a failure.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        !self.trco_failed && !self.srco_failed
    }
}

/// Calibration flags of one RC oscillator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OscillatorStatus {
    /// Calibration finished successfully
    pub done: bool,
    /// Calibration failed
    pub failed: bool,
}

/// Full calibration status of both RC oscillators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RcoStatus {
    /// Timer RC oscillator
    pub trco: OscillatorStatus,
    /// System RC oscillator
    pub srco: OscillatorStatus,
}

/// Combined result of [`As3935::calibrate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    /// Antenna tuning
    pub antenna: CalibrationResult,
    /// RC oscillators
    pub rco: RcoCalibration,
}

impl Calibration {
    /// Both calibrations succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.antenna.success && self.rco.is_ok()
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    setting: u8,
    count: u32,
    difference: u32,
}

/// Keeps the capacitor step whose count is closest to the target.
///
/// Only a strictly smaller difference replaces the current best, so ties go
/// to the lowest step observed first.
#[derive(Debug)]
pub(crate) struct TuningSearch {
    target: u32,
    best: Option<Candidate>,
}

impl TuningSearch {
    pub(crate) fn new(target: u32) -> Self {
        Self { target, best: None }
    }

    /// Records the count for `setting`; returns whether it became the best.
    pub(crate) fn observe(&mut self, setting: u8, count: u32) -> bool {
        let difference = self.target.abs_diff(count);
        match self.best {
            Some(best) if difference >= best.difference => false,
            _ => {
                self.best = Some(Candidate {
                    setting,
                    count,
                    difference,
                });
                true
            }
        }
    }

    pub(crate) fn finish(&self) -> CalibrationResult {
        let best = self.best.unwrap_or(Candidate {
            setting: 0,
            count: 0,
            difference: self.target,
        });
        CalibrationResult {
            setting: best.setting,
            measured_count: best.count,
            target: self.target,
            difference: best.difference,
            success: best.difference < tolerance(self.target),
        }
    }
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), keep_self),
    async(feature = "async", keep_self)
)]
impl<IFACE, E, D> As3935<IFACE, D>
where
    IFACE: RegisterInterface<Error = E>,
    E: core::fmt::Debug,
    D: DelayNs,
{
    /// Calibrates the TRCO and SRCO.
    ///
    /// Issues the calibration command, briefly routes the SRCO to the IRQ pin
    /// while the chip trims itself, then reads back the per-oscillator failure
    /// flags. Runs once; call again to retry.
    ///
    /// **Note**: the RC oscillators are trimmed against the antenna oscillator,
    /// so run [`calibrate_resonance_frequency`](Self::calibrate_resonance_frequency)
    /// first (or use [`calibrate`](Self::calibrate)).
    ///
    /// # Returns
    ///
    /// * `Ok(RcoCalibration)` - The failure flags; check [`RcoCalibration::is_ok`]
    ///
    /// # Errors
    ///
    /// * `Err(Error::PoweredDown)` - If the sensor is powered down
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn calibrate_rco(&mut self) -> Result<RcoCalibration, Error<E>> {
        self.ensure_powered_up().await?;

        self.write_field(CALIB_RCO, DIRECT_COMMAND).await?;
        self.write_field(DISP_SRCO, 1).await?;
        self.delay.delay_us(SETTLE_DELAY_US).await;
        self.write_field(DISP_SRCO, 0).await?;

        let result = RcoCalibration {
            trco_failed: self.read_field(TRCO_CALIB_NOK).await? != 0,
            srco_failed: self.read_field(SRCO_CALIB_NOK).await? != 0,
        };
        if result.is_ok() {
            info!("RCO calibration succeeded");
        } else {
            warn!(
                "RCO calibration failed (TRCO: {}, SRCO: {})",
                result.trco_failed,
                result.srco_failed
            );
        }
        Ok(result)
    }

    /// Reads the done and failed flags of both RC oscillators.
    ///
    /// # Errors
    ///
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn rco_calibration_status(&mut self) -> Result<RcoStatus, Error<E>> {
        let trco = OscillatorStatus {
            done: self.read_field(TRCO_CALIB_DONE).await? != 0,
            failed: self.read_field(TRCO_CALIB_NOK).await? != 0,
        };
        let srco = OscillatorStatus {
            done: self.read_field(SRCO_CALIB_DONE).await? != 0,
            failed: self.read_field(SRCO_CALIB_NOK).await? != 0,
        };
        Ok(RcoStatus { trco, srco })
    }

    /// Tunes the antenna to 500 kHz using a division ratio of 16.
    ///
    /// See [`calibrate_resonance_frequency_with`](Self::calibrate_resonance_frequency_with).
    ///
    /// # Errors
    ///
    /// * `Err(Error::PoweredDown)` - If the sensor is powered down
    /// * `Err(Error::Sampler)` - If the IRQ pin could not be read
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn calibrate_resonance_frequency<S>(
        &mut self,
        sampler: &mut S,
    ) -> Result<CalibrationResult, Error<E>>
    where
        S: EdgeSampler,
    {
        self.calibrate_resonance_frequency_with(sampler, DivisionRatio::Div16)
            .await
    }

    /// Tunes the antenna's resonance frequency.
    ///
    /// Selects `ratio`, then for every capacitor step from 0 to 15 routes the
    /// divided LCO to the IRQ pin and counts its edges with `sampler` for
    /// [`OBSERVATION_WINDOW_MS`]. The step whose count is closest to
    /// [`edge_target`] is written back; on a tie the lower step wins.
    ///
    /// This blocks for roughly 1.7 seconds. The best step is left in place even
    /// when it is out of tolerance.
    ///
    /// # Arguments
    ///
    /// * `sampler` - Edge counter attached to the IRQ pin
    /// * `ratio` - LCO division ratio to measure with
    ///
    /// # Returns
    ///
    /// * `Ok(CalibrationResult)` - The chosen step and whether it is within 3.5 % of the target
    ///
    /// # Errors
    ///
    /// * `Err(Error::PoweredDown)` - If the sensor is powered down
    /// * `Err(Error::Sampler)` - If the IRQ pin could not be read
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use as3935::{As3935, I2cAddress, PinSampler, DivisionRatio};
    ///
    /// let i2c = embedded_hal_mock::eh1::i2c::Mock::new(&[]);
    /// let delay = embedded_hal_mock::eh1::delay::NoopDelay;
    /// let irq = embedded_hal_mock::eh1::digital::Mock::new(&[]);
    /// let mut millis = 0u32;
    /// let mut sampler = PinSampler::new(irq, move || { millis += 1; millis });
    ///
    /// let mut sensor = As3935::new_i2c(i2c, I2cAddress::A11, delay);
    /// sensor.begin().unwrap();
    /// let result = sensor
    ///     .calibrate_resonance_frequency_with(&mut sampler, DivisionRatio::Div16)
    ///     .unwrap();
    /// if !result.success {
    ///     println!("antenna off by {} edges at step {}", result.difference, result.setting);
    /// }
    /// ```
    pub async fn calibrate_resonance_frequency_with<S>(
        &mut self,
        sampler: &mut S,
        ratio: DivisionRatio,
    ) -> Result<CalibrationResult, Error<E>>
    where
        S: EdgeSampler,
    {
        self.ensure_powered_up().await?;
        self.set_division_ratio(ratio).await?;

        let target = edge_target(ratio);
        info!("Tuning antenna, target {} edges", target);

        let mut search = TuningSearch::new(target);
        for setting in 0..TUNING_STEPS {
            self.write_field(TUN_CAP, setting).await?;
            self.delay.delay_us(SETTLE_DELAY_US).await;
            self.write_field(DISP_LCO, 1).await?;
            self.delay.delay_us(SETTLE_DELAY_US).await;

            let counted = sampler.count_edges(OBSERVATION_WINDOW_MS);
            // the LCO must not stay on the IRQ pin, even if sampling failed
            self.write_field(DISP_LCO, 0).await?;
            let counted = counted.map_err(|_| {
                error!("Could not sample IRQ pin at tuning step {}", setting);
                Error::Sampler
            })?;

            if search.observe(setting, counted) {
                debug!("Tuning step {}: {} edges (new best)", setting, counted);
            } else {
                trace!("Tuning step {}: {} edges", setting, counted);
            }
        }

        let result = search.finish();
        self.write_field(TUN_CAP, result.setting).await?;

        if result.success {
            info!(
                "Antenna tuned to step {} ({} of {} edges)",
                result.setting,
                result.measured_count,
                target
            );
        } else {
            warn!(
                "Antenna out of tolerance at step {} ({} of {} edges)",
                result.setting,
                result.measured_count,
                target
            );
        }
        Ok(result)
    }

    /// Runs antenna tuning followed by RC oscillator calibration.
    ///
    /// # Errors
    ///
    /// * `Err(Error::PoweredDown)` - If the sensor is powered down
    /// * `Err(Error::Sampler)` - If the IRQ pin could not be read
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn calibrate<S>(&mut self, sampler: &mut S) -> Result<Calibration, Error<E>>
    where
        S: EdgeSampler,
    {
        let antenna = self.calibrate_resonance_frequency(sampler).await?;
        let rco = self.calibrate_rco().await?;
        Ok(Calibration { antenna, rco })
    }

    async fn ensure_powered_up(&mut self) -> Result<(), Error<E>> {
        if self.read_field(PWD).await? != 0 {
            warn!("Cannot calibrate while powered down");
            return Err(Error::PoweredDown);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;

    struct Levels<'a> {
        levels: &'a [bool],
        next: usize,
    }

    impl ErrorType for Levels<'_> {
        type Error = Infallible;
    }

    impl InputPin for Levels<'_> {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            let level = self.levels[self.next.min(self.levels.len() - 1)];
            self.next += 1;
            Ok(level)
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            self.is_high().map(|high| !high)
        }
    }

    struct Square {
        level: bool,
    }

    impl ErrorType for Square {
        type Error = Infallible;
    }

    impl InputPin for Square {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            self.level = !self.level;
            Ok(self.level)
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            self.is_high().map(|high| !high)
        }
    }

    fn ticking_clock(start: u32) -> impl FnMut() -> u32 {
        let mut now = start;
        move || {
            let current = now;
            now = now.wrapping_add(1);
            current
        }
    }

    #[test]
    fn targets_follow_division_ratio() {
        assert_eq!(edge_target(DivisionRatio::Div16), 6250);
        assert_eq!(edge_target(DivisionRatio::Div32), 3125);
        assert_eq!(edge_target(DivisionRatio::Div64), 1562);
        assert_eq!(edge_target(DivisionRatio::Div128), 781);
    }

    #[test]
    fn tolerance_is_three_and_a_half_percent() {
        assert_eq!(tolerance(6250), 218);
        assert_eq!(tolerance(781), 27);
    }

    #[test]
    fn success_boundary_is_strict() {
        let mut search = TuningSearch::new(6250);
        search.observe(0, 6250 - 217);
        assert!(search.finish().success);

        let mut search = TuningSearch::new(6250);
        search.observe(0, 6250 + 218);
        let result = search.finish();
        assert_eq!(result.difference, 218);
        assert!(!result.success);
    }

    #[test]
    fn ties_keep_the_first_setting() {
        let mut search = TuningSearch::new(6250);
        for setting in 0..TUNING_STEPS {
            let count = match setting {
                3 | 9 => 6200,
                _ => 5000,
            };
            search.observe(setting, count);
        }
        let result = search.finish();
        assert_eq!(result.setting, 3);
        assert_eq!(result.difference, 50);
    }

    #[test]
    fn counts_above_and_below_target_compare_by_distance() {
        let mut search = TuningSearch::new(100);
        assert!(search.observe(0, 130));
        assert!(search.observe(1, 80));
        assert!(!search.observe(2, 120));
        assert_eq!(search.finish().setting, 1);
    }

    #[test]
    fn sampler_counts_level_changes() {
        let levels = [false, true, false, true, true];
        let pin = Levels {
            levels: &levels,
            next: 0,
        };
        let mut sampler = PinSampler::new(pin, ticking_clock(0));
        // one initial sample, then four within the 5 ms window
        assert_eq!(sampler.count_edges(5), Ok(3));
    }

    #[test]
    fn sampler_runs_for_the_whole_window() {
        let mut sampler = PinSampler::new(Square { level: false }, ticking_clock(0));
        assert_eq!(sampler.count_edges(OBSERVATION_WINDOW_MS), Ok(99));
    }

    #[test]
    fn sampler_survives_clock_wraparound() {
        let mut sampler = PinSampler::new(Square { level: false }, ticking_clock(u32::MAX - 1));
        assert_eq!(sampler.count_edges(3), Ok(2));
    }
}
