//! # AS3935 Franklin Lightning Sensor Driver
//!
//! This crate provides a `no_std` driver for the ams AS3935 lightning sensor, reachable
//! over either I2C or SPI. Blocking by default; enable the `async` feature for an
//! `embedded-hal-async` version of the same API.
//!
//! Every setting of the chip is a bitfield packed into a shared byte-wide register.
//! The driver reads and writes these fields with a masked read-modify-write that
//! never disturbs neighbouring fields, and implements the two calibration procedures
//! the sensor requires before its readings can be trusted.
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use as3935::{As3935, AfeSetting, I2cAddress, InterruptSource, PinSampler, StormDistance};
//!
//! let i2c = embedded_hal_mock::eh1::i2c::Mock::new(&[]);
//! let delay = embedded_hal_mock::eh1::delay::NoopDelay;
//! let irq = embedded_hal_mock::eh1::digital::Mock::new(&[]);
//! let mut millis = 0u32;
//! let mut sampler = PinSampler::new(irq, move || { millis += 1; millis });
//!
//! let mut sensor = As3935::new_i2c(i2c, I2cAddress::A11, delay);
//! sensor.begin().unwrap();
//! sensor.set_afe(AfeSetting::Outdoor).unwrap();
//!
//! let calibration = sensor.calibrate(&mut sampler).unwrap();
//! assert!(calibration.is_ok());
//!
//! // After the IRQ pin went high
//! if sensor.get_interrupt_source().unwrap() == InterruptSource::Lightning {
//!     match sensor.get_storm_distance().unwrap() {
//!         StormDistance::Km(km) => println!("Lightning {} km away", km),
//!         StormDistance::Overhead => println!("Lightning overhead"),
//!         StormDistance::OutOfRange => println!("Lightning out of range"),
//!         StormDistance::Unknown(raw) => println!("Unexpected distance value {}", raw),
//!     }
//! }
//! ```
//!
//! ## Concurrency
//!
//! Field writes are a read followed by a write of the whole register. Nothing in
//! the driver locks; all access to one sensor must be serialized by the owner.
#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod fmt; // <-- must be first module!

pub mod calibration;
pub mod interface;
pub mod register;
pub mod settings;

#[cfg(not(feature = "async"))]
use embedded_hal::delay::DelayNs;
#[cfg(feature = "async")]
use embedded_hal_async::delay::DelayNs;

pub use calibration::{
    edge_target, tolerance, Calibration, CalibrationResult, Clock, EdgeSampler, PinSampler,
    OscillatorStatus, RcoCalibration, RcoStatus,
};
pub use interface::{BitOrder, I2cAddress, I2cInterface, RegisterInterface, SpiConfig, SpiInterface};
pub use register::{mask_shift, Field};
pub use settings::{
    AfeSetting, DivisionRatio, InterruptSource, IrqDisplay, MinimumLightnings, StormDistance,
};

use calibration::SETTLE_DELAY_US;
use register::{
    AFE_GB, CL_STAT, DIRECT_COMMAND, DISP_ALL, DISTANCE, INT, LCO_FDIV, MASK_DIST, MIN_NUM_LIGH,
    NF_LEV, PRESET_DEFAULT, PWD, SREJ, S_LIG_L, S_LIG_M, S_LIG_MM, TUN_CAP, WDTH,
};

/// Highest noise floor level
const MAX_NOISE_FLOOR: u8 = 7;
/// Highest watchdog threshold
const MAX_WATCHDOG_THRESHOLD: u8 = 10;
/// Highest spike rejection setting
const MAX_SPIKE_REJECTION: u8 = 10;
/// Highest tuning capacitor step
const MAX_ANTENNA_TUNING: u8 = 15;

/// AS3935 lightning sensor driver.
///
/// Generic over the register transport ([`I2cInterface`] or [`SpiInterface`],
/// or any other [`RegisterInterface`]) and a delay provider. The transport is
/// chosen once at construction.
pub struct As3935<IFACE, D> {
    /// Register transport
    iface: IFACE,
    /// Delay implementation for settle times
    delay: D,
}

impl<IFACE, D> As3935<IFACE, D> {
    /// Creates a driver over an already configured transport.
    ///
    /// The sensor is not touched until [`begin`](Self::begin) is called.
    pub fn new(iface: IFACE, delay: D) -> Self {
        Self { iface, delay }
    }

    /// The transport in use.
    pub fn interface(&self) -> &IFACE {
        &self.iface
    }

    /// Gives back the transport and the delay provider.
    pub fn release(self) -> (IFACE, D) {
        (self.iface, self.delay)
    }
}

impl<I2C, D> As3935<I2cInterface<I2C>, D> {
    /// Creates a driver for a sensor on an I2C bus.
    ///
    /// # Arguments
    ///
    /// * `i2c` - I2C bus the sensor is attached to
    /// * `address` - Sub-address selected with the A0/A1 pins, an [`I2cAddress`] or raw `u8`
    /// * `delay` - Delay implementation for settle times
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use as3935::{As3935, I2cAddress};
    ///
    /// let i2c = embedded_hal_mock::eh1::i2c::Mock::new(&[]);
    /// let delay = embedded_hal_mock::eh1::delay::NoopDelay;
    ///
    /// let mut sensor = As3935::new_i2c(i2c, I2cAddress::A11, delay);
    /// ```
    pub fn new_i2c(i2c: I2C, address: impl Into<u8>, delay: D) -> Self {
        Self::new(I2cInterface::new(i2c, address), delay)
    }
}

impl<SPI, D> As3935<SpiInterface<SPI>, D> {
    /// Creates a driver for a sensor on an SPI bus.
    ///
    /// The bus must be set up according to [`SpiConfig::DEFAULT`].
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use as3935::As3935;
    ///
    /// let spi = embedded_hal_mock::eh1::spi::Mock::new(&[]);
    /// let delay = embedded_hal_mock::eh1::delay::NoopDelay;
    ///
    /// let mut sensor = As3935::new_spi(spi, delay);
    /// sensor.begin().unwrap();
    /// ```
    pub fn new_spi(spi: SPI, delay: D) -> Self {
        Self::new(SpiInterface::new(spi), delay)
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
    /// Validates the transport and resets the sensor to its defaults.
    ///
    /// **Important**: call this once before anything else. Calibration should
    /// follow, since resetting clears the tuning.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the sensor was reset
    ///
    /// # Errors
    ///
    /// * `Err(Error::InvalidAddress)` - If the I2C address is not one of the three
    ///   selectable sub-addresses. No bus traffic is issued in that case.
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use as3935::{As3935, Error};
    ///
    /// let i2c = embedded_hal_mock::eh1::i2c::Mock::new(&[]);
    /// let delay = embedded_hal_mock::eh1::delay::NoopDelay;
    ///
    /// let mut sensor = As3935::new_i2c(i2c, 0x00u8, delay);
    /// assert!(matches!(sensor.begin(), Err(Error::InvalidAddress)));
    /// ```
    pub async fn begin(&mut self) -> Result<(), Error<E>> {
        if !self.iface.is_valid() {
            error!("Invalid transport configuration");
            return Err(Error::InvalidAddress);
        }
        info!("Resetting sensor to defaults");
        self.reset_to_defaults().await
    }

    /// Resets every register to its power-on default.
    ///
    /// # Errors
    ///
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn reset_to_defaults(&mut self) -> Result<(), Error<E>> {
        self.write_field(PRESET_DEFAULT, DIRECT_COMMAND).await?;
        self.delay.delay_us(SETTLE_DELAY_US).await;
        Ok(())
    }

    /// Reads a bitfield, right-aligned.
    ///
    /// This is a low-level function; the typed accessors cover every documented field.
    ///
    /// # Errors
    ///
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use as3935::{As3935, register};
    ///
    /// let i2c = embedded_hal_mock::eh1::i2c::Mock::new(&[]);
    /// let delay = embedded_hal_mock::eh1::delay::NoopDelay;
    /// let mut sensor = As3935::new_i2c(i2c, 0b11u8, delay);
    ///
    /// let noise_floor = sensor.read_field(register::NF_LEV).unwrap();
    /// ```
    pub async fn read_field(&mut self, field: Field) -> Result<u8, Error<E>> {
        let register = self.iface.read_register(field.address).await?;
        Ok(field.extract(register))
    }

    /// Writes a bitfield, leaving all other bits of its register untouched.
    ///
    /// Reads the register, replaces the masked bits with `value` shifted into
    /// place and writes the byte back. Bits of `value` that do not fit the field
    /// are dropped. The read and the write are separate bus transactions.
    ///
    /// # Errors
    ///
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn write_field(&mut self, field: Field, value: u8) -> Result<(), Error<E>> {
        let current = self.iface.read_register(field.address).await?;
        let updated = field.insert(current, value);
        trace!(
            "Register {}: {} -> {}",
            field.address,
            current,
            updated
        );
        self.iface.write_register(field.address, updated).await?;
        Ok(())
    }

    /// Whether the sensor is powered down.
    ///
    /// # Errors
    ///
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn is_powered_down(&mut self) -> Result<bool, Error<E>> {
        Ok(self.read_field(PWD).await? != 0)
    }

    /// Powers the sensor down (`true`) or up (`false`).
    ///
    /// **Note**: the RC oscillators must be recalibrated after powering up;
    /// run [`calibrate_rco`](Self::calibrate_rco) afterwards.
    ///
    /// # Errors
    ///
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn set_powered_down(&mut self, powered_down: bool) -> Result<(), Error<E>> {
        self.write_field(PWD, u8::from(powered_down)).await
    }

    /// Analog front-end gain boost.
    ///
    /// # Errors
    ///
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn get_afe(&mut self) -> Result<AfeSetting, Error<E>> {
        Ok(AfeSetting::from(self.read_field(AFE_GB).await?))
    }

    /// Sets the analog front-end gain boost.
    ///
    /// # Errors
    ///
    /// * `Err(Error::InvalidArgument)` - If an `Unknown` value does not fit the 5-bit field
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn set_afe(&mut self, setting: AfeSetting) -> Result<(), Error<E>> {
        let value = u8::from(setting);
        check_range::<E>("AFE gain boost", value, AFE_GB.max_value())?;
        self.write_field(AFE_GB, value).await
    }

    /// Noise floor level (0..=7).
    ///
    /// # Errors
    ///
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn get_noise_floor(&mut self) -> Result<u8, Error<E>> {
        self.read_field(NF_LEV).await
    }

    /// Sets the noise floor level.
    ///
    /// # Errors
    ///
    /// * `Err(Error::InvalidArgument)` - If `level` is above 7
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn set_noise_floor(&mut self, level: u8) -> Result<(), Error<E>> {
        check_range::<E>("noise floor", level, MAX_NOISE_FLOOR)?;
        self.write_field(NF_LEV, level).await
    }

    /// Watchdog threshold (0..=10).
    ///
    /// # Errors
    ///
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn get_watchdog_threshold(&mut self) -> Result<u8, Error<E>> {
        self.read_field(WDTH).await
    }

    /// Sets the watchdog threshold. Higher values reject more disturbers at
    /// the cost of detection efficiency.
    ///
    /// # Errors
    ///
    /// * `Err(Error::InvalidArgument)` - If `threshold` is above 10
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn set_watchdog_threshold(&mut self, threshold: u8) -> Result<(), Error<E>> {
        check_range::<E>("watchdog threshold", threshold, MAX_WATCHDOG_THRESHOLD)?;
        self.write_field(WDTH, threshold).await
    }

    /// Spike rejection (0..=10).
    ///
    /// # Errors
    ///
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn get_spike_rejection(&mut self) -> Result<u8, Error<E>> {
        self.read_field(SREJ).await
    }

    /// Sets the spike rejection.
    ///
    /// # Errors
    ///
    /// * `Err(Error::InvalidArgument)` - If `rejection` is above 10
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn set_spike_rejection(&mut self, rejection: u8) -> Result<(), Error<E>> {
        check_range::<E>("spike rejection", rejection, MAX_SPIKE_REJECTION)?;
        self.write_field(SREJ, rejection).await
    }

    /// Minimum number of lightnings before the first interrupt.
    ///
    /// # Errors
    ///
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn get_minimum_lightnings(&mut self) -> Result<MinimumLightnings, Error<E>> {
        Ok(MinimumLightnings::from(self.read_field(MIN_NUM_LIGH).await?))
    }

    /// Sets the minimum number of lightnings before the first interrupt.
    ///
    /// # Errors
    ///
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn set_minimum_lightnings(
        &mut self,
        minimum: MinimumLightnings,
    ) -> Result<(), Error<E>> {
        self.write_field(MIN_NUM_LIGH, minimum.into()).await
    }

    /// Clears the lightning distance statistics.
    ///
    /// Toggles the clear-statistics bit high, low, high.
    ///
    /// # Errors
    ///
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn clear_statistics(&mut self) -> Result<(), Error<E>> {
        self.write_field(CL_STAT, 1).await?;
        self.write_field(CL_STAT, 0).await?;
        self.write_field(CL_STAT, 1).await
    }

    /// Why the IRQ pin was raised.
    ///
    /// The chip needs 2 ms after raising IRQ before this register is valid.
    ///
    /// # Errors
    ///
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn get_interrupt_source(&mut self) -> Result<InterruptSource, Error<E>> {
        Ok(InterruptSource::from(self.read_field(INT).await?))
    }

    /// Whether disturber events are masked.
    ///
    /// # Errors
    ///
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn get_mask_disturbers(&mut self) -> Result<bool, Error<E>> {
        Ok(self.read_field(MASK_DIST).await? != 0)
    }

    /// Stops (`true`) or resumes (`false`) interrupts for disturber events.
    ///
    /// # Errors
    ///
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn set_mask_disturbers(&mut self, masked: bool) -> Result<(), Error<E>> {
        self.write_field(MASK_DIST, u8::from(masked)).await
    }

    /// LCO division ratio used while the antenna oscillator is shown on IRQ.
    ///
    /// # Errors
    ///
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn get_division_ratio(&mut self) -> Result<DivisionRatio, Error<E>> {
        Ok(DivisionRatio::from(self.read_field(LCO_FDIV).await?))
    }

    /// Sets the LCO division ratio.
    ///
    /// # Errors
    ///
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn set_division_ratio(&mut self, ratio: DivisionRatio) -> Result<(), Error<E>> {
        self.write_field(LCO_FDIV, ratio.into()).await
    }

    /// Energy of the last lightning.
    ///
    /// A 20-bit value spread across three registers. It has no physical unit
    /// and is only meaningful compared with other readings.
    ///
    /// # Errors
    ///
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn get_energy(&mut self) -> Result<u32, Error<E>> {
        let lsb = u32::from(self.read_field(S_LIG_L).await?);
        let msb = u32::from(self.read_field(S_LIG_M).await?);
        let upper = u32::from(self.read_field(S_LIG_MM).await?);
        Ok(lsb | (msb << 8) | (upper << 16))
    }

    /// Estimated distance to the head of the storm.
    ///
    /// # Errors
    ///
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn get_storm_distance(&mut self) -> Result<StormDistance, Error<E>> {
        Ok(StormDistance::from(self.read_field(DISTANCE).await?))
    }

    /// Current tuning capacitor step (0..=15, 8 pF each).
    ///
    /// # Errors
    ///
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn get_antenna_tuning(&mut self) -> Result<u8, Error<E>> {
        self.read_field(TUN_CAP).await
    }

    /// Sets the tuning capacitor step.
    ///
    /// # Errors
    ///
    /// * `Err(Error::InvalidArgument)` - If `tuning` is above 15
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn set_antenna_tuning(&mut self, tuning: u8) -> Result<(), Error<E>> {
        check_range::<E>("antenna tuning", tuning, MAX_ANTENNA_TUNING)?;
        self.write_field(TUN_CAP, tuning).await
    }

    /// Routes one of the internal oscillators to the IRQ pin, or none.
    ///
    /// # Errors
    ///
    /// * `Err(Error::Bus(E))` - If there was a bus communication error
    pub async fn set_irq_display(&mut self, display: IrqDisplay) -> Result<(), Error<E>> {
        self.write_field(DISP_ALL, display.into()).await
    }
}

fn check_range<E: core::fmt::Debug>(what: &str, value: u8, max: u8) -> Result<(), Error<E>> {
    if value > max {
        error!("Invalid {}: {} (max {})", what, value, max);
        return Err(Error::InvalidArgument);
    }
    Ok(())
}

/// Error type for AS3935 sensor operations.
///
/// Calibration results that are out of tolerance are not errors; they are
/// reported through [`CalibrationResult::success`] and [`RcoCalibration::is_ok`].
///
/// # Examples
///
/// ```rust,no_run
/// use as3935::Error;
///
/// let i2c = embedded_hal_mock::eh1::i2c::Mock::new(&[]);
/// let delay = embedded_hal_mock::eh1::delay::NoopDelay;
/// let mut sensor = as3935::As3935::new_i2c(i2c, 0b11u8, delay);
///
/// match sensor.calibrate_rco() {
///     Ok(result) if result.is_ok() => println!("RC oscillators calibrated"),
///     Ok(_) => println!("RC oscillator calibration failed"),
///     Err(Error::PoweredDown) => println!("Sensor is powered down"),
///     Err(Error::Bus(e)) => println!("Bus communication error: {:?}", e),
///     Err(e) => println!("Unexpected error: {}", e),
/// }
/// ```
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E: core::fmt::Debug> {
    /// Communication error from the underlying bus
    Bus(E),
    /// The I2C address is not one of the selectable sub-addresses
    InvalidAddress,
    /// Invalid parameter value provided
    InvalidArgument,
    /// Calibration requested while the sensor is powered down
    PoweredDown,
    /// The IRQ pin could not be sampled during calibration
    Sampler,
}

impl<E: core::fmt::Debug> core::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl<E: core::fmt::Debug> From<E> for Error<E> {
    fn from(error: E) -> Self {
        Error::Bus(error)
    }
}
