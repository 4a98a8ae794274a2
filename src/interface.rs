//! Byte-level register transports.
//!
//! The AS3935 speaks the same single-byte register protocol over I2C and SPI.
//! [`RegisterInterface`] is the seam between the two: the driver only ever reads
//! or writes one whole register byte, and each transport frames that access for
//! its bus. One bus transaction per call, no retries.

#[cfg(not(feature = "async"))]
use embedded_hal::{i2c::I2c, spi::SpiDevice};
#[cfg(feature = "async")]
use embedded_hal_async::{i2c::I2c, spi::SpiDevice};

use embedded_hal::spi::{Mode, Operation, MODE_1};

/// Register addresses are six bits wide on the wire.
const ADDRESS_MASK: u8 = 0b0011_1111;
/// SPI mode bits `01` select a register read.
const SPI_READ: u8 = 0b0100_0000;

/// Single-register access over a physical bus.
#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), keep_self),
    async(feature = "async", keep_self)
)]
#[allow(async_fn_in_trait)]
pub trait RegisterInterface {
    /// Error reported by the underlying bus
    type Error: core::fmt::Debug;

    /// Reads the full byte stored at `register`.
    ///
    /// # Errors
    ///
    /// * `Err(Self::Error)` - If the bus transaction failed
    async fn read_register(&mut self, register: u8) -> Result<u8, Self::Error>;

    /// Overwrites the full byte stored at `register`.
    ///
    /// # Errors
    ///
    /// * `Err(Self::Error)` - If the bus transaction failed
    async fn write_register(&mut self, register: u8, value: u8) -> Result<(), Self::Error>;

    /// Whether the transport was constructed with usable parameters.
    ///
    /// Checked by `begin()` before any bus traffic is issued.
    fn is_valid(&self) -> bool {
        true
    }
}

/// I2C sub-addresses selectable with the A0/A1 pins.
///
/// `0b00` is not a valid address for the AS3935.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cAddress {
    /// A1 low, A0 high
    A01 = 0b01,
    /// A1 high, A0 low
    A10 = 0b10,
    /// A1 high, A0 high (board default)
    A11 = 0b11,
}

impl From<I2cAddress> for u8 {
    fn from(address: I2cAddress) -> Self {
        address as u8
    }
}

impl TryFrom<u8> for I2cAddress {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0b01 => Ok(I2cAddress::A01),
            0b10 => Ok(I2cAddress::A10),
            0b11 => Ok(I2cAddress::A11),
            other => Err(other),
        }
    }
}

/// AS3935 attached to an I2C bus.
pub struct I2cInterface<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C> I2cInterface<I2C> {
    /// Wraps `i2c` for the sensor at `address`.
    ///
    /// Any `u8` is accepted here; an address outside [`I2cAddress`] makes
    /// `begin()` fail without touching the bus.
    pub fn new(i2c: I2C, address: impl Into<u8>) -> Self {
        Self {
            i2c,
            address: address.into(),
        }
    }

    /// The 7-bit address this interface talks to.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Gives back the bus.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), keep_self),
    async(feature = "async", keep_self)
)]
impl<I2C: I2c> RegisterInterface for I2cInterface<I2C> {
    type Error = I2C::Error;

    async fn read_register(&mut self, register: u8) -> Result<u8, Self::Error> {
        let mut buffer = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register & ADDRESS_MASK], &mut buffer)
            .await?;
        Ok(buffer[0])
    }

    async fn write_register(&mut self, register: u8, value: u8) -> Result<(), Self::Error> {
        self.i2c
            .write(self.address, &[register & ADDRESS_MASK, value])
            .await
    }

    fn is_valid(&self) -> bool {
        I2cAddress::try_from(self.address).is_ok()
    }
}

/// Bit order on the SPI wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitOrder {
    /// Most significant bit first
    MsbFirst,
    /// Least significant bit first
    LsbFirst,
}

/// Bus settings the SPI peripheral must be configured with.
///
/// `SpiDevice` leaves clocking to the HAL, so these are published for the
/// application to apply when it sets up the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiConfig {
    /// Maximum SCLK frequency in Hz
    pub frequency_hz: u32,
    /// Clock polarity and phase
    pub mode: Mode,
    /// Bit order
    pub bit_order: BitOrder,
}

impl SpiConfig {
    /// 2 MHz, MSB first, CPOL = 0, CPHA = 1.
    pub const DEFAULT: Self = Self {
        frequency_hz: 2_000_000,
        mode: MODE_1,
        bit_order: BitOrder::MsbFirst,
    };
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// AS3935 attached to an SPI bus.
///
/// Chip select belongs to the `SpiDevice`: it is asserted for the
/// command/data byte pair of one access and released right after.
pub struct SpiInterface<SPI> {
    spi: SPI,
    config: SpiConfig,
}

impl<SPI> SpiInterface<SPI> {
    /// Wraps `spi` with the default [`SpiConfig`].
    pub fn new(spi: SPI) -> Self {
        Self::with_config(spi, SpiConfig::DEFAULT)
    }

    /// Wraps `spi` with an explicit configuration.
    pub fn with_config(spi: SPI, config: SpiConfig) -> Self {
        Self { spi, config }
    }

    /// Bus settings this interface expects.
    pub fn config(&self) -> &SpiConfig {
        &self.config
    }

    /// Gives back the bus.
    pub fn release(self) -> SPI {
        self.spi
    }
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), keep_self),
    async(feature = "async", keep_self)
)]
impl<SPI: SpiDevice> RegisterInterface for SpiInterface<SPI> {
    type Error = SPI::Error;

    async fn read_register(&mut self, register: u8) -> Result<u8, Self::Error> {
        let command = [(register & ADDRESS_MASK) | SPI_READ];
        let mut buffer = [0u8; 1];
        self.spi
            .transaction(&mut [Operation::Write(&command), Operation::Read(&mut buffer)])
            .await?;
        Ok(buffer[0])
    }

    async fn write_register(&mut self, register: u8, value: u8) -> Result<(), Self::Error> {
        self.spi.write(&[register & ADDRESS_MASK, value]).await
    }
}
