//! Typed values for the enumerated sensor settings.

/// Analog front-end gain preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AfeSetting {
    /// Gain boost for indoor operation
    Indoor,
    /// Gain boost for outdoor operation
    Outdoor,
    /// Any other raw gain boost value
    Unknown(u8),
}

impl From<AfeSetting> for u8 {
    fn from(setting: AfeSetting) -> Self {
        match setting {
            AfeSetting::Indoor => 0b1_0010,
            AfeSetting::Outdoor => 0b0_1110,
            AfeSetting::Unknown(value) => value,
        }
    }
}

impl From<u8> for AfeSetting {
    fn from(value: u8) -> Self {
        match value {
            0b1_0010 => AfeSetting::Indoor,
            0b0_1110 => AfeSetting::Outdoor,
            _ => {
                warn!("Unknown AFE gain boost value: {}", value);
                AfeSetting::Unknown(value)
            }
        }
    }
}

/// Number of lightning events within 15 minutes before the first interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MinimumLightnings {
    /// 1 event
    One,
    /// 5 events
    Five,
    /// 9 events
    Nine,
    /// 16 events
    Sixteen,
}

impl MinimumLightnings {
    /// Event count this setting stands for.
    #[must_use]
    pub fn count(self) -> u8 {
        match self {
            MinimumLightnings::One => 1,
            MinimumLightnings::Five => 5,
            MinimumLightnings::Nine => 9,
            MinimumLightnings::Sixteen => 16,
        }
    }
}

impl From<MinimumLightnings> for u8 {
    fn from(value: MinimumLightnings) -> Self {
        match value {
            MinimumLightnings::One => 0b00,
            MinimumLightnings::Five => 0b01,
            MinimumLightnings::Nine => 0b10,
            MinimumLightnings::Sixteen => 0b11,
        }
    }
}

impl From<u8> for MinimumLightnings {
    /// Only the two low bits are significant.
    fn from(value: u8) -> Self {
        match value & 0b11 {
            0b00 => MinimumLightnings::One,
            0b01 => MinimumLightnings::Five,
            0b10 => MinimumLightnings::Nine,
            _ => MinimumLightnings::Sixteen,
        }
    }
}

/// Division applied to the antenna oscillator (LCO) before it is shown on IRQ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DivisionRatio {
    /// Divide by 16
    Div16,
    /// Divide by 32
    Div32,
    /// Divide by 64
    Div64,
    /// Divide by 128
    Div128,
}

impl DivisionRatio {
    /// The divisor itself.
    #[must_use]
    pub fn divisor(self) -> u32 {
        match self {
            DivisionRatio::Div16 => 16,
            DivisionRatio::Div32 => 32,
            DivisionRatio::Div64 => 64,
            DivisionRatio::Div128 => 128,
        }
    }
}

impl From<DivisionRatio> for u8 {
    fn from(ratio: DivisionRatio) -> Self {
        match ratio {
            DivisionRatio::Div16 => 0b00,
            DivisionRatio::Div32 => 0b01,
            DivisionRatio::Div64 => 0b10,
            DivisionRatio::Div128 => 0b11,
        }
    }
}

impl From<u8> for DivisionRatio {
    /// Only the two low bits are significant.
    fn from(value: u8) -> Self {
        match value & 0b11 {
            0b00 => DivisionRatio::Div16,
            0b01 => DivisionRatio::Div32,
            0b10 => DivisionRatio::Div64,
            _ => DivisionRatio::Div128,
        }
    }
}

/// Reason the IRQ pin was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptSource {
    /// No event flagged; the distance estimate was purged
    DistanceChanged,
    /// Noise level too high
    NoiseHigh,
    /// Disturber detected
    Disturber,
    /// Lightning detected
    Lightning,
    /// Any other raw value
    Unknown(u8),
}

impl From<InterruptSource> for u8 {
    fn from(source: InterruptSource) -> Self {
        match source {
            InterruptSource::DistanceChanged => 0b0000,
            InterruptSource::NoiseHigh => 0b0001,
            InterruptSource::Disturber => 0b0100,
            InterruptSource::Lightning => 0b1000,
            InterruptSource::Unknown(value) => value,
        }
    }
}

impl From<u8> for InterruptSource {
    fn from(value: u8) -> Self {
        match value {
            0b0000 => InterruptSource::DistanceChanged,
            0b0001 => InterruptSource::NoiseHigh,
            0b0100 => InterruptSource::Disturber,
            0b1000 => InterruptSource::Lightning,
            _ => {
                warn!("Unknown interrupt source: {}", value);
                InterruptSource::Unknown(value)
            }
        }
    }
}

/// Estimated distance to the head of the storm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StormDistance {
    /// Storm is overhead
    Overhead,
    /// Distance in kilometres
    Km(u8),
    /// Storm is out of range
    OutOfRange,
    /// Raw value the chip never reports as a distance (0)
    Unknown(u8),
}

impl StormDistance {
    /// Raw field value reported for a storm that is out of range.
    pub const OUT_OF_RANGE: u8 = 0b11_1111;

    /// Raw 6-bit field value.
    #[must_use]
    pub fn raw(self) -> u8 {
        match self {
            StormDistance::Overhead => 1,
            StormDistance::Km(km) => km,
            StormDistance::OutOfRange => Self::OUT_OF_RANGE,
            StormDistance::Unknown(value) => value,
        }
    }
}

impl From<u8> for StormDistance {
    fn from(value: u8) -> Self {
        match value {
            Self::OUT_OF_RANGE => StormDistance::OutOfRange,
            0 => {
                warn!("Unknown storm distance value: {}", value);
                StormDistance::Unknown(value)
            }
            1 => StormDistance::Overhead,
            km => StormDistance::Km(km),
        }
    }
}

/// Which internal oscillator is routed to the IRQ pin.
///
/// The display bits are mutually exclusive; selecting one clears the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrqDisplay {
    /// IRQ pin carries interrupts only
    None,
    /// Timer RC oscillator
    Trco,
    /// System RC oscillator
    Srco,
    /// Antenna (LC) oscillator
    Lco,
}

impl From<IrqDisplay> for u8 {
    /// Value for the combined 3-bit display field (TRCO, SRCO, LCO from low to high).
    fn from(display: IrqDisplay) -> Self {
        match display {
            IrqDisplay::None => 0b000,
            IrqDisplay::Trco => 0b001,
            IrqDisplay::Srco => 0b010,
            IrqDisplay::Lco => 0b100,
        }
    }
}
