//! Register map and bitfield arithmetic.
//!
//! Every configurable setting of the AS3935 lives in a few bits of a byte-wide
//! register, and most registers pack several unrelated settings together. A
//! [`Field`] names one such setting by its register address and bitmask; the
//! helpers in this module translate between the raw register byte and the
//! right-aligned field value without touching the neighbouring bits.

/// A bitfield inside one of the sensor's byte-wide registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Field {
    /// Register address (6 bits on the wire)
    pub address: u8,
    /// Bits of the register that belong to this field
    pub mask: u8,
}

impl Field {
    /// Creates a field descriptor.
    #[must_use]
    pub const fn new(address: u8, mask: u8) -> Self {
        Self { address, mask }
    }

    /// Number of positions the field is shifted up inside the register.
    #[must_use]
    pub const fn shift(&self) -> u8 {
        mask_shift(self.mask)
    }

    /// Largest value the field can hold once right-aligned.
    #[must_use]
    pub const fn max_value(&self) -> u8 {
        self.mask >> self.shift()
    }

    /// Extracts the right-aligned field value from a full register byte.
    #[must_use]
    pub const fn extract(&self, register: u8) -> u8 {
        (register & self.mask) >> self.shift()
    }

    /// Returns `register` with the field replaced by `value`.
    ///
    /// Bits of `value` that do not fit in the field are discarded, and every
    /// bit outside the mask is carried over from `register` unchanged.
    #[must_use]
    pub const fn insert(&self, register: u8, value: u8) -> u8 {
        (register & !self.mask) | ((value << self.shift()) & self.mask)
    }
}

/// Number of low-order zero bits in `mask` before its first set bit.
///
/// Returns 0 for an empty mask.
#[must_use]
pub const fn mask_shift(mask: u8) -> u8 {
    if mask == 0 {
        0
    } else {
        #[allow(clippy::cast_possible_truncation)]
        let shift = mask.trailing_zeros() as u8;
        shift
    }
}

/// Value written to a trigger register to start a device-internal action.
pub const DIRECT_COMMAND: u8 = 0x96;

/// Power down (1 = powered down)
pub const PWD: Field = Field::new(0x00, 0b0000_0001);
/// Analog front-end gain boost
pub const AFE_GB: Field = Field::new(0x00, 0b0011_1110);
/// Watchdog threshold
pub const WDTH: Field = Field::new(0x01, 0b0000_1111);
/// Noise floor level
pub const NF_LEV: Field = Field::new(0x01, 0b0111_0000);
/// Spike rejection
pub const SREJ: Field = Field::new(0x02, 0b0000_1111);
/// Minimum number of lightnings
pub const MIN_NUM_LIGH: Field = Field::new(0x02, 0b0011_0000);
/// Clear statistics
pub const CL_STAT: Field = Field::new(0x02, 0b0100_0000);
/// Interrupt source
pub const INT: Field = Field::new(0x03, 0b0000_1111);
/// Mask disturber events
pub const MASK_DIST: Field = Field::new(0x03, 0b0010_0000);
/// Frequency division ratio for antenna tuning
pub const LCO_FDIV: Field = Field::new(0x03, 0b1100_0000);
/// Energy of the single lightning, bits 0..8
pub const S_LIG_L: Field = Field::new(0x04, 0b1111_1111);
/// Energy of the single lightning, bits 8..16
pub const S_LIG_M: Field = Field::new(0x05, 0b1111_1111);
/// Energy of the single lightning, bits 16..20
pub const S_LIG_MM: Field = Field::new(0x06, 0b0000_1111);
/// Distance estimation
pub const DISTANCE: Field = Field::new(0x07, 0b0011_1111);
/// Internal tuning capacitors, 0 to 120 pF in 8 pF steps
pub const TUN_CAP: Field = Field::new(0x08, 0b0000_1111);
/// Display TRCO on the IRQ pin
pub const DISP_TRCO: Field = Field::new(0x08, 0b0010_0000);
/// Display SRCO on the IRQ pin
pub const DISP_SRCO: Field = Field::new(0x08, 0b0100_0000);
/// Display LCO on the IRQ pin
pub const DISP_LCO: Field = Field::new(0x08, 0b1000_0000);
/// All three IRQ display bits together
pub const DISP_ALL: Field = Field::new(0x08, 0b1110_0000);
/// TRCO calibration finished successfully
pub const TRCO_CALIB_DONE: Field = Field::new(0x3A, 0b1000_0000);
/// TRCO calibration failed
pub const TRCO_CALIB_NOK: Field = Field::new(0x3A, 0b0100_0000);
/// SRCO calibration finished successfully
pub const SRCO_CALIB_DONE: Field = Field::new(0x3B, 0b1000_0000);
/// SRCO calibration failed
pub const SRCO_CALIB_NOK: Field = Field::new(0x3B, 0b0100_0000);
/// Preset-default trigger
pub const PRESET_DEFAULT: Field = Field::new(0x3C, 0b1111_1111);
/// RCO calibration trigger
pub const CALIB_RCO: Field = Field::new(0x3D, 0b1111_1111);
