#![cfg(not(feature = "async"))]

use as3935::{As3935, Error, I2cAddress, SpiConfig, StormDistance};
use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
use embedded_hal::spi::MODE_1;
use embedded_hal_mock::eh1::delay::NoopDelay;
use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};

const ADDRESS: u8 = 0b11;

fn finish_i2c(sensor: As3935<as3935::I2cInterface<I2cMock>, NoopDelay>) {
    let (iface, _) = sensor.release();
    iface.release().done();
}

fn finish_spi(sensor: As3935<as3935::SpiInterface<SpiMock<u8>>, NoopDelay>) {
    let (iface, _) = sensor.release();
    iface.release().done();
}

fn spi_read(register: u8, value: u8) -> Vec<SpiTransaction<u8>> {
    vec![
        SpiTransaction::transaction_start(),
        SpiTransaction::write_vec(vec![register | 0b0100_0000]),
        SpiTransaction::read_vec(vec![value]),
        SpiTransaction::transaction_end(),
    ]
}

fn spi_write(register: u8, value: u8) -> Vec<SpiTransaction<u8>> {
    vec![
        SpiTransaction::transaction_start(),
        SpiTransaction::write_vec(vec![register, value]),
        SpiTransaction::transaction_end(),
    ]
}

#[test]
fn begin_rejects_invalid_i2c_addresses_without_bus_traffic() {
    for address in [0x00u8, 0x04, 0x29, 0x7F, 0xFF] {
        let i2c = I2cMock::new(&[]);
        let mut sensor = As3935::new_i2c(i2c, address, NoopDelay);
        assert!(
            matches!(sensor.begin(), Err(Error::InvalidAddress)),
            "address {address:#04x} accepted"
        );
        finish_i2c(sensor);
    }
}

#[test]
fn begin_resets_to_defaults_on_valid_address() {
    for address in [I2cAddress::A01, I2cAddress::A10, I2cAddress::A11] {
        let raw = u8::from(address);
        let i2c = I2cMock::new(&[
            I2cTransaction::write_read(raw, vec![0x3C], vec![0x00]),
            I2cTransaction::write(raw, vec![0x3C, 0x96]),
        ]);
        let mut sensor = As3935::new_i2c(i2c, address, NoopDelay);
        sensor.begin().unwrap();
        finish_i2c(sensor);
    }
}

#[test]
fn i2c_field_read_extracts_masked_bits() {
    let i2c = I2cMock::new(&[I2cTransaction::write_read(
        ADDRESS,
        vec![0x01],
        vec![0b1101_0010],
    )]);
    let mut sensor = As3935::new_i2c(i2c, ADDRESS, NoopDelay);
    assert_eq!(sensor.get_noise_floor().unwrap(), 0b101);
    finish_i2c(sensor);
}

#[test]
fn i2c_field_write_preserves_neighbours() {
    let i2c = I2cMock::new(&[
        I2cTransaction::write_read(ADDRESS, vec![0x00], vec![0b0010_0100]),
        I2cTransaction::write(ADDRESS, vec![0x00, 0b0010_0101]),
    ]);
    let mut sensor = As3935::new_i2c(i2c, ADDRESS, NoopDelay);
    sensor.set_powered_down(true).unwrap();
    finish_i2c(sensor);
}

#[test]
fn i2c_nack_is_reported_as_bus_error() {
    let i2c = I2cMock::new(&[I2cTransaction::write_read(ADDRESS, vec![0x07], vec![0x00])
        .with_error(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))]);
    let mut sensor = As3935::new_i2c(i2c, ADDRESS, NoopDelay);
    assert!(matches!(
        sensor.get_storm_distance(),
        Err(Error::Bus(ErrorKind::NoAcknowledge(_)))
    ));
    finish_i2c(sensor);
}

#[test]
fn failed_read_aborts_field_write() {
    // no write transaction may follow the failed read
    let i2c = I2cMock::new(&[I2cTransaction::write_read(ADDRESS, vec![0x08], vec![0x00])
        .with_error(ErrorKind::ArbitrationLoss)]);
    let mut sensor = As3935::new_i2c(i2c, ADDRESS, NoopDelay);
    assert!(matches!(
        sensor.set_antenna_tuning(4),
        Err(Error::Bus(ErrorKind::ArbitrationLoss))
    ));
    finish_i2c(sensor);
}

#[test]
fn spi_read_sets_read_mode_bits() {
    let spi = SpiMock::new(&spi_read(0x07, 0b1100_1010));
    let mut sensor = As3935::new_spi(spi, NoopDelay);
    assert_eq!(sensor.get_storm_distance().unwrap(), StormDistance::Km(10));
    finish_spi(sensor);
}

#[test]
fn spi_field_write_is_read_modify_write() {
    let mut expectations = spi_read(0x08, 0b1000_0011);
    expectations.extend(spi_write(0x08, 0b1000_1001));
    let spi = SpiMock::new(&expectations);
    let mut sensor = As3935::new_spi(spi, NoopDelay);
    sensor.set_antenna_tuning(9).unwrap();
    finish_spi(sensor);
}

#[test]
fn spi_begin_resets_to_defaults() {
    let mut expectations = spi_read(0x3C, 0x00);
    expectations.extend(spi_write(0x3C, 0x96));
    let spi = SpiMock::new(&expectations);
    let mut sensor = As3935::new_spi(spi, NoopDelay);
    sensor.begin().unwrap();
    finish_spi(sensor);
}

#[test]
fn spi_interface_carries_its_bus_configuration() {
    let spi = SpiMock::new(&[]);
    let sensor = As3935::new_spi(spi, NoopDelay);
    let config = sensor.interface().config();
    assert_eq!(*config, SpiConfig::DEFAULT);
    assert_eq!(config.mode, MODE_1);
    assert_eq!(config.frequency_hz, 2_000_000);
    finish_spi(sensor);
}
