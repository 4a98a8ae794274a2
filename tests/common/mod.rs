#![allow(dead_code)]

use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;

use as3935::{As3935, EdgeSampler, RegisterInterface};
use embedded_hal_mock::eh1::delay::NoopDelay;

pub type Registers = Rc<RefCell<[u8; 64]>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read(u8),
    Write(u8, u8),
}

/// In-memory AS3935 register file that records every access.
pub struct RegisterFile {
    pub registers: Registers,
    pub log: Vec<Access>,
}

impl RegisterFile {
    pub fn new() -> Self {
        Self {
            registers: Rc::new(RefCell::new([0u8; 64])),
            log: Vec::new(),
        }
    }

    pub fn writes(&self) -> Vec<(u8, u8)> {
        self.log
            .iter()
            .filter_map(|access| match *access {
                Access::Write(register, value) => Some((register, value)),
                Access::Read(_) => None,
            })
            .collect()
    }
}

impl RegisterInterface for RegisterFile {
    type Error = Infallible;

    fn read_register(&mut self, register: u8) -> Result<u8, Self::Error> {
        self.log.push(Access::Read(register));
        Ok(self.registers.borrow()[register as usize])
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Self::Error> {
        self.log.push(Access::Write(register, value));
        self.registers.borrow_mut()[register as usize] = value;
        Ok(())
    }
}

pub fn sensor() -> (As3935<RegisterFile, NoopDelay>, Registers) {
    let file = RegisterFile::new();
    let registers = Rc::clone(&file.registers);
    (As3935::new(file, NoopDelay), registers)
}

/// Antenna whose edge count depends on the tuning step currently in register 0x08.
pub struct SimulatedAntenna {
    pub registers: Registers,
    pub counts: [u32; 16],
    pub sampled: Vec<u8>,
}

impl SimulatedAntenna {
    pub fn new(registers: &Registers, counts: [u32; 16]) -> Self {
        Self {
            registers: Rc::clone(registers),
            counts,
            sampled: Vec::new(),
        }
    }
}

impl EdgeSampler for SimulatedAntenna {
    type Error = Infallible;

    fn count_edges(&mut self, window_ms: u32) -> Result<u32, Self::Error> {
        assert_eq!(window_ms, 100);
        let tuning = self.registers.borrow()[0x08];
        assert_ne!(tuning & 0b1000_0000, 0, "LCO is not routed to IRQ");
        let step = tuning & 0b0000_1111;
        self.sampled.push(step);
        Ok(self.counts[step as usize])
    }
}

/// Sampler whose pin read fails on the given call.
pub struct BrokenPin {
    pub fail_on: usize,
    pub calls: usize,
}

impl EdgeSampler for BrokenPin {
    type Error = &'static str;

    fn count_edges(&mut self, _window_ms: u32) -> Result<u32, Self::Error> {
        self.calls += 1;
        if self.calls > self.fail_on {
            Err("pin read failed")
        } else {
            Ok(0)
        }
    }
}
