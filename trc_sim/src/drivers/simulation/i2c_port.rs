//! Simulated I2C register port.
//!
//! A 256-byte register file behind a port that stays busy for a configurable
//! number of readiness polls after each command. While busy, and until the
//! transfer completes, the data buffer is empty; this reproduces controllers
//! that report ready before the buffer holds valid data.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

use trc_core::i2c::I2cPort;

/// Size of the simulated register file.
pub const REGISTER_COUNT: usize = 256;

#[derive(Debug)]
struct BusState {
    registers: [u8; REGISTER_COUNT],
    /// Readiness polls left before the current transfer completes.
    busy_polls: u32,
    /// Bytes the port buffer receives on completion.
    pending: Vec<u8>,
    buffer: Vec<u8>,
    write_mode: bool,
    /// Register whose value increments on every completed read of it.
    counter: Option<u8>,
    pending_counter: bool,
    reads: u64,
    writes: u64,
}

/// Shared view of the simulated device's registers.
///
/// Cloning yields another handle onto the same register file; tests and the
/// demo keep one to inspect or poke the device.
#[derive(Debug, Clone)]
pub struct SimI2cBus(Arc<Mutex<BusState>>);

impl SimI2cBus {
    /// Register value.
    pub fn register(&self, reg: u8) -> u8 {
        self.0.lock().registers[usize::from(reg)]
    }

    /// Overwrite registers starting at `reg` (wrapping at the end).
    pub fn poke(&self, reg: u8, bytes: &[u8]) {
        let mut bus = self.0.lock();
        for (i, b) in bytes.iter().enumerate() {
            bus.registers[(usize::from(reg) + i) % REGISTER_COUNT] = *b;
        }
    }

    /// Completed read and write commands.
    pub fn transfer_counts(&self) -> (u64, u64) {
        let bus = self.0.lock();
        (bus.reads, bus.writes)
    }
}

/// Simulated port onto a [`SimI2cBus`].
#[derive(Debug)]
pub struct SimI2cPort {
    bus: SimI2cBus,
    busy_polls: u32,
}

impl SimI2cPort {
    /// Port whose commands complete after `busy_polls` not-ready polls.
    pub fn new(busy_polls: u32) -> Self {
        Self {
            bus: SimI2cBus(Arc::new(Mutex::new(BusState {
                registers: [0; REGISTER_COUNT],
                busy_polls: 0,
                pending: Vec::new(),
                buffer: Vec::new(),
                write_mode: false,
                counter: None,
                pending_counter: false,
                reads: 0,
                writes: 0,
            }))),
            busy_polls,
        }
    }

    /// Make `reg` behave like a measurement counter: every completed read of
    /// it increments its value.
    pub fn with_counter(self, reg: u8) -> Self {
        self.bus.0.lock().counter = Some(reg);
        self
    }

    /// Handle onto the register file.
    pub fn bus(&self) -> SimI2cBus {
        self.bus.clone()
    }

    fn begin(&self, bus: &mut BusState, result: Vec<u8>) {
        bus.busy_polls = self.busy_polls;
        bus.buffer.clear();
        bus.pending = result;
    }
}

fn window(registers: &[u8; REGISTER_COUNT], reg: u8, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| registers[(usize::from(reg) + i) % REGISTER_COUNT])
        .collect()
}

impl I2cPort for SimI2cPort {
    fn is_port_ready(&self) -> bool {
        let mut bus = self.bus.0.lock();
        if bus.busy_polls > 0 {
            bus.busy_polls -= 1;
            return false;
        }
        if !bus.pending.is_empty() {
            bus.buffer = std::mem::take(&mut bus.pending);
            if bus.write_mode {
                bus.writes += 1;
            } else {
                bus.reads += 1;
                if bus.pending_counter {
                    if let Some(reg) = bus.counter {
                        let r = usize::from(reg);
                        bus.registers[r] = bus.registers[r].wrapping_add(1);
                    }
                    bus.pending_counter = false;
                }
            }
        }
        true
    }

    fn is_port_in_write_mode(&self) -> bool {
        self.bus.0.lock().write_mode
    }

    fn send_read_command(&mut self, reg_address: u8, length: usize) {
        let mut bus = self.bus.0.lock();
        trace!(reg = reg_address, length, "sim i2c read");
        bus.write_mode = false;
        bus.pending_counter = bus.counter == Some(reg_address);
        let data = window(&bus.registers, reg_address, length);
        self.begin(&mut bus, data);
    }

    fn send_write_command(&mut self, reg_address: u8, length: usize, data: &[u8]) {
        let mut bus = self.bus.0.lock();
        trace!(reg = reg_address, length, "sim i2c write");
        bus.write_mode = true;
        bus.pending_counter = false;
        for (i, b) in data.iter().take(length).enumerate() {
            bus.registers[(usize::from(reg_address) + i) % REGISTER_COUNT] = *b;
        }
        self.begin(&mut bus, data[..length.min(data.len())].to_vec());
    }

    fn data(&self) -> Vec<u8> {
        self.bus.0.lock().buffer.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_is_empty_until_transfer_completes() {
        let mut port = SimI2cPort::new(2);
        port.bus().poke(0x04, &[0x11, 0x22]);

        assert!(port.is_port_ready());
        port.send_read_command(0x04, 2);
        assert!(!port.is_port_ready());
        assert!(port.data().is_empty());
        assert!(!port.is_port_ready());
        assert!(port.is_port_ready());
        assert_eq!(port.data(), vec![0x11, 0x22]);
        assert_eq!(port.bus().transfer_counts(), (1, 0));
    }

    #[test]
    fn write_updates_registers() {
        let mut port = SimI2cPort::new(0);
        port.send_write_command(0x10, 1, &[0xFF]);
        assert!(port.is_port_in_write_mode());
        assert!(port.is_port_ready());
        assert_eq!(port.data(), vec![0xFF]);
        assert_eq!(port.bus().register(0x10), 0xFF);
    }

    #[test]
    fn counter_register_advances_per_read() {
        let mut port = SimI2cPort::new(0).with_counter(0x20);
        for expected in 0..3u8 {
            port.send_read_command(0x20, 1);
            assert!(port.is_port_ready());
            assert_eq!(port.data(), vec![expected]);
        }
        assert_eq!(port.bus().register(0x20), 3);
    }

    #[test]
    fn reads_wrap_at_end_of_register_file() {
        let mut port = SimI2cPort::new(0);
        port.bus().poke(0xFF, &[1, 2]);
        port.send_read_command(0xFF, 2);
        assert!(port.is_port_ready());
        assert_eq!(port.data(), vec![1, 2]);
    }
}
