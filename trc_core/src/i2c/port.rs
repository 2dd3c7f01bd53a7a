//! Hardware port capability consumed by the I2C driver.

/// Low-level port of a single I2C device.
///
/// Implemented by the platform layer (and by the simulated port). The driver
/// only issues a command while [`is_port_ready`](Self::is_port_ready) is
/// true and only accepts a result once the port is ready again *and*
/// [`data`](Self::data) holds exactly the requested number of bytes; some
/// controllers report ready before the buffer is valid.
pub trait I2cPort: Send {
    /// Whether the port can accept a command / has finished the last one.
    fn is_port_ready(&self) -> bool;

    /// Whether the last command was a write.
    fn is_port_in_write_mode(&self) -> bool;

    /// Start reading `length` bytes from `reg_address`.
    fn send_read_command(&mut self, reg_address: u8, length: usize);

    /// Start writing `data` (exactly `length` bytes) to `reg_address`.
    fn send_write_command(&mut self, reg_address: u8, length: usize, data: &[u8]);

    /// Contents of the port buffer for the last command.
    fn data(&self) -> Vec<u8>;
}

impl<T: I2cPort + ?Sized> I2cPort for Box<T> {
    fn is_port_ready(&self) -> bool {
        (**self).is_port_ready()
    }

    fn is_port_in_write_mode(&self) -> bool {
        (**self).is_port_in_write_mode()
    }

    fn send_read_command(&mut self, reg_address: u8, length: usize) {
        (**self).send_read_command(reg_address, length)
    }

    fn send_write_command(&mut self, reg_address: u8, length: usize, data: &[u8]) {
        (**self).send_write_command(reg_address, length, data)
    }

    fn data(&self) -> Vec<u8> {
        (**self).data()
    }
}
