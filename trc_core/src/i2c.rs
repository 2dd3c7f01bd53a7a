//! Asynchronous, non-blocking I2C request driver.
//!
//! Callers enqueue read and write requests; a per-device state machine
//! serviced in the pre-continuous phase pushes them through the port one at
//! a time:
//!
//! ```text
//! Start ──(queue empty)──────────────────────────────► Done ──► unregister
//!   │ dequeue                                            ▲
//!   ▼                                                    │ (requests arrived)
//! SendPortCommand ──(port ready: send)──► PortCommandCompleted ──(port ready
//!                                              and data length ok)──► Start
//! ```
//!
//! The device registers itself with the task manager on the first enqueue
//! and unregisters once the queue drains, so an idle device costs nothing.

pub mod device;
pub mod port;
pub mod request;

pub use device::{I2cDevice, PortCommandState};
pub use port::I2cPort;
pub use request::{I2cRequest, ReadAction, ReadCompletion, ReadHandler, WriteHandler};
