//! Per-device request queue and port command state machine.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

use super::port::I2cPort;
use super::request::{
    I2cRequest, ReadAction, ReadCompletion, ReadHandler, RequestKind, WriteHandler,
};
use crate::clock::SharedClock;
use crate::config::I2cConfig;
use crate::error::{I2cError, TaskError};
use crate::state::{Flow, StateMachine};
use crate::task::{PhaseSet, RunMode, Task, TaskHandle, TaskManager};

/// States of the port command machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortCommandState {
    /// Take the next request off the queue.
    Start,
    /// Issue the command once the port is ready.
    SendPortCommand,
    /// Wait for a valid result, then run the completion handler.
    PortCommandCompleted,
    /// Queue drained; stop and unregister.
    Done,
}

struct Engine<P> {
    port: P,
    sm: StateMachine<PortCommandState>,
    current: Option<I2cRequest>,
    /// Bumped by every `stop()`.
    generation: u64,
}

/// Request that finished during a service pass, with its result.
struct Finished {
    request: I2cRequest,
    data: Vec<u8>,
    generation: u64,
}

/// Queued asynchronous I2C device.
///
/// Handles are shared (`Arc`): the device registers that same handle with
/// the task manager while it has work.
pub struct I2cDevice<P> {
    name: String,
    max_transfer_len: usize,
    clock: SharedClock,
    tasks: TaskManager,
    queue: Mutex<VecDeque<I2cRequest>>,
    engine: Mutex<Engine<P>>,
    this: Weak<Self>,
}

impl<P: I2cPort + 'static> I2cDevice<P> {
    /// Create an idle device on `port`.
    pub fn new(
        name: impl Into<String>,
        port: P,
        config: &I2cConfig,
        clock: SharedClock,
        tasks: TaskManager,
    ) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|this| Self {
            max_transfer_len: config.max_transfer_len,
            clock,
            tasks,
            queue: Mutex::new(VecDeque::new()),
            engine: Mutex::new(Engine {
                port,
                sm: StateMachine::new(name.clone()),
                current: None,
                generation: 0,
            }),
            this: this.clone(),
            name,
        })
    }

    /// Device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a read of `length` bytes from `reg_address`.
    ///
    /// `handler` runs on completion; returning [`ReadAction::Repeat`]
    /// re-enqueues the same read.
    pub fn read<F>(&self, reg_address: u8, length: usize, handler: F) -> Result<(), I2cError>
    where
        F: for<'a> FnMut(&ReadCompletion<'a>) -> ReadAction + Send + 'static,
    {
        let handler: ReadHandler = Box::new(handler);
        self.submit(I2cRequest::read(reg_address, length, Some(handler)))
    }

    /// Queue a read whose result nobody needs (e.g. to trigger a conversion).
    pub fn read_once(&self, reg_address: u8, length: usize) -> Result<(), I2cError> {
        self.submit(I2cRequest::read(reg_address, length, None))
    }

    /// Queue a write of `payload` (exactly `length` bytes) to `reg_address`.
    pub fn write<F>(
        &self,
        reg_address: u8,
        length: usize,
        payload: Vec<u8>,
        handler: F,
    ) -> Result<(), I2cError>
    where
        F: FnOnce(u8, usize) + Send + 'static,
    {
        let handler: WriteHandler = Box::new(handler);
        self.submit(I2cRequest::write(reg_address, length, payload, Some(handler)))
    }

    /// Queue a fire-and-forget write of `payload`.
    pub fn write_bytes(&self, reg_address: u8, payload: &[u8]) -> Result<(), I2cError> {
        self.submit(I2cRequest::write(
            reg_address,
            payload.len(),
            payload.to_vec(),
            None,
        ))
    }

    /// Validate and enqueue a prepared request.
    ///
    /// # Errors
    /// [`I2cError`] if the request is malformed; nothing is enqueued then.
    pub fn submit(&self, request: I2cRequest) -> Result<(), I2cError> {
        request.validate(self.max_transfer_len)?;
        trace!(dev = %self.name, ?request, "request queued");
        self.enqueue(request);
        Ok(())
    }

    fn enqueue(&self, request: I2cRequest) {
        self.queue.lock().push_back(request);

        // The enable check runs under the engine lock, after the push, so a
        // concurrent transition to Done either sees the request or is undone
        // here.
        let mut engine = self.engine.lock();
        self.enable(&mut engine);
    }

    /// Re-enqueue a repeating read unless the device was stopped since the
    /// read completed.
    fn requeue(&self, request: I2cRequest, generation: u64) {
        let mut engine = self.engine.lock();
        if engine.generation != generation {
            debug!(
                dev = %self.name,
                reg = request.reg_address,
                "repeat dropped, device stopped"
            );
            return;
        }
        self.queue.lock().push_back(request);
        self.enable(&mut engine);
    }

    fn enable(&self, engine: &mut Engine<P>) {
        if !engine.sm.is_enabled() {
            engine.sm.start(PortCommandState::Start);
            if let Some(handle) = self.handle() {
                self.tasks.register_task(handle, PhaseSet::PRE_CONTINUOUS);
            }
            debug!(dev = %self.name, "port command machine enabled");
        }
    }

    fn handle(&self) -> Option<TaskHandle> {
        let handle: TaskHandle = self.this.upgrade()?;
        Some(handle)
    }

    /// Cancel everything: drop queued requests and the one in flight
    /// (its handler is not called), stop the machine and unregister.
    pub fn stop(&self) {
        let mut engine = self.engine.lock();
        engine.sm.stop();
        engine.current = None;
        engine.generation = engine.generation.wrapping_add(1);
        let dropped = {
            let mut queue = self.queue.lock();
            let n = queue.len();
            queue.clear();
            n
        };
        if let Some(handle) = self.handle() {
            self.tasks.unregister_task(&handle, PhaseSet::PRE_CONTINUOUS);
        }
        debug!(dev = %self.name, dropped, "device stopped");
    }

    /// Whether the machine is stopped and nothing is queued.
    pub fn is_idle(&self) -> bool {
        let engine = self.engine.lock();
        !engine.sm.is_enabled() && engine.current.is_none() && self.queue.lock().is_empty()
    }

    /// Queued requests plus the one in flight.
    pub fn pending_requests(&self) -> usize {
        let engine = self.engine.lock();
        usize::from(engine.current.is_some()) + self.queue.lock().len()
    }

    /// Current machine state (`None` before the first request).
    pub fn state(&self) -> Option<PortCommandState> {
        self.engine.lock().sm.state()
    }

    /// Run `f` against the port (diagnostics, simulation control).
    pub fn with_port<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        f(&mut self.engine.lock().port)
    }

    /// One service pass of the port command machine.
    fn service(&self) {
        let mut finished = None;
        let mut drained = false;
        {
            let mut guard = self.engine.lock();
            let Engine {
                port,
                sm,
                current,
                generation,
            } = &mut *guard;
            let generation = *generation;

            sm.run_once(|sm, state| match state {
                PortCommandState::Start => match self.queue.lock().pop_front() {
                    Some(request) => {
                        *current = Some(request);
                        sm.set_state(PortCommandState::SendPortCommand);
                        // Try to send in this same tick.
                        Flow::Recheck
                    }
                    None => {
                        sm.set_state(PortCommandState::Done);
                        Flow::Yield
                    }
                },

                PortCommandState::SendPortCommand => {
                    let Some(request) = current.as_ref() else {
                        sm.set_state(PortCommandState::Start);
                        return Flow::Yield;
                    };
                    if port.is_port_ready() {
                        match &request.kind {
                            RequestKind::Read { .. } => {
                                port.send_read_command(request.reg_address, request.length)
                            }
                            RequestKind::Write { payload, .. } => port.send_write_command(
                                request.reg_address,
                                request.length,
                                payload,
                            ),
                        }
                        trace!(dev = %self.name, ?request, "port command sent");
                        sm.set_state(PortCommandState::PortCommandCompleted);
                    }
                    Flow::Yield
                }

                PortCommandState::PortCommandCompleted => {
                    if port.is_port_ready() {
                        let data = port.data();
                        let expected = current.as_ref().map_or(0, I2cRequest::length);
                        if data.len() == expected {
                            if let Some(request) = current.take() {
                                finished = Some(Finished {
                                    request,
                                    data,
                                    generation,
                                });
                            }
                            sm.set_state(PortCommandState::Start);
                        }
                    }
                    Flow::Yield
                }

                PortCommandState::Done => {
                    if self.queue.lock().is_empty() {
                        sm.stop();
                        drained = true;
                        Flow::Yield
                    } else {
                        sm.set_state(PortCommandState::Start);
                        Flow::Recheck
                    }
                }
            });

            if drained {
                if let Some(handle) = self.handle() {
                    self.tasks.unregister_task(&handle, PhaseSet::PRE_CONTINUOUS);
                }
                debug!(dev = %self.name, "queue drained, port command machine disabled");
            }
        }

        if let Some(done) = finished {
            self.complete(done);
        }
    }

    /// Run the completion handler with no lock held.
    fn complete(&self, done: Finished) {
        let Finished {
            request,
            data,
            generation,
        } = done;
        let I2cRequest {
            reg_address,
            length,
            kind,
        } = request;

        match kind {
            RequestKind::Read {
                handler: Some(mut handler),
            } => {
                let completion = ReadCompletion {
                    reg_address,
                    length,
                    timestamp: self.clock.now(),
                    data: &data,
                };
                if handler(&completion) == ReadAction::Repeat {
                    self.requeue(
                        I2cRequest::read(reg_address, length, Some(handler)),
                        generation,
                    );
                }
            }
            RequestKind::Read { handler: None } => {}
            RequestKind::Write {
                handler: Some(handler),
                ..
            } => handler(reg_address, length),
            RequestKind::Write { handler: None, .. } => {}
        }
    }
}

impl<P: I2cPort + 'static> Task for I2cDevice<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn pre_continuous_task(&self, _mode: RunMode) -> Result<(), TaskError> {
        self.service();
        Ok(())
    }
}

impl<P> std::fmt::Debug for I2cDevice<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("I2cDevice")
            .field("name", &self.name)
            .field("max_transfer_len", &self.max_transfer_len)
            .field("queued", &self.queue.lock().len())
            .finish()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimClock;
    use crate::task::Phase;

    #[derive(Default)]
    struct PortState {
        ready: bool,
        buffer: Vec<u8>,
        commands: Vec<(bool, u8, usize)>,
    }

    /// Port whose readiness and buffer the test drives by hand.
    #[derive(Clone, Default)]
    struct ManualPort(Arc<Mutex<PortState>>);

    impl I2cPort for ManualPort {
        fn is_port_ready(&self) -> bool {
            self.0.lock().ready
        }
        fn is_port_in_write_mode(&self) -> bool {
            self.0.lock().commands.last().is_some_and(|c| c.0)
        }
        fn send_read_command(&mut self, reg_address: u8, length: usize) {
            let mut s = self.0.lock();
            s.commands.push((false, reg_address, length));
            s.ready = false;
            s.buffer.clear();
        }
        fn send_write_command(&mut self, reg_address: u8, length: usize, data: &[u8]) {
            let mut s = self.0.lock();
            s.commands.push((true, reg_address, length));
            s.ready = false;
            s.buffer = data.to_vec();
        }
        fn data(&self) -> Vec<u8> {
            self.0.lock().buffer.clone()
        }
    }

    fn setup() -> (ManualPort, TaskManager, Arc<I2cDevice<ManualPort>>) {
        let port = ManualPort::default();
        port.0.lock().ready = true;
        let tasks = TaskManager::new();
        let dev = I2cDevice::new(
            "dev",
            port.clone(),
            &I2cConfig::default(),
            SimClock::new().shared(),
            tasks.clone(),
        );
        (port, tasks, dev)
    }

    fn tick(tasks: &TaskManager) {
        tasks.run_phase(Phase::PreContinuous, RunMode::Test);
    }

    #[test]
    fn first_enqueue_registers_device() {
        let (_port, tasks, dev) = setup();
        assert!(dev.is_idle());
        assert_eq!(tasks.task_count(Phase::PreContinuous), 0);

        dev.read_once(0x04, 2).unwrap();
        assert_eq!(tasks.task_count(Phase::PreContinuous), 1);
        assert_eq!(dev.pending_requests(), 1);
        assert_eq!(dev.state(), Some(PortCommandState::Start));
    }

    #[test]
    fn invalid_request_is_not_enqueued() {
        let (_port, tasks, dev) = setup();
        assert_eq!(dev.read_once(0x04, 0), Err(I2cError::InvalidLength));
        assert!(matches!(
            dev.write_bytes(0x10, &[0; 40]),
            Err(I2cError::TransferTooLong { len: 40, .. })
        ));
        assert!(dev.is_idle());
        assert_eq!(tasks.task_count(Phase::PreContinuous), 0);
    }

    #[test]
    fn command_waits_for_port_ready() {
        let (port, tasks, dev) = setup();
        port.0.lock().ready = false;
        dev.read_once(0x04, 2).unwrap();

        tick(&tasks);
        assert_eq!(dev.state(), Some(PortCommandState::SendPortCommand));
        assert!(port.0.lock().commands.is_empty());

        port.0.lock().ready = true;
        tick(&tasks);
        assert_eq!(dev.state(), Some(PortCommandState::PortCommandCompleted));
        assert_eq!(port.0.lock().commands, vec![(false, 0x04, 2)]);
    }

    #[test]
    fn ready_with_short_buffer_is_not_complete() {
        let (port, tasks, dev) = setup();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        dev.read(0x04, 2, move |c| {
            *sink.lock() = Some(c.data.to_vec());
            ReadAction::Done
        })
        .unwrap();

        tick(&tasks);
        {
            let mut s = port.0.lock();
            s.ready = true;
            s.buffer = vec![0x12];
        }
        tick(&tasks);
        assert_eq!(dev.state(), Some(PortCommandState::PortCommandCompleted));
        assert!(seen.lock().is_none());

        port.0.lock().buffer = vec![0x12, 0x34];
        tick(&tasks);
        assert_eq!(*seen.lock(), Some(vec![0x12, 0x34]));
    }

    #[test]
    fn stop_drops_pending_without_handlers() {
        let (_port, tasks, dev) = setup();
        let called = Arc::new(Mutex::new(0));
        for reg in [0x01, 0x02] {
            let called = Arc::clone(&called);
            dev.read(reg, 1, move |_| {
                *called.lock() += 1;
                ReadAction::Done
            })
            .unwrap();
        }
        tick(&tasks);
        dev.stop();

        assert!(dev.is_idle());
        assert_eq!(tasks.task_count(Phase::PreContinuous), 0);
        assert_eq!(*called.lock(), 0);
    }
}
