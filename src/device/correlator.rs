//! Request/response correlation.
//!
//! A controller answers each transfer with a frame echoing `[id, opcode]` of the
//! first operation. Anything else that turns up on the channel (late replies to
//! timed out requests, unsolicited reports) is discarded. Only one request is
//! in flight at a time.
//!
//! Two strategies implement the same [`Correlator`] contract:
//!
//! - [`PollingCorrelator`] reads the channel itself between short sleeps.
//! - [`EventCorrelator`] runs a listener thread that hands frames to an
//!   [`Inbox`], and the caller waits on a condition variable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::device::transport::Transport;
use crate::error::{CorsairError, Result};
use crate::protocol::{Frame, HID_REPORT_LENGTH};

// =============================================================================
// Exchange State
// =============================================================================

/// Progress of the current exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    Sent,
    Awaiting,
    Done,
    TimedOut,
}

/// The single outstanding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRequest {
    pub request_id: u8,
    pub opcode: u8,
    /// Shortest reply that holds the expected data.
    pub min_len: usize,
    pub timeout: Duration,
    pub deadline: Instant,
}

impl PendingRequest {
    pub fn new(frame: &Frame, timeout: Duration) -> Self {
        Self {
            request_id: frame.request_id(),
            opcode: frame.opcode(),
            min_len: frame.response_len(),
            timeout,
            deadline: Instant::now() + timeout,
        }
    }

    /// Whether `reply` answers this request.
    pub fn matches(&self, reply: &[u8]) -> bool {
        reply.len() >= 2 && reply[0] == self.request_id && reply[1] == self.opcode
    }

    /// Accept a matching reply.
    fn accept(&self, reply: &[u8]) -> Result<Vec<u8>> {
        if reply.len() < self.min_len {
            return Err(CorsairError::MalformedResponse {
                message: format!(
                    "reply to request {:#04x} has {} bytes, expected at least {}",
                    self.request_id,
                    reply.len(),
                    self.min_len
                ),
            });
        }
        Ok(reply.to_vec())
    }

    fn timed_out(&self) -> CorsairError {
        CorsairError::Timeout {
            request_id: self.request_id,
            waited_ms: self.timeout.as_millis() as u64,
        }
    }
}

/// Submits one frame and waits for its reply.
pub trait Correlator: Send {
    /// Send `frame` and return the matching reply.
    ///
    /// # Errors
    /// `Timeout` when no matching reply arrives in time, `Transport` when the
    /// channel fails, `MalformedResponse` when the matching reply is too short,
    /// `Busy` when another exchange is unresolved.
    fn submit(&mut self, frame: &Frame, timeout: Duration) -> Result<Vec<u8>>;

    fn state(&self) -> ExchangeState;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn send<T: Transport + ?Sized>(transport: &mut T, frame: &Frame) -> Result<()> {
    let bytes = frame.wire_bytes();
    debug!("TX {:02x?}", bytes);

    let written = transport.write(bytes)?;
    if written < bytes.len() {
        return Err(CorsairError::Transport(format!(
            "short write: {} of {} bytes",
            written,
            bytes.len()
        )));
    }
    Ok(())
}

// =============================================================================
// Polling
// =============================================================================

/// Reads the channel between sleeps of one poll interval.
pub struct PollingCorrelator<T> {
    transport: T,
    poll_interval: Duration,
    state: ExchangeState,
}

impl<T: Transport> PollingCorrelator<T> {
    pub fn new(transport: T, poll_interval: Duration) -> Self {
        Self {
            transport,
            poll_interval,
            state: ExchangeState::Idle,
        }
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    fn exchange(&mut self, frame: &Frame, timeout: Duration) -> Result<Vec<u8>> {
        let pending = PendingRequest::new(frame, timeout);
        self.state = ExchangeState::Sent;
        send(&mut self.transport, frame)?;
        self.state = ExchangeState::Awaiting;

        let mut buf = [0u8; HID_REPORT_LENGTH];
        loop {
            let n = self.transport.read(&mut buf, Duration::ZERO)?;
            if n > 0 {
                let reply = &buf[..n];
                debug!("RX {:02x?}", reply);
                if pending.matches(reply) {
                    self.state = ExchangeState::Done;
                    return pending.accept(reply);
                }
                debug!(
                    request_id = pending.request_id,
                    "Discarding stale reply {:02x?}", reply
                );
            }

            let now = Instant::now();
            if now >= pending.deadline {
                self.state = ExchangeState::TimedOut;
                return Err(pending.timed_out());
            }
            if n == 0 {
                thread::sleep(self.poll_interval.min(pending.deadline - now));
            }
        }
    }
}

impl<T: Transport> Correlator for PollingCorrelator<T> {
    fn submit(&mut self, frame: &Frame, timeout: Duration) -> Result<Vec<u8>> {
        if self.state != ExchangeState::Idle {
            return Err(CorsairError::Busy);
        }
        let result = self.exchange(frame, timeout);
        self.state = ExchangeState::Idle;
        result
    }

    fn state(&self) -> ExchangeState {
        self.state
    }
}

// =============================================================================
// Event Driven
// =============================================================================

#[derive(Debug)]
enum Slot {
    Idle,
    Sent(PendingRequest),
    Awaiting(PendingRequest),
    Done(Vec<u8>),
}

#[derive(Debug)]
struct Mailbox {
    slot: Slot,
    fault: Option<String>,
}

/// Hand-off point between the listener thread and the waiting caller.
#[derive(Debug)]
pub struct Inbox {
    mailbox: Mutex<Mailbox>,
    ready: Condvar,
}

impl Inbox {
    pub fn new() -> Self {
        Self {
            mailbox: Mutex::new(Mailbox {
                slot: Slot::Idle,
                fault: None,
            }),
            ready: Condvar::new(),
        }
    }

    /// Offer a received frame. Returns true when it completed the exchange.
    pub fn deliver(&self, frame: &[u8]) -> bool {
        let mut mailbox = lock(&self.mailbox);
        let accepted = match &mailbox.slot {
            Slot::Sent(pending) | Slot::Awaiting(pending) => pending.matches(frame),
            _ => false,
        };

        if accepted {
            mailbox.slot = Slot::Done(frame.to_vec());
            self.ready.notify_all();
        } else {
            debug!("Discarding stale reply {:02x?}", frame);
        }
        accepted
    }

    /// Report a broken channel. Every later exchange fails with it.
    pub fn fail(&self, message: String) {
        let mut mailbox = lock(&self.mailbox);
        mailbox.fault = Some(message);
        self.ready.notify_all();
    }

    pub fn state(&self) -> ExchangeState {
        match lock(&self.mailbox).slot {
            Slot::Idle => ExchangeState::Idle,
            Slot::Sent(_) => ExchangeState::Sent,
            Slot::Awaiting(_) => ExchangeState::Awaiting,
            Slot::Done(_) => ExchangeState::Done,
        }
    }

    fn arm(&self, pending: PendingRequest) -> Result<()> {
        let mut mailbox = lock(&self.mailbox);
        if let Some(fault) = &mailbox.fault {
            return Err(CorsairError::Transport(fault.clone()));
        }
        if !matches!(mailbox.slot, Slot::Idle) {
            return Err(CorsairError::Busy);
        }
        mailbox.slot = Slot::Sent(pending);
        Ok(())
    }

    fn mark_awaiting(&self) {
        let mut mailbox = lock(&self.mailbox);
        if let Slot::Sent(pending) = mailbox.slot {
            mailbox.slot = Slot::Awaiting(pending);
        }
    }

    fn reset(&self) {
        lock(&self.mailbox).slot = Slot::Idle;
    }

    /// Wait for the armed exchange to resolve, then return to idle.
    fn wait(&self, pending: &PendingRequest) -> Result<Vec<u8>> {
        let mailbox = lock(&self.mailbox);
        let remaining = pending.deadline.saturating_duration_since(Instant::now());
        let (mut mailbox, _) = self
            .ready
            .wait_timeout_while(mailbox, remaining, |m| {
                m.fault.is_none() && matches!(m.slot, Slot::Sent(_) | Slot::Awaiting(_))
            })
            .unwrap_or_else(PoisonError::into_inner);

        let slot = std::mem::replace(&mut mailbox.slot, Slot::Idle);
        match slot {
            Slot::Done(reply) => pending.accept(&reply),
            _ => match &mailbox.fault {
                Some(fault) => Err(CorsairError::Transport(fault.clone())),
                None => Err(pending.timed_out()),
            },
        }
    }
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}

fn listen<T: Transport>(
    transport: Arc<Mutex<T>>,
    inbox: Arc<Inbox>,
    stop: Arc<AtomicBool>,
    interval: Duration,
) {
    let mut buf = [0u8; HID_REPORT_LENGTH];
    while !stop.load(Ordering::Relaxed) {
        let read = lock(&transport).read(&mut buf, Duration::ZERO);
        match read {
            Ok(0) => thread::sleep(interval),
            Ok(n) => {
                debug!("RX {:02x?}", &buf[..n]);
                inbox.deliver(&buf[..n]);
            }
            Err(e) => {
                warn!("Listener read failed: {}", e);
                inbox.fail(e.to_string());
                break;
            }
        }
    }
}

/// Completes exchanges from a background listener thread.
pub struct EventCorrelator<T: Transport + 'static> {
    transport: Arc<Mutex<T>>,
    inbox: Arc<Inbox>,
    stop: Arc<AtomicBool>,
    listener: Option<JoinHandle<()>>,
}

impl<T: Transport + 'static> EventCorrelator<T> {
    /// Start the listener thread, reading every `listener_interval` when idle.
    pub fn spawn(transport: T, listener_interval: Duration) -> Result<Self> {
        let transport = Arc::new(Mutex::new(transport));
        let inbox = Arc::new(Inbox::new());
        let stop = Arc::new(AtomicBool::new(false));

        let listener = {
            let transport = Arc::clone(&transport);
            let inbox = Arc::clone(&inbox);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("corsair-link-listener".into())
                .spawn(move || listen(transport, inbox, stop, listener_interval))
                .map_err(|e| CorsairError::Transport(format!("listener thread: {}", e)))?
        };

        Ok(Self {
            transport,
            inbox,
            stop,
            listener: Some(listener),
        })
    }

    pub fn inbox(&self) -> &Arc<Inbox> {
        &self.inbox
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(listener) = self.listener.take() {
            let _ = listener.join();
        }
    }
}

impl<T: Transport + 'static> Correlator for EventCorrelator<T> {
    fn submit(&mut self, frame: &Frame, timeout: Duration) -> Result<Vec<u8>> {
        let pending = PendingRequest::new(frame, timeout);
        self.inbox.arm(pending)?;

        let sent = send(&mut *lock(&self.transport), frame);
        if let Err(e) = sent {
            self.inbox.reset();
            return Err(e);
        }
        self.inbox.mark_awaiting();

        self.inbox.wait(&pending)
    }

    fn state(&self) -> ExchangeState {
        self.inbox.state()
    }
}

impl<T: Transport + 'static> Drop for EventCorrelator<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
