//! Device layer for Corsair Link controllers.
//!
//! Provides the byte channel, request/response correlation and the session
//! that drives an identified controller.

pub mod correlator;
#[cfg(test)]
pub(crate) mod mock;
pub mod session;
pub mod transport;

pub use correlator::{
    Correlator, EventCorrelator, ExchangeState, Inbox, PendingRequest, PollingCorrelator,
};
pub use session::{FanSettings, Session, SharedSession};
pub use transport::{HidTransport, InterfaceFamily, Transport};
