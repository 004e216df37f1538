//! Outbound HTTP: the rate-limited request queue, the executor that pushes one-shot and
//! streaming calls through it, and the transport they are sent over.
mod err;
mod executor;
mod scheduler;
mod transport;

#[cfg(test)]
pub(crate) mod mock_transport;

pub use err::{ErrorKind, RequestErr, StatusErr, TransportErr};
pub use executor::Executor;
pub use scheduler::{Scheduler, Slot};
pub use transport::{HttpTransport, Method, Request, Response, Transport};

use std::collections::BTreeMap;

/// Query (GET) or form (POST) parameters, kept sorted so requests are reproducible.
pub type Params = BTreeMap<String, String>;
