//! Testing utilities and mock implementations.
//!
//! These doubles stand in for the external executable and for the HTTP
//! transport so dispatcher and orchestrator behavior can be exercised
//! without spawning processes or opening sockets.

mod mock_invoker;
mod mock_transport;

pub use mock_invoker::MockInvoker;
pub use mock_transport::{MockConnectivity, MockTransport, TransportScript};
