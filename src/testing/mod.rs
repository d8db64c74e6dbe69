//! Testing support
//!
//! Fixtures shared by the unit tests and the integration test target:
//! - A loopback visitor-counter server

pub mod mock_counter;

pub use mock_counter::{MockCounterResponse, MockCounterServer, MockCounterServerBuilder};
