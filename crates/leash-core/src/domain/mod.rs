//! Domain model (ids, request descriptors, states, errors).

pub mod errors;
pub mod ids;
pub mod request;
pub mod state;

pub use self::errors::{BuildError, ConfigError, TransportError};
pub use self::ids::RequestId;
pub use self::request::{HttpMethod, RequestDescriptor};
pub use self::state::{AppPhase, PumpState, RequestState};
