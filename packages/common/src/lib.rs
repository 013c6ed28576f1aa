pub mod request_state;

pub use request_state::{InvalidStateError, RequestState};
