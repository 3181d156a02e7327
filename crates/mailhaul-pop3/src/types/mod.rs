//! Core POP3 types.

mod capability;
mod response;
mod state;

pub use capability::{Capability, CapabilitySet, EXPIRE_NEVER, EXPIRE_UNSET};
pub use response::{ResponseCode, Status, StatusLine};
pub use state::SessionState;
