//! Session state and storage
//!
//! Sessions live only in process memory; nothing is persisted and nothing
//! expires on its own.

mod error;
mod id;
mod model;
mod store;

pub use error::SessionError;
pub use id::SessionIdGenerator;
pub use model::{Session, SessionState};
pub use store::{Flight, InMemorySessionStore, SessionHandle, SessionStore};
