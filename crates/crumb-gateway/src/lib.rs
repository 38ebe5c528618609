//! HTTP form for asking questions: one text input, one answer.

mod error;
mod handlers;
mod router;
mod server;

pub use error::GatewayError;
pub use server::{AskRequest, GatewayServer};
