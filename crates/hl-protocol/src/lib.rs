//! hl-protocol: Payloads exchanged with the homelink remote backend
//!
//! This crate defines the JSON bodies of the two backend calls the remote
//! coordinator makes: instance registration and session token issuance.
//! Only the fields the coordinator reads are modelled; unknown fields are
//! ignored on decode.

pub mod error;
pub mod message;

pub use error::ProtocolError;
pub use message::{RegisterResponse, TokenRequest, TokenResponse, REGISTER_PATH, TOKEN_PATH};
