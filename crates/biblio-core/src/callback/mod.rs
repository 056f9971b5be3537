//! Callback addressing: title tokens and button payloads.

pub mod payload;
pub mod token;

pub use payload::{CallbackPayload, CallbackPrefix};
pub use token::{decode_title, encode_title};
