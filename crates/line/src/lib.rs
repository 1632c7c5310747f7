pub mod client;
pub mod signature;

pub use client::{LineClient, ReplyError, ReplySender};
pub use signature::{sign_body, verify_signature};
