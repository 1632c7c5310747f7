pub mod config;
pub mod error;
pub mod event;
pub mod hotscore;
pub mod secrets;
pub mod types;
