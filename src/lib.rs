//! Pull sensors for the phone's cellular radio.

pub mod config;
pub mod error;
pub mod model;
pub mod platform;
pub mod processor;
pub mod pull;
pub mod sensors;
