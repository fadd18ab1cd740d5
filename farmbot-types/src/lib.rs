//! Type definitions for farmbot

pub mod credentials;
pub mod error;
pub mod motion;

pub use credentials::Credentials;
pub use error::{Error, Result};
pub use motion::{Direction, Offset};
