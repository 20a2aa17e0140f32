//! sendcmd Client
//!
//! Fans a command batch out to many command servers at once and collects
//! one [`HostReport`] per target into a [`DispatchReport`].

pub mod dispatcher;
pub mod report;

pub use dispatcher::{DispatchConfig, Dispatcher};
pub use report::{DispatchReport, HostReport};
