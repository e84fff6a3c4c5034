pub mod publisher;
pub mod sender;
pub mod server;
pub mod supervisor;

#[macro_use]
extern crate log;

pub use ocxp_common::error::Error;
