pub mod configs;
pub mod error;
pub mod lineproto;
pub mod perfdata;
pub mod record;

#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;
