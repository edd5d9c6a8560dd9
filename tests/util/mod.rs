#![allow(dead_code)]

mod nameserver;
mod trace;

pub use nameserver::{MockNameserver, response};
pub use trace::trace_init;
