mod client;
mod config;
mod proto;

pub use client::{Client, Error};
pub use config::{Config, DEFAULT_PORT};
pub use proto::{
    Error as ProtoError, Header, Message, Opt, Query, Question, RCode, Record, RecordClass,
    RecordData, RecordType, decode_message, fqdn,
};
