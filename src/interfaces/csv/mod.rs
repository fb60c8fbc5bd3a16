//! Batch CSV interface: replays a file of requests against the gateway and
//! reports the resulting accounts.

pub mod account_writer;
pub mod replay;
pub mod request_reader;
