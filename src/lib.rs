//! A FastCGI 1.1 codec for the application (responder) side of the protocol.
//!
//! The low-level layer reads and writes single records (`FastcgiLowlevelCodec`). The high-level
//! layer reassembles multiplexed records into complete requests (`FastcgiServerCodec`), hands
//! each one to a `FastcgiRequestHandler`, and encodes the handler's output
//! (`Response`). `FastcgiConnection` ties those together without any I/O, and
//! `serve_connection`/`FastcgiServer` run it over tokio sockets.

#[macro_use] extern crate enum_primitive;
#[macro_use] extern crate log;

mod config;
mod endian;
mod error;
mod hi;
mod lowlevel;
mod params;
mod s11n;

pub use config::FastcgiConfig;
pub use endian::{NetworkU16, NetworkU32};
pub use error::{FastcgiError, FastcgiResult};
pub use hi::assembler::{FastcgiRequest, RequestAssembler};
pub use hi::codec::{FastcgiServerCodec, ReadStatus};
pub use hi::connection::{FastcgiConnection, Progress};
pub use hi::handler::FastcgiRequestHandler;
pub use hi::policy::{is_keep_connection, ConnectionPolicy, Disposition};
pub use hi::response::{write_end_request, write_stream, write_stream_end, Response};
pub use hi::service::{serve_connection, FastcgiServer};
pub use lowlevel::{write_record, FastcgiLowlevelCodec, FastcgiRecord, FastcgiRecordBody, BeginRequest, EndRequest};
pub use params::{decode_params, read_params, write_params, ParamMap};
pub use s11n::*;
