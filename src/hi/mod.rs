pub mod assembler;
pub mod codec;
pub mod connection;
pub mod handler;
pub mod policy;
pub mod response;
pub mod service;
