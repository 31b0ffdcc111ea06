#![doc = include_str!("../README.md")]
#![deny(missing_docs)]

pub mod analyzer;
pub mod config;
pub mod error;
pub mod explorer;
pub mod network;
pub mod rpc;
pub mod utill;
