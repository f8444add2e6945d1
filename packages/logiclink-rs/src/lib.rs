//! Host-side library for the LogicLink USB logic analyzer.
//!
//! Raw transfers come in over USB bulk (or from the demo device), get
//! decoded into per-channel streams and land in a multi resolution block
//! store that serves zoomed range queries.

mod error;
pub use error::{Error, Result};

mod types;
pub use types::*;

pub mod params;
pub mod wire;

pub mod downsample;
pub mod generate;
pub mod rearrange;

pub mod block;
pub mod block_array;
pub mod backend;

pub mod session;
pub mod device;
pub mod analyzer;
pub mod capture;

pub mod ffi;
