//! Device implementations

pub mod decawave;
pub mod ublox;

pub use decawave::UwbTag;
pub use ublox::GnssRover;
