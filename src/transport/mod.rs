//! Transport module - byte-exact frame I/O and socket setup.
//!
//! [`FrameTransport`] is generic over any blocking `Read + Write` stream so
//! the session logic runs unchanged over TCP and in-memory test streams.

mod frame_transport;
pub mod tcp;

pub use frame_transport::FrameTransport;

#[cfg(test)]
pub(crate) mod testing;
