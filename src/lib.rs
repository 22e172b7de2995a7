//! Omicron GW - input gateway for tiled display walls
//!
//! Receives the Omicron binary event stream from touch overlays, tracked
//! wands and Kinect sensors, and turns it into pointer and keyboard
//! operations for a display server.

pub mod config;
pub mod dispatch;
pub mod filter;
pub mod input_server;
pub mod listener;
pub mod projection;
pub mod protocol;
pub mod replay;
pub mod sink;
pub mod sniffer;
