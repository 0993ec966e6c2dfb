//! DCP Station Simulation Library
//!
//! This crate provides a simulation layer for exercising the DCP
//! multiplexer without station hardware. It includes:
//!
//! - **VirtualStation**: a keyset model that answers link training,
//!   applies received commands and produces event trains
//! - **Station task**: an async peer serving several virtual stations on
//!   the far end of one transport stream
//!
//! # Example
//!
//! ```rust
//! use dcp_mux::{HuaFrame, InterfaceId};
//! use dcp_sim::{StationUpdate, VirtualStation};
//!
//! let mut station = VirtualStation::new(InterfaceId(1));
//!
//! // The switch probes; the station acknowledges and the link is up
//! let update = station.handle_frame(&HuaFrame::probe(InterfaceId(1), 1));
//! assert_eq!(update, Some(StationUpdate::LinkUp));
//!
//! // Pressing a button queues framed events for the switch
//! station.press_key("line1");
//! while let Some(frame) = station.take_output() {
//!     println!("Station output: {:02X?}", frame.encode());
//! }
//! ```

pub mod station;
pub mod station_task;

pub use station::{StationUpdate, VirtualStation, VirtualStationConfig};
pub use station_task::{
    run_station_task, spawn_stations, StationCommand, StationHandle, StationReport,
};
