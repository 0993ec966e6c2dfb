//! DCP Multiplexer
//!
//! This crate carries many DCP station links over one byte-stream
//! transport (a serial line, a TCP connection, an in-memory pipe) using
//! HUA link framing.
//!
//! # Architecture
//!
//! Each station link is an *interface* identified by an [`InterfaceId`].
//! An interface moves through a small lifecycle:
//!
//! - **Inactive**: registered with [`DcpMux::ifadd`], nothing on the wire
//! - **Training**: after [`DcpMux::ifup`], probes go out every retry
//!   interval until the peer answers
//! - **Running**: the link is up; keepalive probes detect a silent peer
//!
//! Messages are cut into block trains (see [`dcp_protocol::Train`]), one
//! link frame per block, and reassembled on the receiving interface.
//! Everything the multiplexer reports arrives on a single [`MuxEvent`]
//! channel returned by [`DcpMux::attach`].
//!
//! A shared [`Filter`] decides per hardware name whether station events
//! are forwarded and commands accepted. [`TimerQueue`] and [`StrMap`] are
//! the building blocks the multiplexer schedules and indexes with.
//!
//! # Example
//!
//! ```rust,no_run
//! use dcp_mux::{DcpMux, InterfaceId, InterfaceParams, MuxConfig};
//! use dcp_protocol::{EraseMode, MmiCommand};
//!
//! # async fn demo(stream: tokio::net::TcpStream) -> Result<(), dcp_mux::MuxError> {
//! let (mux, mut events) = DcpMux::attach(stream, MuxConfig::default())?;
//!
//! mux.ifadd(InterfaceId(1), Some(InterfaceParams::new(1).with_hwname("front-desk")));
//! mux.ifup(InterfaceId(1))?;
//!
//! while let Some(event) = events.recv().await {
//!     if event.transport_status().is_some() {
//!         let hello = MmiCommand::text("front-desk", 0, 0, EraseMode::Display, "Ready");
//!         mux.send_command(InterfaceId(1), &hello).await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod actor;
mod engine;
mod mux;

pub mod codec;
pub mod error;
pub mod events;
pub mod filter;
pub mod state;
pub mod strmap;
pub mod timer;

pub use codec::{FrameKind, HuaCodec, HuaFrame};
pub use engine::MuxConfig;
pub use error::MuxError;
pub use events::{MuxEvent, TransportStatus};
pub use filter::{Filter, FilterConfig, FilterEntry};
pub use mux::{DcpMux, CLOSE_GRACE};
pub use state::{default_hwname, InterfaceId, InterfaceParams, InterfaceState};
pub use strmap::{IterStatus, StrMap};
pub use timer::{TimerHandle, TimerQueue};
