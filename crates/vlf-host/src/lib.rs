//! vlf-host: the control loop that owns the buddy registry and the
//! connection dispatcher and wires them to the overlay.
//!
//! The overlay runs elsewhere. It receives [`OverlayCommand`]s from a
//! [`ChannelOverlay`] and reports back by sending [`HostEvent`]s into the
//! loop, alongside user actions from the presentation layer.

pub mod control;
pub mod link;

pub use control::{ControlLoop, HostEvent, HostStatus};
pub use link::{ChannelOverlay, OverlayCommand};
