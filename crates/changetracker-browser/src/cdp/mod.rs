//! DevTools-protocol implementation of the portal traits.

mod frame;
mod portal;
mod scripts;

pub use frame::{CdpFrame, Probe, Target, WaitState};
pub use portal::{CdpPortal, CdpSurface};
