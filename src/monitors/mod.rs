pub mod resources;

pub use resources::{Probe, SysinfoProbe};
