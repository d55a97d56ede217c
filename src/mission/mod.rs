//! Mission control and manual command dispatch

mod controller;

pub use controller::{CommandError, MissionController};
