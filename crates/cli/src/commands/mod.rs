//! CLI commands for the spiral pool simulator.

pub mod schedule;
pub mod simulate;

pub use schedule::{run_schedule, ScheduleArgs};
pub use simulate::{run_simulate, SimulateArgs};
