//! Command implementations for the P8 training CLI.

pub mod dataset;
pub mod doctor;
pub mod run;
pub mod status;
