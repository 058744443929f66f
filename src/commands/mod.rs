//! Typed command definitions for every external program the provisioner runs.

pub mod conda;
pub mod git;
pub mod python;
pub mod system;
