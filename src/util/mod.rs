//! Internal utilities.

pub(crate) mod size;
