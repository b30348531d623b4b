//! Read entities definitions.

pub mod agreement;
