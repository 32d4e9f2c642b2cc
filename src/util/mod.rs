//! Presentation helpers shared by front ends.

pub mod notify;
pub mod time_ago;
