//! Command handlers grouped by concern.

pub(crate) mod build;
pub(crate) mod info;
pub(crate) mod watch;
