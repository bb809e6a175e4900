//! HTTP surface: the forward-auth endpoint plus health and metrics.

pub mod handler;
