//! Host service for MKS Robin Wi-Fi printers.
//!
//! The interesting part lives in [`driver`]: a TCP client for the module's
//! line-oriented G-code protocol. [`registry`] persists printer records,
//! [`web`] exposes everything over HTTP, and [`config`] wires it together.

pub mod config;
pub mod driver;
pub mod registry;
pub mod web;
