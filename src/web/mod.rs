//! HTTP surface: axum routes, request/response models, and the channel
//! through which handlers reach the task that owns the printer driver.

pub mod api;
pub mod models;
pub mod printer_channel;
