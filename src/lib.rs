//! Yenni - terminal chat client for Gemini and ChatGPT conversation backends
//!
//! The library holds the gateway, the per-backend view controller and the
//! terminal UI; `main.rs` wires them to the command line.

pub mod commands;
pub mod config;
pub mod controller;
pub mod events;
pub mod format;
pub mod gateway;
pub mod model;
pub mod ui;
