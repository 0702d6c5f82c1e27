//! Hyprland quantum state: capture, checksum, persist and restore-check
//! desktop snapshots.
//!
//! [`manager::StateManager`] is the entry point; everything else is the
//! machinery it drives.

#![forbid(unsafe_code)]

pub mod capture;
pub mod compat;
pub mod compositor;
pub mod config;
pub mod constants;
pub mod events;
pub mod manager;
pub mod proc_info;
pub mod snapshot;
pub mod store;
#[cfg(test)]
mod testing;
