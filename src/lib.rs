#![cfg_attr(not(test), no_std)]

//! # micro-meteo
//! ## A micro weather station firmware in Rust
//!
//! A single cooperative scheduler drives three devices:
//! - A forced-mode environmental sensor (temperature, humidity, pressure)
//! - An air-quality sensor compensated with the environmental readings
//! - A small character display showing both
//!
//! Everything in this library is hardware independent. The devices are
//! reached through the capability traits in [`sensors`] and [`rendering`],
//! and time through [`timer::Clock`], so the whole task graph runs on the
//! host under a simulated clock.

mod fmt;

pub mod ccs811;
pub mod compensation;
pub mod config;
pub mod error;
pub mod rendering;
pub mod sensors;
pub mod state;
pub mod station;
pub mod timer;
