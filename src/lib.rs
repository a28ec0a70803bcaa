//! QuakeWatch library — portable alert detection and relay engine.
//!
//! A sensing node turns accelerometer and flame readings into debounced
//! FIRE/QUAKE alerts, a relay node deduplicates them and forwards each one
//! over a short- or long-range radio depending on how far the origin is
//! from the receiver, and a receiver node sounds the alarm.
//!
//! This crate contains all detection, codec, dedup and routing logic with
//! no platform dependencies, testable on any host with `cargo test`. The
//! ESP-IDF firmware in `firmware-std/` is a thin consumer that provides
//! sensor samples, radio links and a serial console.
//!
//! Data flow:
//! `seismic`/`fire` → `sensor` → `protocol::encode` → radio →
//! `comm::read_frame` → `relay` (`dedup`, `geo`) → radio → `alarm`.

#![cfg_attr(not(test), no_std)]

pub mod alarm;
pub mod board;
pub mod comm;
pub mod dedup;
pub mod defaults;
pub mod fire;
pub mod geo;
pub mod protocol;
pub mod relay;
pub mod seismic;
pub mod sensor;
