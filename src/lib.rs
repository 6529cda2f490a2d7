//! # Sensor Gateway Library
//!
//! Relays telemetry (temperature, humidity, tilt) and camera frames from a
//! remote sensor unit, tolerating an unreliable or absent hardware link.
//!
//! This library provides the ingestion core: reading lines from a serial or
//! network link, parsing them under structured and loose text formats,
//! keeping the latest value per field, and caching the most recent camera
//! frame with a disk fallback.

pub mod camera;
pub mod config;
pub mod error;
pub mod frames;
pub mod gateway;
pub mod ingest;
pub mod link;
pub mod parser;
pub mod shutdown;
pub mod telemetry;
pub mod uploader;
