// src/lib.rs
//! Turns page text of monthly financial statements into normalized tables.
//!
//! [`extractors`] holds the layout-independent engine (value tokens, markers,
//! section and record walks). [`layouts`] composes it for each known
//! statement family; [`source`] and [`storage`] are the thin I/O edges.

pub mod config;
pub mod extractors;
pub mod layouts;
pub mod models;
pub mod source;
pub mod storage;
pub mod utils;
