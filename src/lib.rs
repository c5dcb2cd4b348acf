//! Attendance tracking for volunteer events: assignments, check-in and
//! check-out, automatic checkout after a shift, and the `filled` counter on
//! each position that follows those changes.

pub mod checkin;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod memory;
pub mod models;
pub mod realtime;
pub mod report;
pub mod store;
pub mod sweep;
