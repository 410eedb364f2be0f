//! Application services

pub mod core_service;

pub use core_service::{Core, CoreState};
