pub mod config;
pub mod contract;
pub mod intake;
pub mod models;
pub mod pinning;
pub mod registration;
pub mod round;
pub mod session;
pub mod tasks;
pub mod voting;
