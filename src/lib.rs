pub mod channel;
pub mod config;
pub mod session;
pub mod state;
pub mod store;
pub mod types;
pub mod ui;
pub mod views;
