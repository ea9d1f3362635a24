pub mod account;
pub mod admin;
pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod messages;
pub mod state;
pub mod views;

#[cfg(test)]
mod test_support;
