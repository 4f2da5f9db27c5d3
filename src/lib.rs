pub mod app_state;
pub mod cache;
pub mod chat;
pub mod config;
pub mod db;
pub mod fetchers;
pub mod handlers;
pub mod identity;
pub mod inference;
pub mod logging;
pub mod session;
