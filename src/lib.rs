pub mod api;
pub mod bridge;
pub mod config;
pub mod db;
pub mod editor;
pub mod hub;
pub mod metrics;
pub mod protocol;
