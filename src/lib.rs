pub mod api;
pub mod api_docs;
pub mod auth;
pub mod config;
pub mod db;
pub mod import;
pub mod models;
pub mod seed;
pub mod server;
pub mod services;
