pub mod config;
pub mod conversation;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
