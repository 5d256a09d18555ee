pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod parsers;
pub mod services;

#[cfg(test)]
mod test;
