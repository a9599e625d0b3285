pub mod cache;
pub mod db;
pub mod error;
pub mod models;
pub mod providers;
pub mod service;
