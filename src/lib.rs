// Foodgram: recipe sharing backend

pub mod config;
pub mod database;
pub mod pagination;
pub mod validation;

// Domain models and request/response shapes
pub mod models;

// Media storage, auth middleware, logging
pub mod infrastructure;

// Business logic over the database
pub mod services;

// HTTP handlers and router
pub mod api;
pub mod app_state;

// Common utilities
pub mod error;
pub mod data_seeder;

// Re-exports for convenience
pub use error::{AppError, AppResult};
