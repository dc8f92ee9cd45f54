pub mod config;
pub mod error;
pub mod gateway;
pub mod images;
pub mod models;
pub mod normalizer;
pub mod service;
pub mod session;

pub use config::{ConfigError, ServiceConfig};
pub use error::ServiceError;
pub use gateway::{GeminiGateway, LanguageModelGateway};
pub use images::{GoogleImageSearch, ImageLookup};
pub use service::{AppState, build_router, create_app};
pub use models::*;
