pub mod auth;
pub mod error;
pub mod images;
pub mod ingest;
pub mod middleware;
pub mod moderation;
pub mod store;
