//! HTTP API for canaryd

pub mod rest;

pub use rest::router::create_router;
