//! HTTP surface: health, websocket upgrade, live tuning, debug views

pub mod routes;

pub use routes::build_router;
