//! REST surface: trigger, metric exposition, health

pub mod handlers;
pub mod router;
pub mod state;
