//! Services Layer
//!
//! Pure business logic extracted from HTTP handlers.

pub mod inventory_service;
pub mod order_service;
