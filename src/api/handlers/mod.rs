//! Route handlers, one module per resource.

pub mod auth;
pub mod cms;
pub mod health;
pub mod submissions;
pub mod uploads;
pub mod users;
