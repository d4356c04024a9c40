//! LivSync API
//!
//! Client for the remote LivSync service:
//!
//! - `POST /chat/message`: health assistant chat turn
//! - `GET /users/{id}`: user profile
//! - `GET /health/insights`: dashboard insight text
//! - `GET /calendar/events/today`, `POST /calendar/events`: calendar
//! - `GET /event-day-suggestion`: suggestion for the rest of the day
//!
//! All calls return [`ApiResult`]; nothing is left to reject unobserved.

mod client;
mod error;

pub use client::ApiClient;
pub use error::{ApiError, ApiResult, ErrorKind};
