//! # Tower Throttle
//!
//! `tower-throttle` serves the [`throttle_limit`] buckets over HTTP using
//! [Tower](https://github.com/tower-rs/tower) middleware and axum.
//!
//! ## The Admission Stack
//! Each bucket kind gets one route. `POST` configures (or replaces) the limiter
//! held in that route's [`LimiterSlot`], `GET` performs one admission check:
//!
//! 1. **Admission**: The [`AdmissionLayer`] loads the current limiter and runs a
//!    single check. Admitted requests reach the handler with an [`Admitted`]
//!    extension carrying the post-admission level.
//! 2. **Rejection**: Unconfigured or exhausted buckets short-circuit with a
//!    boxed [`ThrottleError`], which is rendered as a JSON [`Reply`] with the
//!    matching status code (400 or 429).
//! 3. **Replacement**: Reconfiguring swaps the reference held by the slot.
//!    Checks that already loaded the old limiter complete against it.

mod bucket;
mod config;
mod error;
mod layer;
mod reply;
mod routes;
mod service;
mod slot;

#[cfg(test)]
mod tests;

pub use bucket::BucketConfig;
pub use bucket::BucketKind;
pub use config::LogFormat;
pub use config::ServerArgs;
pub use config::init_tracing;
pub use error::ThrottleError;
pub use layer::AdmissionLayer;
pub use reply::Reply;
pub use reply::Status;
pub use routes::AppState;
pub use routes::router;
pub use service::Admitted;
pub use service::AdmissionService;
pub use slot::LimiterSlot;
