//! Risk controls that sit in front of order submission: the sliding-window
//! rate limiter (§4.11, testable property 8). Position/exposure risk
//! checks are left to the embedding strategy via
//! [`crate::engine::PreSubmitValidator`]; this module supplies the one
//! risk primitive the spec names concretely.

pub mod rate_limiter;

pub use rate_limiter::RateLimiter;
