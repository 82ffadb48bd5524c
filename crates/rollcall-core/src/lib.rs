//! rollcall-core — face registration and verification orchestration.
//!
//! Embedding and comparison are delegated to an external face-model service
//! over multipart HTTP; this crate owns the orchestration around it and the
//! one-primary-face-per-user rule enforced against the record store.

pub mod client;
pub mod error;
pub mod service;
pub mod types;

pub use client::{FaceApiClient, FaceGateway};
pub use error::FaceError;
pub use service::{FaceService, RegisterRequest, VerifyRequest};
pub use types::{RelayedResponse, UserFace};
