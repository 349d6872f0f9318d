#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod student_service;

pub use tracker_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, StudentServiceError};
pub use student_service::{SlugCheck, StudentService};
