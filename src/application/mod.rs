pub mod app_error;
pub mod clock;
pub mod context;
pub mod jwt;
pub mod use_cases;
