pub mod axum_http;
pub mod messaging;
pub mod payments;
pub mod postgres;
pub mod queue;
