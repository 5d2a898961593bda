//! Endpoint groups of the backend API
//!
//! Each group is a trait so that services can be driven by test doubles;
//! [`ApiClient`](crate::ApiClient) implements all of them.

pub mod auth;
pub mod chat;
pub mod news;
pub mod stocks;
