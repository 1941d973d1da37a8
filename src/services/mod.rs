//! HTTP handlers, one module per area of the portal.

pub mod auth;
pub mod context;
pub mod documents;
pub mod nonconformity;
pub mod pages;
pub mod records;
