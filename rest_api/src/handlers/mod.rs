// rest_api/src/handlers/mod.rs

//! Route handlers grouped by the screen they serve.

pub(crate) mod admin;
pub(crate) mod finance;
pub(crate) mod patients;
pub(crate) mod reports;
pub(crate) mod staff;
