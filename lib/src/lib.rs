// lib/src/lib.rs

//! Storage engines, configuration and business services of the hospital
//! administration backend.

pub mod clock;
pub mod config;
pub mod export;
pub mod services;
pub mod session;
pub mod storage_engine;

pub use crate::clock::{Clock, FixedClock, SystemClock};
pub use crate::config::AppConfig;
pub use crate::services::HospitalServices;
pub use crate::session::{SessionContext, SYSTEM_UID};
pub use crate::storage_engine::{create_store, DocumentStore, StoreError, StoreResult};
