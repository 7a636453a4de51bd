// models/src/medical/mod.rs

pub mod billing;
pub mod catalog;
pub mod chat;
pub mod clinical;
pub mod notification;
pub mod patient;
pub mod staff;
pub mod ward;

pub use billing::{Bill, BillItem, BillItemKind, BillStatus, Payment, PaymentMethod};
pub use catalog::{InventoryItem, PriceListItem};
pub use chat::{conversation_id, ChatMessage};
pub use clinical::{ClinicalContent, ClinicalEntry, ClinicalRecordKind, NoteCategory, VitalSigns};
pub use notification::{Notification, NotificationKind};
pub use patient::{Demographics, Financials, Gender, NextOfKin, Patient, PatientStatus};
pub use staff::{Department, Role, StaffProfile, StaffUser};
pub use ward::{AdmissionRecord, BedAssignment, Ward, MAX_UNBILLED_DAYS};
