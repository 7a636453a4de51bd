// models/src/medical/staff.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Department {
    Administration,
    Accounts,
    Nursing,
    Medical,
    Pharmacy,
    Laboratory,
    Radiology,
    Rehabilitation,
    Records,
    Store,
}

impl Department {
    pub const ALL: [Department; 10] = [
        Department::Administration,
        Department::Accounts,
        Department::Nursing,
        Department::Medical,
        Department::Pharmacy,
        Department::Laboratory,
        Department::Radiology,
        Department::Rehabilitation,
        Department::Records,
        Department::Store,
    ];

    /// Roles a member of this department may hold.
    pub fn allowed_roles(self) -> &'static [Role] {
        match self {
            Department::Administration => &[Role::Admin, Role::RecordsOfficer],
            Department::Accounts => &[Role::Accountant, Role::Cashier],
            Department::Nursing => &[Role::Nurse],
            Department::Medical => &[Role::Doctor],
            Department::Pharmacy => &[Role::Pharmacist],
            Department::Laboratory => &[Role::LabScientist],
            Department::Radiology => &[Role::Radiologist],
            Department::Rehabilitation => &[Role::Physiotherapist],
            Department::Records => &[Role::RecordsOfficer],
            Department::Store => &[Role::Storekeeper],
        }
    }

    pub fn allows(self, role: Role) -> bool {
        self.allowed_roles().contains(&role)
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Accountant,
    Cashier,
    Nurse,
    Doctor,
    Pharmacist,
    LabScientist,
    Radiologist,
    Physiotherapist,
    RecordsOfficer,
    Storekeeper,
}

impl Role {
    pub const ALL: [Role; 11] = [
        Role::Admin,
        Role::Accountant,
        Role::Cashier,
        Role::Nurse,
        Role::Doctor,
        Role::Pharmacist,
        Role::LabScientist,
        Role::Radiologist,
        Role::Physiotherapist,
        Role::RecordsOfficer,
        Role::Storekeeper,
    ];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "role".to_string(),
                reason: format!("unknown role '{}'", s),
            })
    }
}

/// Role-specific part of a staff record.
///
/// Only nurses can carry a ward assignment; every other role is `General`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum StaffProfile {
    Nurse {
        #[serde(rename = "assignedWardId", default, skip_serializing_if = "Option::is_none")]
        assigned_ward_id: Option<String>,
    },
    General { role: Role },
}

impl StaffProfile {
    /// Builds the profile variant for `role`; the ward is dropped for non-nurses.
    pub fn for_role(role: Role, assigned_ward_id: Option<String>) -> Self {
        match role {
            Role::Nurse => StaffProfile::Nurse { assigned_ward_id },
            role => StaffProfile::General { role },
        }
    }

    pub fn role(&self) -> Role {
        match self {
            StaffProfile::Nurse { .. } => Role::Nurse,
            StaffProfile::General { role } => *role,
        }
    }

    pub fn assigned_ward(&self) -> Option<&str> {
        match self {
            StaffProfile::Nurse { assigned_ward_id } => assigned_ward_id.as_deref(),
            StaffProfile::General { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffUser {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub department: Department,
    pub profile: StaffProfile,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl StaffUser {
    pub fn role(&self) -> Role {
        self.profile.role()
    }
}
