// security/src/roles.rs
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use models::{Role, StaffUser};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::AuthError;

/// Actions guarded server-side. `Superuser` grants every other permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewPatients,
    RegisterPatients,
    AdmitPatients,
    ManageBilling,
    RecordPayments,
    RequestDischarge,
    ApproveDischarge,
    RecordClinicalNotes,
    ManagePriceList,
    ManageInventory,
    ManageWards,
    ManageUsers,
    ViewReports,
    Messaging,
    Superuser,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct RoleConfig {
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct RolesConfig {
    pub roles: HashMap<Role, RoleConfig>,
}

impl Default for RolesConfig {
    fn default() -> Self {
        use Permission::*;
        let table: [(Role, &[Permission]); 11] = [
            (Role::Admin, &[Superuser]),
            (
                Role::Accountant,
                &[ViewPatients, ManageBilling, RecordPayments, ApproveDischarge, ManagePriceList, ViewReports, Messaging],
            ),
            (Role::Cashier, &[ViewPatients, ManageBilling, RecordPayments, Messaging]),
            (Role::Nurse, &[ViewPatients, AdmitPatients, RequestDischarge, RecordClinicalNotes, Messaging]),
            (Role::Doctor, &[ViewPatients, AdmitPatients, RequestDischarge, RecordClinicalNotes, Messaging]),
            (Role::Pharmacist, &[ViewPatients, ManageBilling, ManageInventory, RecordClinicalNotes, Messaging]),
            (Role::LabScientist, &[ViewPatients, ManageBilling, RecordClinicalNotes, Messaging]),
            (Role::Radiologist, &[ViewPatients, ManageBilling, RecordClinicalNotes, Messaging]),
            (Role::Physiotherapist, &[ViewPatients, RecordClinicalNotes, Messaging]),
            (Role::RecordsOfficer, &[ViewPatients, RegisterPatients, AdmitPatients, Messaging]),
            (Role::Storekeeper, &[ManageInventory, ViewReports, Messaging]),
        ];
        RolesConfig {
            roles: table
                .into_iter()
                .map(|(role, permissions)| (role, RoleConfig { permissions: permissions.to_vec() }))
                .collect(),
        }
    }
}

impl RolesConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).with_context(|| format!("reading roles file {:?}", path))?;
        let config: RolesConfig =
            serde_yaml::from_str(&content).with_context(|| format!("parsing roles file {:?}", path))?;
        debug!("Loaded {} role definitions from {:?}", config.roles.len(), path);
        Ok(config)
    }

    pub fn permissions_for(&self, role: Role) -> HashSet<Permission> {
        self.roles
            .get(&role)
            .map(|cfg| cfg.permissions.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn has_permission(&self, role: Role, permission: Permission) -> bool {
        self.roles.get(&role).is_some_and(|cfg| {
            cfg.permissions.contains(&permission) || cfg.permissions.contains(&Permission::Superuser)
        })
    }

    /// Roles granted `permission`, in `Role::ALL` order.
    pub fn roles_with(&self, permission: Permission) -> Vec<Role> {
        Role::ALL
            .into_iter()
            .filter(|role| self.has_permission(*role, permission))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Authorizer {
    roles: Arc<RolesConfig>,
}

impl Default for Authorizer {
    fn default() -> Self {
        Authorizer::new(RolesConfig::default())
    }
}

impl Authorizer {
    pub fn new(roles: RolesConfig) -> Self {
        Authorizer { roles: Arc::new(roles) }
    }

    /// Built-in table, or the YAML override when one is configured.
    pub fn from_file(roles_file: Option<&Path>) -> Result<Self> {
        match roles_file {
            Some(path) => Ok(Authorizer::new(RolesConfig::from_yaml_file(path)?)),
            None => Ok(Authorizer::default()),
        }
    }

    pub fn roles(&self) -> &RolesConfig {
        &self.roles
    }

    pub fn check(&self, user: &StaffUser, permission: Permission) -> Result<(), AuthError> {
        if !user.active {
            return Err(AuthError::InactiveAccount);
        }
        if !self.roles.has_permission(user.role(), permission) {
            return Err(AuthError::Forbidden(format!("{} lacks the {} permission", user.role(), permission)));
        }
        Ok(())
    }

    pub fn roles_with(&self, permission: Permission) -> Vec<Role> {
        self.roles.roles_with(permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use models::{Department, StaffProfile};
    use std::io::Write;

    fn user(role: Role, active: bool) -> StaffUser {
        StaffUser {
            uid: "u-1".to_string(),
            email: "u1@example.org".to_string(),
            display_name: "U One".to_string(),
            department: Department::Accounts,
            profile: StaffProfile::for_role(role, None),
            active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn should_grant_admin_everything() {
        let authorizer = Authorizer::default();
        assert!(authorizer.check(&user(Role::Admin, true), Permission::ManageUsers).is_ok());
        assert!(authorizer.check(&user(Role::Admin, true), Permission::ApproveDischarge).is_ok());
    }

    #[test]
    fn should_refuse_inactive_users_and_missing_permissions() {
        let authorizer = Authorizer::default();
        assert!(matches!(
            authorizer.check(&user(Role::Accountant, false), Permission::ViewPatients),
            Err(AuthError::InactiveAccount)
        ));
        assert!(matches!(
            authorizer.check(&user(Role::Cashier, true), Permission::ApproveDischarge),
            Err(AuthError::Forbidden(_))
        ));
    }

    #[test]
    fn should_list_discharge_approvers() {
        assert_eq!(
            RolesConfig::default().roles_with(Permission::ApproveDischarge),
            vec![Role::Admin, Role::Accountant]
        );
    }

    #[test]
    fn should_load_overrides_from_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "roles:\n  Cashier:\n    permissions: [view_patients, approve_discharge]").unwrap();
        let config = RolesConfig::from_yaml_file(file.path()).unwrap();
        assert!(config.has_permission(Role::Cashier, Permission::ApproveDischarge));
        assert!(!config.has_permission(Role::Nurse, Permission::ViewPatients));
    }

    #[test]
    fn should_ship_a_sample_matching_the_builtin_table() {
        let sample = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/roles.yaml");
        assert_eq!(RolesConfig::from_yaml_file(sample).unwrap(), RolesConfig::default());
    }
}
