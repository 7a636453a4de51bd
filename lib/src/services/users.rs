// lib/src/services/users.rs

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use models::errors::require_text;
use models::{Department, HospitalError, HospitalResult, Role, StaffProfile, StaffUser, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::session::SessionContext;
use crate::storage_engine::{list_typed, to_document, Collection, DocumentStore, WriteBatch};

use super::load;
use super::wards::WardService;

/// Creates and removes the login credentials behind a staff profile.
#[async_trait]
pub trait AccountProvisioner: Send + Sync + Debug {
    /// Returns the uid of the new account.
    async fn create_account(&self, email: &str, password: &str) -> HospitalResult<String>;

    async fn remove_account(&self, uid: &str) -> HospitalResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStaff {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub department: Department,
    pub role: Role,
    #[serde(default)]
    pub assigned_ward_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleChange {
    pub department: Department,
    pub role: Role,
    #[serde(default)]
    pub assigned_ward_id: Option<String>,
}

pub fn validate_department_role(department: Department, role: Role) -> HospitalResult<()> {
    if !department.allows(role) {
        return Err(ValidationError::RoleNotAllowed { role: role.to_string(), department: department.to_string() }.into());
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct UserService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    provisioner: Arc<dyn AccountProvisioner>,
    wards: WardService,
}

impl UserService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        provisioner: Arc<dyn AccountProvisioner>,
        wards: WardService,
    ) -> Self {
        UserService { store, clock, provisioner, wards }
    }

    /// Creates the account and the `users/{uid}` profile. When the profile
    /// cannot be written the fresh account is removed again.
    pub async fn create_staff(&self, session: &SessionContext, request: NewStaff) -> HospitalResult<StaffUser> {
        let display_name = require_text("displayName", &request.display_name)?;
        let email = normalize_email(&request.email)?;
        validate_department_role(request.department, request.role)?;
        let profile = self.profile_for(request.role, request.assigned_ward_id).await?;
        if self.find_by_email(&email).await?.is_some() {
            return Err(HospitalError::Conflict(format!("a staff member with email {} already exists", email)));
        }

        let uid = self.provisioner.create_account(&email, &request.password).await?;
        let user = StaffUser {
            uid: uid.clone(),
            email,
            display_name,
            department: request.department,
            profile,
            active: true,
            created_at: self.clock.now(),
        };
        let mut batch = WriteBatch::new();
        batch.create(Collection::Users, uid.clone(), to_document(&user)?);
        if let Err(e) = self.store.commit(batch).await {
            if let Err(cleanup) = self.provisioner.remove_account(&uid).await {
                warn!(%uid, error = %cleanup, "Orphaned account left behind");
            }
            return Err(e.into());
        }
        info!(%uid, role = %user.role(), department = %user.department, by = session.uid(), "Staff member created");
        Ok(user)
    }

    /// Moves a staff member to another department/role. The profile variant
    /// is rebuilt, so a ward assignment only survives for nurses.
    pub async fn change_role(&self, session: &SessionContext, uid: &str, change: RoleChange) -> HospitalResult<StaffUser> {
        let existing = self.get(uid).await?;
        validate_department_role(change.department, change.role)?;
        let profile = self.profile_for(change.role, change.assigned_ward_id).await?;
        let mut batch = WriteBatch::new();
        batch.merge(
            Collection::Users,
            uid,
            [("department", json!(change.department)), ("profile", to_document(&profile)?)],
        );
        self.store.commit(batch).await?;
        info!(uid, from = %existing.role(), to = %change.role, by = session.uid(), "Staff role changed");
        Ok(StaffUser { department: change.department, profile, ..existing })
    }

    pub async fn set_active(&self, session: &SessionContext, uid: &str, active: bool) -> HospitalResult<StaffUser> {
        if uid == session.uid() && !active {
            return Err(HospitalError::invalid_state("staff cannot deactivate their own account"));
        }
        let existing = self.get(uid).await?;
        let mut batch = WriteBatch::new();
        batch.merge(Collection::Users, uid, [("active", json!(active))]);
        self.store.commit(batch).await?;
        info!(uid, active, by = session.uid(), "Staff activation changed");
        Ok(StaffUser { active, ..existing })
    }

    pub async fn update_display_name(&self, session: &SessionContext, display_name: &str) -> HospitalResult<StaffUser> {
        let display_name = require_text("displayName", display_name)?;
        let existing = self.get(session.uid()).await?;
        let mut batch = WriteBatch::new();
        batch.merge(Collection::Users, session.uid(), [("displayName", json!(display_name))]);
        self.store.commit(batch).await?;
        Ok(StaffUser { display_name, ..existing })
    }

    pub async fn get(&self, uid: &str) -> HospitalResult<StaffUser> {
        load(self.store.as_ref(), &Collection::Users.path(), uid, "Staff member").await
    }

    pub async fn find_by_email(&self, email: &str) -> HospitalResult<Option<StaffUser>> {
        let email = email.trim().to_lowercase();
        Ok(self.list().await?.into_iter().find(|user| user.email == email))
    }

    /// Sorted by display name.
    pub async fn list(&self) -> HospitalResult<Vec<StaffUser>> {
        let mut users: Vec<StaffUser> = list_typed(self.store.as_ref(), &Collection::Users.path()).await?;
        users.sort_by(|a, b| a.display_name.to_lowercase().cmp(&b.display_name.to_lowercase()));
        Ok(users)
    }

    pub async fn staff_with_roles(&self, roles: &[Role]) -> HospitalResult<Vec<StaffUser>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|user| user.active && roles.contains(&user.role()))
            .collect())
    }

    async fn profile_for(&self, role: Role, ward_id: Option<String>) -> HospitalResult<StaffProfile> {
        let ward_id = ward_id.filter(|id| !id.trim().is_empty());
        if let (Role::Nurse, Some(id)) = (role, ward_id.as_deref()) {
            self.wards.get(id).await?;
        }
        Ok(StaffProfile::for_role(role, ward_id))
    }
}

fn normalize_email(email: &str) -> HospitalResult<String> {
    let email = require_text("email", email)?.to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !email.contains(' ') => Ok(email),
        _ => Err(ValidationError::InvalidValue { field: "email".to_string(), reason: format!("'{}' is not an email address", email) }
            .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::storage_engine::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingProvisioner {
        created: AtomicUsize,
    }

    #[async_trait]
    impl AccountProvisioner for CountingProvisioner {
        async fn create_account(&self, _email: &str, _password: &str) -> HospitalResult<String> {
            let n = self.created.fetch_add(1, Ordering::SeqCst);
            Ok(format!("uid-{}", n + 1))
        }

        async fn remove_account(&self, _uid: &str) -> HospitalResult<()> {
            Ok(())
        }
    }

    fn service() -> UserService {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryStore::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let wards = WardService::new(store.clone(), clock.clone());
        UserService::new(store, clock, Arc::new(CountingProvisioner::default()), wards)
    }

    fn nurse(email: &str) -> NewStaff {
        NewStaff {
            email: email.to_string(),
            password: "correct horse".to_string(),
            display_name: "Grace Eze".to_string(),
            department: Department::Nursing,
            role: Role::Nurse,
            assigned_ward_id: None,
        }
    }

    #[tokio::test]
    async fn should_reject_role_outside_department() {
        let users = service();
        let request = NewStaff { role: Role::Doctor, ..nurse("grace@example.org") };
        let err = users.create_staff(&SessionContext::system(), request).await.unwrap_err();
        assert!(matches!(err, HospitalError::Validation(ValidationError::RoleNotAllowed { .. })));
    }

    #[tokio::test]
    async fn should_reject_unknown_ward_for_nurse() {
        let users = service();
        let request = NewStaff { assigned_ward_id: Some("missing".to_string()), ..nurse("grace@example.org") };
        let err = users.create_staff(&SessionContext::system(), request).await.unwrap_err();
        assert!(matches!(err, HospitalError::NotFound { .. }));
    }

    #[tokio::test]
    async fn should_drop_ward_when_nurse_becomes_pharmacist() {
        let users = service();
        let session = SessionContext::system();
        let created = users.create_staff(&session, nurse("Grace@Example.org")).await.unwrap();
        assert_eq!(created.email, "grace@example.org");

        let change = RoleChange { department: Department::Pharmacy, role: Role::Pharmacist, assigned_ward_id: None };
        let changed = users.change_role(&session, &created.uid, change).await.unwrap();
        assert_eq!(changed.role(), Role::Pharmacist);
        assert_eq!(users.get(&created.uid).await.unwrap().profile, StaffProfile::General { role: Role::Pharmacist });

        let dup = users.create_staff(&session, nurse("grace@example.org")).await.unwrap_err();
        assert!(matches!(dup, HospitalError::Conflict(_)));
    }
}
