// lib/src/services/notifications.rs

use std::sync::Arc;

use models::{new_document_id, HospitalError, HospitalResult, Notification, NotificationKind, Role, StaffUser};
use serde_json::json;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::session::SessionContext;
use crate::storage_engine::{list_typed, query_typed, to_document, Collection, DocumentStore, QueryFilter, WriteBatch};

use super::load;

/// Which roles receive workflow notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRouting {
    pub discharge_approvers: Vec<Role>,
    pub stock_watchers: Vec<Role>,
}

impl Default for NotificationRouting {
    fn default() -> Self {
        NotificationRouting {
            discharge_approvers: vec![Role::Admin, Role::Accountant],
            stock_watchers: vec![Role::Admin, Role::Storekeeper, Role::Pharmacist],
        }
    }
}

/// Content of a notification before it is addressed to anyone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub sender_uid: Option<String>,
    pub patient_id: Option<String>,
}

impl NotificationDraft {
    pub fn new(kind: NotificationKind, title: impl Into<String>, body: impl Into<String>) -> Self {
        NotificationDraft { kind, title: title.into(), body: body.into(), sender_uid: None, patient_id: None }
    }

    pub fn from_sender(mut self, uid: impl Into<String>) -> Self {
        self.sender_uid = Some(uid.into());
        self
    }

    pub fn about_patient(mut self, patient_id: impl Into<String>) -> Self {
        self.patient_id = Some(patient_id.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct NotificationService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        NotificationService { store, clock }
    }

    /// Builds the document for `recipient_uid` without writing it, so callers
    /// can put it in the same batch as the change it reports.
    pub fn address(&self, recipient_uid: &str, draft: &NotificationDraft) -> Notification {
        Notification {
            id: new_document_id(),
            recipient_uid: recipient_uid.to_string(),
            sender_uid: draft.sender_uid.clone(),
            kind: draft.kind,
            title: draft.title.clone(),
            body: draft.body.clone(),
            patient_id: draft.patient_id.clone(),
            read: false,
            created_at: self.clock.now(),
        }
    }

    pub fn stage(&self, batch: &mut WriteBatch, recipient_uid: &str, draft: &NotificationDraft) -> HospitalResult<()> {
        let notification = self.address(recipient_uid, draft);
        batch.create(Collection::Notifications, notification.id.clone(), to_document(&notification)?);
        Ok(())
    }

    pub async fn notify(&self, recipient_uid: &str, draft: &NotificationDraft) -> HospitalResult<Notification> {
        let notification = self.address(recipient_uid, draft);
        let mut batch = WriteBatch::new();
        batch.create(Collection::Notifications, notification.id.clone(), to_document(&notification)?);
        self.store.commit(batch).await?;
        debug!(recipient = recipient_uid, kind = ?draft.kind, "Notification sent");
        Ok(notification)
    }

    /// Active users holding any of `roles`.
    pub async fn recipients_with_roles(&self, roles: &[Role]) -> HospitalResult<Vec<StaffUser>> {
        let users: Vec<StaffUser> = list_typed(self.store.as_ref(), &Collection::Users.path()).await?;
        Ok(users
            .into_iter()
            .filter(|user| user.active && roles.contains(&user.role()))
            .collect())
    }

    /// Sends one notification per active user holding any of `roles`.
    pub async fn notify_roles(&self, roles: &[Role], draft: &NotificationDraft) -> HospitalResult<usize> {
        let recipients = self.recipients_with_roles(roles).await?;
        if recipients.is_empty() {
            return Ok(0);
        }
        let mut batch = WriteBatch::new();
        for user in &recipients {
            self.stage(&mut batch, &user.uid, draft)?;
        }
        self.store.commit(batch).await?;
        info!(count = recipients.len(), kind = ?draft.kind, "Notified users by role");
        Ok(recipients.len())
    }

    /// Newest first.
    pub async fn list_for(&self, uid: &str, unread_only: bool) -> HospitalResult<Vec<Notification>> {
        let mut filters = vec![QueryFilter::eq("recipientUid", uid)];
        if unread_only {
            filters.push(QueryFilter::eq("read", false));
        }
        let mut notifications: Vec<Notification> =
            query_typed(self.store.as_ref(), &Collection::Notifications.path(), &filters).await?;
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    pub async fn unread_count(&self, uid: &str) -> HospitalResult<usize> {
        Ok(self.list_for(uid, true).await?.len())
    }

    pub async fn mark_read(&self, session: &SessionContext, notification_id: &str) -> HospitalResult<()> {
        let notification: Notification = load(
            self.store.as_ref(),
            &Collection::Notifications.path(),
            notification_id,
            "Notification",
        )
        .await?;
        if notification.recipient_uid != session.uid() {
            return Err(HospitalError::Forbidden("notification belongs to another user".to_string()));
        }
        if notification.read {
            return Ok(());
        }
        let mut batch = WriteBatch::new();
        batch.merge(Collection::Notifications, notification_id, [("read", json!(true))]);
        self.store.commit(batch).await?;
        Ok(())
    }

    pub async fn mark_all_read(&self, session: &SessionContext) -> HospitalResult<usize> {
        let unread = self.list_for(session.uid(), true).await?;
        if unread.is_empty() {
            return Ok(0);
        }
        let mut batch = WriteBatch::new();
        for notification in &unread {
            batch.merge(Collection::Notifications, notification.id.clone(), [("read", json!(true))]);
        }
        self.store.commit(batch).await?;
        Ok(unread.len())
    }
}
