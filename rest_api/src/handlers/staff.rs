// rest_api/src/handlers/staff.rs
use axum::extract::{Path, Query, State};
use axum::Json;
use hms_lib::services::{NewStaff, RoleChange};
use security::Permission;
use serde::Deserialize;
use serde_json::json;

use crate::{success, ApiResult, AppState, AuthenticatedUser};

#[derive(Debug, Deserialize)]
pub(crate) struct ActiveFlag {
    active: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NotificationQuery {
    #[serde(default)]
    unread_only: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OutgoingMessage {
    body: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProfileUpdate {
    display_name: String,
}

pub(crate) async fn list_users_handler(State(state): State<AppState>, user: AuthenticatedUser) -> ApiResult {
    user.require(&state, Permission::ManageUsers)?;
    success(state.services.users.list().await?)
}

pub(crate) async fn create_user_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<NewStaff>,
) -> ApiResult {
    let session = user.require(&state, Permission::ManageUsers)?;
    success(state.services.users.create_staff(session, request).await?)
}

pub(crate) async fn change_role_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(uid): Path<String>,
    Json(change): Json<RoleChange>,
) -> ApiResult {
    let session = user.require(&state, Permission::ManageUsers)?;
    success(state.services.users.change_role(session, &uid, change).await?)
}

pub(crate) async fn set_active_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(uid): Path<String>,
    Json(flag): Json<ActiveFlag>,
) -> ApiResult {
    let session = user.require(&state, Permission::ManageUsers)?;
    success(state.services.users.set_active(session, &uid, flag.active).await?)
}

pub(crate) async fn list_notifications_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<NotificationQuery>,
) -> ApiResult {
    success(state.services.notifications.list_for(user.session().uid(), query.unread_only).await?)
}

pub(crate) async fn mark_read_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult {
    state.services.notifications.mark_read(user.session(), &id).await?;
    success(json!({ "id": id, "read": true }))
}

pub(crate) async fn mark_all_read_handler(State(state): State<AppState>, user: AuthenticatedUser) -> ApiResult {
    let marked = state.services.notifications.mark_all_read(user.session()).await?;
    success(json!({ "marked": marked }))
}

pub(crate) async fn conversations_handler(State(state): State<AppState>, user: AuthenticatedUser) -> ApiResult {
    let session = user.require(&state, Permission::Messaging)?;
    success(state.services.messaging.conversations(session.uid()).await?)
}

/// Messages with one colleague, oldest first. Reading marks them read.
pub(crate) async fn conversation_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(other_uid): Path<String>,
) -> ApiResult {
    let session = user.require(&state, Permission::Messaging)?;
    let messaging = &state.services.messaging;
    let messages = messaging.conversation(session.uid(), &other_uid).await?;
    messaging.mark_conversation_read(session, &other_uid).await?;
    success(messages)
}

pub(crate) async fn send_message_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(recipient_uid): Path<String>,
    Json(message): Json<OutgoingMessage>,
) -> ApiResult {
    let session = user.require(&state, Permission::Messaging)?;
    success(state.services.messaging.send(session, &recipient_uid, &message.body).await?)
}

pub(crate) async fn me_handler(State(state): State<AppState>, user: AuthenticatedUser) -> ApiResult {
    let session = user.session();
    let mut permissions: Vec<Permission> =
        state.authorizer.roles().permissions_for(session.role()).into_iter().collect();
    permissions.sort_by_key(|p| p.to_string());
    let unread = state.services.notifications.unread_count(session.uid()).await?;
    success(json!({
        "user": session.user,
        "permissions": permissions,
        "unreadNotifications": unread,
    }))
}

pub(crate) async fn update_me_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult {
    success(state.services.users.update_display_name(user.session(), &update.display_name).await?)
}
