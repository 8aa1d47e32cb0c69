use axum::extract::Path;
use axum::routing::{get, put};
use axum::{Extension, Router};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{Authorized, Principal};
use crate::err::{Error, Listing};
use crate::models::{Message, Record, Resource};
use crate::role::{AnyRole, Role};
use crate::{breaks, parse_id, proceeds, AppState, JsonBody, Payload};

pub fn routes(router: Router) -> Router {
    router
        .route("/api/messages", get(inbox).post(send))
        .route("/api/messages/sent", get(sent))
        .route("/api/messages/read/:id", put(mark_read))
}

async fn mailbox(
    state: &AppState,
    principal: &Principal,
    field: &str,
) -> Result<Vec<Record<Message>>, Error> {
    let docs = state
        .store
        .find_by_field(Message::COLLECTION, field, &principal.subject_id.to_string())
        .await?;
    let mut messages = Record::<Message>::from_documents(docs)?;
    messages.retain(|m| match field {
        "sender_id" => m.data.sender_role == principal.role,
        _ => m.data.recipient_role == principal.role,
    });
    messages.sort_by(|a, b| b.data.sent_at.cmp(&a.data.sent_at));
    Ok(messages)
}

pub async fn inbox(
    auth: Authorized<AnyRole>,
    Extension(state): Extension<AppState>,
) -> Payload<Listing<Record<Message>>> {
    proceeds(Listing::of(
        mailbox(&state, &auth.principal, "recipient_id").await?,
    ))
}

pub async fn sent(
    auth: Authorized<AnyRole>,
    Extension(state): Extension<AppState>,
) -> Payload<Listing<Record<Message>>> {
    proceeds(Listing::of(mailbox(&state, &auth.principal, "sender_id").await?))
}

pub async fn send(
    auth: Authorized<AnyRole>,
    Extension(state): Extension<AppState>,
    JsonBody(draft): JsonBody<SendMessage>,
) -> Payload<Record<Message>> {
    if state
        .store
        .get(draft.recipient_role.collection(), draft.recipient_id)
        .await?
        .is_none()
    {
        return breaks(Error::not_found(format!(
            "No {} with id `{}` to send to",
            draft.recipient_role, draft.recipient_id
        )));
    }

    let mut message = Message {
        sender_id: auth.principal.subject_id,
        sender_role: auth.principal.role,
        recipient_id: draft.recipient_id,
        recipient_role: draft.recipient_role,
        subject: draft.subject,
        body: draft.body,
        sent_at: Utc::now(),
        read: false,
    };
    message.validate()?;
    let doc = state
        .store
        .insert(Message::COLLECTION, serde_json::to_value(&message)?)
        .await?;
    proceeds(Record::from_document(doc)?)
}

pub async fn mark_read(
    auth: Authorized<AnyRole>,
    Path(id): Path<String>,
    Extension(state): Extension<AppState>,
) -> Payload<Record<Message>> {
    let id = parse_id(&id)?;
    let not_found = || Error::not_found(format!("No message with id `{}`", id));
    let mut message = match state.store.get(Message::COLLECTION, id).await? {
        Some(doc) => Record::<Message>::from_document(doc)?,
        None => return breaks(not_found()),
    };
    // other people's mail is reported as absent
    if message.data.recipient_id != auth.principal.subject_id
        || message.data.recipient_role != auth.principal.role
    {
        return breaks(not_found());
    }
    message.data.read = true;
    let doc = state
        .store
        .update(Message::COLLECTION, id, serde_json::to_value(&message.data)?)
        .await?
        .ok_or_else(not_found)?;
    proceeds(Record::from_document(doc)?)
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessage {
    pub recipient_id: Uuid,
    pub recipient_role: Role,
    pub subject: String,
    pub body: String,
}
