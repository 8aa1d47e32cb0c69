use std::collections::BTreeMap;

use axum::extract::Path;
use axum::routing::get;
use axum::{Extension, Router};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::{Authorized, Principal};
use crate::err::{Error, Listing};
use crate::models::{
    Admin, Announcement, Assignment, Attendance, Class, Credential, Grade, Message, Parent, Record,
    Reference, Resource, Student, Subject, Teacher,
};
use crate::role::{AcceptedRoles, AdminOnly, Role};
use crate::store::Store;
use crate::{breaks, parse_id, proceeds, AppState, JsonBody, Payload};

/// Mounts list/create at `base` and read/update/delete at `base/:id`.
pub fn crud<R: Resource, A: AcceptedRoles>(router: Router, base: &str) -> Router {
    router
        .route(base, get(list::<R, A>).post(create::<R, A>))
        .route(
            &format!("{}/:id", base),
            get(read::<R, A>).put(update::<R, A>).delete(delete::<R, A>),
        )
}

/// Mounts list at `base` and read/delete at `base/:id`.
pub fn read_delete<R: Resource, A: AcceptedRoles>(router: Router, base: &str) -> Router {
    router.route(base, get(list::<R, A>)).route(
        &format!("{}/:id", base),
        get(read::<R, A>).delete(delete::<R, A>),
    )
}

pub fn admin_routes(router: Router) -> Router {
    let router = crud::<Admin, AdminOnly>(router, "/api/admin/admins");
    let router = crud::<Student, AdminOnly>(router, "/api/admin/students");
    let router = crud::<Teacher, AdminOnly>(router, "/api/admin/teachers");
    let router = crud::<Parent, AdminOnly>(router, "/api/admin/parents");
    let router = crud::<Grade, AdminOnly>(router, "/api/admin/grades");
    let router = crud::<Class, AdminOnly>(router, "/api/admin/classes");
    let router = crud::<Subject, AdminOnly>(router, "/api/admin/subjects");
    let router = crud::<Assignment, AdminOnly>(router, "/api/admin/assignments");
    let router = crud::<Attendance, AdminOnly>(router, "/api/admin/attendance");
    let router = crud::<Announcement, AdminOnly>(router, "/api/admin/announcements");
    let router = read_delete::<Message, AdminOnly>(router, "/api/admin/messages");
    router.route("/api/admin/summary", get(summary))
}

fn missing<R: Resource>(id: Uuid) -> Error {
    Error::not_found(format!("No {} with id `{}`", R::NOUN, id))
}

async fn check_references(store: &Store, references: &[Reference]) -> Result<(), Error> {
    for reference in references {
        if store.get(reference.collection, reference.id).await?.is_none() {
            return Err(Error::invalid(format!(
                "`{}` refers to `{}` which does not exist in {}",
                reference.field, reference.id, reference.collection
            )));
        }
    }
    Ok(())
}

async fn check_unique<R: Resource>(
    store: &Store,
    body: &R,
    own_id: Option<Uuid>,
) -> Result<(), Error> {
    let username = match body.username() {
        Some(username) => username,
        None => return Ok(()),
    };
    let taken = store
        .find_by_field(R::COLLECTION, "username", username)
        .await?
        .iter()
        .any(|doc| Some(doc.id) != own_id);
    if taken {
        return Err(Error::Conflict {
            message: format!("A {} named `{}` already exists", R::NOUN, username),
        });
    }
    Ok(())
}

/// What the caller may touch through the shared CRUD handlers. Admins see
/// everything; anyone else only their own assignments and records filed
/// against classes they supervise.
enum Scope {
    Everything,
    Owner { id: Uuid, classes: Vec<Uuid> },
}

impl Scope {
    async fn of(store: &Store, principal: &Principal) -> Result<Self, Error> {
        if principal.role == Role::Admin {
            return Ok(Scope::Everything);
        }
        let classes = store
            .find_by_field(
                Class::COLLECTION,
                "supervisor_id",
                &principal.subject_id.to_string(),
            )
            .await?
            .into_iter()
            .map(|doc| doc.id)
            .collect();
        Ok(Scope::Owner {
            id: principal.subject_id,
            classes,
        })
    }

    fn permits<R: Resource>(&self, record: &R) -> bool {
        match self {
            Scope::Everything => true,
            Scope::Owner { id, classes } => {
                record.teacher_id() == Some(*id)
                    || record
                        .class_id()
                        .map_or(false, |class_id| classes.contains(&class_id))
            }
        }
    }

    fn claim<R: Resource>(&self, record: &mut R) {
        if let Scope::Owner { id, .. } = self {
            record.assign_teacher(*id);
        }
    }
}

fn out_of_scope<R: Resource>() -> Error {
    Error::Forbidden {
        message: format!("This {} is not yours to file", R::NOUN),
    }
}

/// Loads a record the caller is allowed to see. Records outside the caller's
/// scope are reported as missing.
async fn scoped<R: Resource>(
    store: &Store,
    scope: &Scope,
    id: Uuid,
) -> Result<Record<R>, Error> {
    let record = match store.get(R::COLLECTION, id).await? {
        Some(doc) => Record::<R>::from_document(doc)?,
        None => return Err(missing::<R>(id)),
    };
    if !scope.permits(&record.data) {
        return Err(missing::<R>(id));
    }
    Ok(record)
}

async fn refers_to<R: Resource>(
    store: &Store,
    collection: &str,
    id: Uuid,
) -> Result<bool, Error> {
    let records = Record::<R>::from_documents(store.list(R::COLLECTION).await?)?;
    Ok(records.iter().any(|record| {
        record
            .data
            .references()
            .iter()
            .any(|r| r.collection == collection && r.id == id)
    }))
}

/// Refuses to delete a record that other records still point at.
async fn check_unreferenced<R: Resource>(store: &Store, id: Uuid) -> Result<(), Error> {
    let referrers = [
        (Student::NOUN, refers_to::<Student>(store, R::COLLECTION, id).await?),
        (Teacher::NOUN, refers_to::<Teacher>(store, R::COLLECTION, id).await?),
        (Class::NOUN, refers_to::<Class>(store, R::COLLECTION, id).await?),
        (Assignment::NOUN, refers_to::<Assignment>(store, R::COLLECTION, id).await?),
        (Attendance::NOUN, refers_to::<Attendance>(store, R::COLLECTION, id).await?),
        (Announcement::NOUN, refers_to::<Announcement>(store, R::COLLECTION, id).await?),
    ];
    match referrers.iter().find(|(_, found)| *found) {
        Some((noun, _)) => Err(Error::Conflict {
            message: format!("{} `{}` is still referenced by a {}", R::NOUN, id, noun),
        }),
        None => Ok(()),
    }
}

/// Drops the login secrets of a deleted person record.
async fn forget_credentials<R: Resource>(store: &Store, id: Uuid) -> Result<(), Error> {
    let role = match Role::ALL.iter().find(|role| role.collection() == R::COLLECTION) {
        Some(role) => *role,
        None => return Ok(()),
    };
    let docs = store
        .find_by_field(Credential::COLLECTION, "subject_id", &id.to_string())
        .await?;
    for credential in Record::<Credential>::from_documents(docs)? {
        if credential.data.role == role {
            store.delete(Credential::COLLECTION, credential.id).await?;
        }
    }
    Ok(())
}

pub async fn list<R: Resource, A: AcceptedRoles>(
    auth: Authorized<A>,
    Extension(state): Extension<AppState>,
) -> Payload<Listing<Record<R>>> {
    let scope = Scope::of(&state.store, &auth.principal).await?;
    let mut records = Record::<R>::from_documents(state.store.list(R::COLLECTION).await?)?;
    records.retain(|record| scope.permits(&record.data));
    proceeds(Listing::of(records))
}

pub async fn read<R: Resource, A: AcceptedRoles>(
    auth: Authorized<A>,
    Path(id): Path<String>,
    Extension(state): Extension<AppState>,
) -> Payload<Record<R>> {
    let id = parse_id(&id)?;
    let scope = Scope::of(&state.store, &auth.principal).await?;
    proceeds(scoped::<R>(&state.store, &scope, id).await?)
}

pub async fn create<R: Resource, A: AcceptedRoles>(
    auth: Authorized<A>,
    Extension(state): Extension<AppState>,
    JsonBody(mut body): JsonBody<R>,
) -> Payload<Record<R>> {
    body.validate()?;
    let scope = Scope::of(&state.store, &auth.principal).await?;
    scope.claim(&mut body);
    if !scope.permits(&body) {
        return breaks(out_of_scope::<R>());
    }
    check_references(&state.store, &body.references()).await?;
    check_unique(&state.store, &body, None).await?;

    let doc = state
        .store
        .insert(R::COLLECTION, serde_json::to_value(&body)?)
        .await?;
    log::info!(
        "{} {} created {} {} (session {})",
        auth.principal.role,
        auth.principal.subject_id,
        R::NOUN,
        doc.id,
        auth.principal.session_id
    );
    proceeds(Record::from_document(doc)?)
}

pub async fn update<R: Resource, A: AcceptedRoles>(
    auth: Authorized<A>,
    Path(id): Path<String>,
    Extension(state): Extension<AppState>,
    JsonBody(mut body): JsonBody<R>,
) -> Payload<Record<R>> {
    let id = parse_id(&id)?;
    body.validate()?;
    let scope = Scope::of(&state.store, &auth.principal).await?;
    scoped::<R>(&state.store, &scope, id).await?;
    scope.claim(&mut body);
    if !scope.permits(&body) {
        return breaks(out_of_scope::<R>());
    }
    check_references(&state.store, &body.references()).await?;
    check_unique(&state.store, &body, Some(id)).await?;

    let doc = state
        .store
        .update(R::COLLECTION, id, serde_json::to_value(&body)?)
        .await?
        .ok_or_else(|| missing::<R>(id))?;
    log::info!(
        "{} {} updated {} {} (session {})",
        auth.principal.role,
        auth.principal.subject_id,
        R::NOUN,
        id,
        auth.principal.session_id
    );
    proceeds(Record::from_document(doc)?)
}

pub async fn delete<R: Resource, A: AcceptedRoles>(
    auth: Authorized<A>,
    Path(id): Path<String>,
    Extension(state): Extension<AppState>,
) -> Payload<Deleted> {
    let id = parse_id(&id)?;
    let scope = Scope::of(&state.store, &auth.principal).await?;
    scoped::<R>(&state.store, &scope, id).await?;
    if R::COLLECTION == Admin::COLLECTION && state.store.count(Admin::COLLECTION).await? <= 1 {
        return breaks(Error::Conflict {
            message: "The last admin cannot be deleted".to_string(),
        });
    }
    check_unreferenced::<R>(&state.store, id).await?;

    if !state.store.delete(R::COLLECTION, id).await? {
        return breaks(missing::<R>(id));
    }
    forget_credentials::<R>(&state.store, id).await?;
    log::info!(
        "{} {} deleted {} {} (session {})",
        auth.principal.role,
        auth.principal.subject_id,
        R::NOUN,
        id,
        auth.principal.session_id
    );
    proceeds(Deleted { id, deleted: true })
}

pub async fn summary(
    _auth: Authorized<AdminOnly>,
    Extension(state): Extension<AppState>,
) -> Payload<Summary> {
    let mut counts = BTreeMap::new();
    for collection in [
        Student::COLLECTION,
        Teacher::COLLECTION,
        Parent::COLLECTION,
        Grade::COLLECTION,
        Class::COLLECTION,
        Subject::COLLECTION,
        Assignment::COLLECTION,
        Attendance::COLLECTION,
        Announcement::COLLECTION,
        Message::COLLECTION,
    ] {
        counts.insert(collection, state.store.count(collection).await?);
    }
    proceeds(Summary {
        backend: state.store.backend_tag(),
        counts,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct Deleted {
    pub id: Uuid,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub backend: &'static str,
    pub counts: BTreeMap<&'static str, i64>,
}
