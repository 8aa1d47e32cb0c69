//! Self-service endpoints: everything returned is scoped to the caller's own
//! record, which the guard has already resolved.

use axum::routing::get;
use axum::{Extension, Router};
use uuid::Uuid;

use crate::announcements::visible_to;
use crate::auth::Authorized;
use crate::err::{Error, Listing};
use crate::models::{
    Announcement, Assignment, Attendance, Audience, Class, Parent, Record, Resource, Student,
    Teacher,
};
use crate::resources::crud;
use crate::role::{ParentOnly, StudentOnly, TeacherOnly, TeacherOrAdmin};
use crate::store::Store;
use crate::{proceeds, AppState, Payload};

pub fn student_routes(router: Router) -> Router {
    router
        .route("/api/student/profile", get(student_profile))
        .route("/api/student/announcements", get(student_announcements))
        .route("/api/student/assignments", get(student_assignments))
        .route("/api/student/attendance", get(student_attendance))
}

pub fn teacher_routes(router: Router) -> Router {
    let router = crud::<Assignment, TeacherOrAdmin>(router, "/api/teacher/assignments");
    let router = crud::<Attendance, TeacherOrAdmin>(router, "/api/teacher/attendance");
    router
        .route("/api/teacher/profile", get(teacher_profile))
        .route("/api/teacher/classes", get(teacher_classes))
        .route("/api/teacher/announcements", get(teacher_announcements))
}

pub fn parent_routes(router: Router) -> Router {
    router
        .route("/api/parent/profile", get(parent_profile))
        .route("/api/parent/children", get(parent_children))
        .route("/api/parent/attendance", get(parent_attendance))
        .route("/api/parent/announcements", get(parent_announcements))
}

async fn find<R: Resource>(
    store: &Store,
    field: &str,
    id: Uuid,
) -> Result<Vec<Record<R>>, Error> {
    let docs = store
        .find_by_field(R::COLLECTION, field, &id.to_string())
        .await?;
    Record::from_documents(docs)
}

async fn announcements(store: &Store) -> Result<Vec<Record<Announcement>>, Error> {
    Record::from_documents(store.list(Announcement::COLLECTION).await?)
}

fn newest_attendance_first(records: &mut [Record<Attendance>]) {
    records.sort_by(|a, b| b.data.date.cmp(&a.data.date));
}

pub async fn student_profile(
    auth: Authorized<StudentOnly>,
    Extension(state): Extension<AppState>,
) -> Payload<Record<Student>> {
    proceeds(auth.own_record::<Student>()?)
}

pub async fn student_announcements(
    auth: Authorized<StudentOnly>,
    Extension(state): Extension<AppState>,
) -> Payload<Listing<Record<Announcement>>> {
    let student = auth.own_record::<Student>()?;
    let all = announcements(&state.store).await?;
    proceeds(Listing::of(visible_to(
        all,
        Audience::Students,
        &[student.data.grade_id],
    )))
}

pub async fn student_assignments(
    auth: Authorized<StudentOnly>,
    Extension(state): Extension<AppState>,
) -> Payload<Listing<Record<Assignment>>> {
    let student = auth.own_record::<Student>()?;
    let mut assignments = match student.data.class_id {
        Some(class_id) => find::<Assignment>(&state.store, "class_id", class_id).await?,
        None => Vec::new(),
    };
    assignments.sort_by(|a, b| a.data.due_date.cmp(&b.data.due_date));
    proceeds(Listing::of(assignments))
}

pub async fn student_attendance(
    auth: Authorized<StudentOnly>,
    Extension(state): Extension<AppState>,
) -> Payload<Listing<Record<Attendance>>> {
    let student = auth.own_record::<Student>()?;
    let mut records = find::<Attendance>(&state.store, "student_id", student.id).await?;
    newest_attendance_first(&mut records);
    proceeds(Listing::of(records))
}

pub async fn teacher_profile(
    auth: Authorized<TeacherOnly>,
    Extension(state): Extension<AppState>,
) -> Payload<Record<Teacher>> {
    proceeds(auth.own_record::<Teacher>()?)
}

pub async fn teacher_classes(
    auth: Authorized<TeacherOnly>,
    Extension(state): Extension<AppState>,
) -> Payload<Listing<Record<Class>>> {
    let teacher = auth.own_record::<Teacher>()?;
    proceeds(Listing::of(
        find::<Class>(&state.store, "supervisor_id", teacher.id).await?,
    ))
}

pub async fn teacher_announcements(
    _auth: Authorized<TeacherOnly>,
    Extension(state): Extension<AppState>,
) -> Payload<Listing<Record<Announcement>>> {
    let all = announcements(&state.store).await?;
    proceeds(Listing::of(visible_to(all, Audience::Teachers, &[])))
}

pub async fn parent_profile(
    auth: Authorized<ParentOnly>,
    Extension(state): Extension<AppState>,
) -> Payload<Record<Parent>> {
    proceeds(auth.own_record::<Parent>()?)
}

async fn children(
    auth: &Authorized<ParentOnly>,
    store: &Store,
) -> Result<Vec<Record<Student>>, Error> {
    let parent = auth.own_record::<Parent>()?;
    find::<Student>(store, "parent_id", parent.id).await
}

pub async fn parent_children(
    auth: Authorized<ParentOnly>,
    Extension(state): Extension<AppState>,
) -> Payload<Listing<Record<Student>>> {
    proceeds(Listing::of(children(&auth, &state.store).await?))
}

pub async fn parent_attendance(
    auth: Authorized<ParentOnly>,
    Extension(state): Extension<AppState>,
) -> Payload<Listing<Record<Attendance>>> {
    let mut records = Vec::new();
    for child in children(&auth, &state.store).await? {
        records.extend(find::<Attendance>(&state.store, "student_id", child.id).await?);
    }
    newest_attendance_first(&mut records);
    proceeds(Listing::of(records))
}

pub async fn parent_announcements(
    auth: Authorized<ParentOnly>,
    Extension(state): Extension<AppState>,
) -> Payload<Listing<Record<Announcement>>> {
    let grades: Vec<Uuid> = children(&auth, &state.store)
        .await?
        .into_iter()
        .map(|child| child.data.grade_id)
        .collect();
    let all = announcements(&state.store).await?;
    proceeds(Listing::of(visible_to(all, Audience::Parents, &grades)))
}
