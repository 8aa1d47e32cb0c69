use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::err::Error;
use crate::role::Role;
use crate::roman::to_roman;
use crate::store::Document;

/// A foreign key carried by a record, checked before the record is saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub field: &'static str,
    pub collection: &'static str,
    pub id: Uuid,
}

impl Reference {
    fn new(field: &'static str, collection: &'static str, id: Uuid) -> Self {
        Self {
            field,
            collection,
            id,
        }
    }
}

/// An entity kept in its own collection and served through the generic
/// CRUD endpoints.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;
    const NOUN: &'static str;

    /// Checks required fields and fills derived ones.
    fn validate(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }

    /// Login name, unique inside the collection.
    fn username(&self) -> Option<&str> {
        None
    }

    /// Teacher the record is filed under, if any.
    fn teacher_id(&self) -> Option<Uuid> {
        None
    }

    fn class_id(&self) -> Option<Uuid> {
        None
    }

    /// Files the record under the acting teacher. No-op for records
    /// without an owning teacher.
    fn assign_teacher(&mut self, _teacher_id: Uuid) {}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record<R> {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub data: R,
}

impl<R: Resource> Record<R> {
    pub fn from_document(doc: Document) -> Result<Self, Error> {
        Ok(Self {
            id: doc.id,
            created_at: doc.created_at,
            data: serde_json::from_value(doc.body.0)?,
        })
    }

    pub fn from_documents(docs: Vec<Document>) -> Result<Vec<Self>, Error> {
        docs.into_iter().map(Self::from_document).collect()
    }
}

fn required(field: &str, value: &mut String) -> Result<(), Error> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid(format!("`{}` is required", field)));
    }
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
    Ok(())
}

fn optional_email(value: &Option<String>) -> Result<(), Error> {
    match value {
        Some(email) if !email.contains('@') => {
            Err(Error::invalid(format!("`{}` is not an email address", email)))
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admin {
    pub username: String,
    pub name: String,
}

impl Resource for Admin {
    const COLLECTION: &'static str = "admins";
    const NOUN: &'static str = "admin";

    fn validate(&mut self) -> Result<(), Error> {
        required("username", &mut self.username)?;
        required("name", &mut self.name)
    }

    fn username(&self) -> Option<&str> {
        Some(&self.username)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub grade_id: Uuid,
    pub class_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub birthday: Option<NaiveDate>,
}

impl Resource for Student {
    const COLLECTION: &'static str = "students";
    const NOUN: &'static str = "student";

    fn validate(&mut self) -> Result<(), Error> {
        required("username", &mut self.username)?;
        required("first_name", &mut self.first_name)?;
        required("last_name", &mut self.last_name)?;
        optional_email(&self.email)
    }

    fn references(&self) -> Vec<Reference> {
        let mut refs = vec![Reference::new("grade_id", Grade::COLLECTION, self.grade_id)];
        if let Some(class_id) = self.class_id {
            refs.push(Reference::new("class_id", Class::COLLECTION, class_id));
        }
        if let Some(parent_id) = self.parent_id {
            refs.push(Reference::new("parent_id", Parent::COLLECTION, parent_id));
        }
        refs
    }

    fn username(&self) -> Option<&str> {
        Some(&self.username)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Teacher {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub subject_ids: Vec<Uuid>,
}

impl Resource for Teacher {
    const COLLECTION: &'static str = "teachers";
    const NOUN: &'static str = "teacher";

    fn validate(&mut self) -> Result<(), Error> {
        required("username", &mut self.username)?;
        required("first_name", &mut self.first_name)?;
        required("last_name", &mut self.last_name)?;
        optional_email(&self.email)
    }

    fn references(&self) -> Vec<Reference> {
        self.subject_ids
            .iter()
            .map(|id| Reference::new("subject_ids", Subject::COLLECTION, *id))
            .collect()
    }

    fn username(&self) -> Option<&str> {
        Some(&self.username)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parent {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Resource for Parent {
    const COLLECTION: &'static str = "parents";
    const NOUN: &'static str = "parent";

    fn validate(&mut self) -> Result<(), Error> {
        required("username", &mut self.username)?;
        required("first_name", &mut self.first_name)?;
        required("last_name", &mut self.last_name)?;
        optional_email(&self.email)
    }

    fn username(&self) -> Option<&str> {
        Some(&self.username)
    }
}

pub const MAX_GRADE_LEVEL: u32 = 12;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grade {
    pub level: u32,
    /// Derived from `level`, e.g. `Grade IV`.
    #[serde(default)]
    pub label: String,
}

impl Resource for Grade {
    const COLLECTION: &'static str = "grades";
    const NOUN: &'static str = "grade";

    fn validate(&mut self) -> Result<(), Error> {
        if self.level == 0 || self.level > MAX_GRADE_LEVEL {
            return Err(Error::invalid(format!(
                "`level` must be between 1 and {}",
                MAX_GRADE_LEVEL
            )));
        }
        let numeral = to_roman(self.level)
            .ok_or_else(|| Error::invalid("`level` cannot be written as a numeral"))?;
        self.label = format!("Grade {}", numeral);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
    pub name: String,
    pub grade_id: Uuid,
    pub supervisor_id: Option<Uuid>,
    pub capacity: Option<u32>,
}

impl Resource for Class {
    const COLLECTION: &'static str = "classes";
    const NOUN: &'static str = "class";

    fn validate(&mut self) -> Result<(), Error> {
        required("name", &mut self.name)?;
        if self.capacity == Some(0) {
            return Err(Error::invalid("`capacity` must be positive"));
        }
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        let mut refs = vec![Reference::new("grade_id", Grade::COLLECTION, self.grade_id)];
        if let Some(supervisor_id) = self.supervisor_id {
            refs.push(Reference::new(
                "supervisor_id",
                Teacher::COLLECTION,
                supervisor_id,
            ));
        }
        refs
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    pub code: Option<String>,
}

impl Resource for Subject {
    const COLLECTION: &'static str = "subjects";
    const NOUN: &'static str = "subject";

    fn validate(&mut self) -> Result<(), Error> {
        required("name", &mut self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub title: String,
    pub description: Option<String>,
    pub class_id: Uuid,
    pub subject_id: Uuid,
    pub teacher_id: Option<Uuid>,
    pub due_date: NaiveDate,
}

impl Resource for Assignment {
    const COLLECTION: &'static str = "assignments";
    const NOUN: &'static str = "assignment";

    fn validate(&mut self) -> Result<(), Error> {
        required("title", &mut self.title)
    }

    fn references(&self) -> Vec<Reference> {
        let mut refs = vec![
            Reference::new("class_id", Class::COLLECTION, self.class_id),
            Reference::new("subject_id", Subject::COLLECTION, self.subject_id),
        ];
        if let Some(teacher_id) = self.teacher_id {
            refs.push(Reference::new("teacher_id", Teacher::COLLECTION, teacher_id));
        }
        refs
    }

    fn teacher_id(&self) -> Option<Uuid> {
        self.teacher_id
    }

    fn class_id(&self) -> Option<Uuid> {
        Some(self.class_id)
    }

    fn assign_teacher(&mut self, teacher_id: Uuid) {
        self.teacher_id = Some(teacher_id);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attendance {
    pub student_id: Uuid,
    pub class_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub note: Option<String>,
}

impl Resource for Attendance {
    const COLLECTION: &'static str = "attendance";
    const NOUN: &'static str = "attendance record";

    fn references(&self) -> Vec<Reference> {
        vec![
            Reference::new("student_id", Student::COLLECTION, self.student_id),
            Reference::new("class_id", Class::COLLECTION, self.class_id),
        ]
    }

    fn class_id(&self) -> Option<Uuid> {
        Some(self.class_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    All,
    Students,
    Teachers,
    Parents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    pub title: String,
    pub body: String,
    pub target_audience: Audience,
    #[serde(default)]
    pub target_grades: Vec<Uuid>,
    #[serde(default = "Utc::now")]
    pub published_at: DateTime<Utc>,
}

impl Resource for Announcement {
    const COLLECTION: &'static str = "announcements";
    const NOUN: &'static str = "announcement";

    fn validate(&mut self) -> Result<(), Error> {
        required("title", &mut self.title)?;
        required("body", &mut self.body)
    }

    fn references(&self) -> Vec<Reference> {
        self.target_grades
            .iter()
            .map(|id| Reference::new("target_grades", Grade::COLLECTION, *id))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub sender_id: Uuid,
    pub sender_role: Role,
    pub recipient_id: Uuid,
    pub recipient_role: Role,
    pub subject: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

impl Resource for Message {
    const COLLECTION: &'static str = "messages";
    const NOUN: &'static str = "message";

    fn validate(&mut self) -> Result<(), Error> {
        required("subject", &mut self.subject)?;
        required("body", &mut self.body)
    }
}

/// Login secret for one person record. Never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub subject_id: Uuid,
    pub role: Role,
    pub password_hash: String,
}

impl Resource for Credential {
    const COLLECTION: &'static str = "credentials";
    const NOUN: &'static str = "credential";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn grade_label_uses_roman_numerals() {
        let mut grade = Grade {
            level: 9,
            label: String::new(),
        };
        grade.validate().unwrap();
        assert_eq!(grade.label, "Grade IX");

        let mut grade = Grade {
            level: 13,
            label: String::new(),
        };
        assert!(matches!(grade.validate(), Err(Error::InvalidPayload { .. })));
    }

    #[test]
    fn student_requires_username() {
        let mut student: Student = serde_json::from_value(json!({
            "username": "  ",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "grade_id": Uuid::new_v4(),
        }))
        .unwrap();
        match student.validate() {
            Err(Error::InvalidPayload { message }) => assert!(message.contains("username")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn student_fields_are_trimmed() {
        let mut student: Student = serde_json::from_value(json!({
            "username": " ada ",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "grade_id": Uuid::new_v4(),
        }))
        .unwrap();
        student.validate().unwrap();
        assert_eq!(student.username(), Some("ada"));
    }

    #[test]
    fn student_references_only_set_keys() {
        let grade = Uuid::new_v4();
        let parent = Uuid::new_v4();
        let student: Student = serde_json::from_value(json!({
            "username": "ada",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "grade_id": grade,
            "parent_id": parent,
        }))
        .unwrap();
        let refs = student.references();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].collection, "grades");
        assert_eq!(refs[1], Reference::new("parent_id", "parents", parent));
    }

    #[test]
    fn announcement_defaults() {
        let announcement: Announcement = serde_json::from_value(json!({
            "title": "Sports day",
            "body": "Friday",
            "target_audience": "all",
        }))
        .unwrap();
        assert!(announcement.target_grades.is_empty());
        assert_eq!(announcement.target_audience, Audience::All);
    }

    #[test]
    fn record_flattens_fields() {
        let record = Record {
            id: Uuid::nil(),
            created_at: Utc::now(),
            data: Subject {
                name: "Physics".into(),
                code: None,
            },
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["name"], "Physics");
        assert_eq!(value["id"], Uuid::nil().to_string());
    }

    #[test]
    fn bad_email_rejected() {
        let mut parent = Parent {
            username: "pat".into(),
            first_name: "Pat".into(),
            last_name: "Doe".into(),
            email: Some("nope".into()),
            phone: None,
        };
        assert!(parent.validate().is_err());
    }
}
