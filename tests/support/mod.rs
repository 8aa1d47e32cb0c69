#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use school_portal::models::{Admin, Resource};
use school_portal::role::Role;
use school_portal::store::{DocumentStore, MemoryStore, Store};
use school_portal::token::{Claims, Sessions};
use school_portal::{app, AppState};

pub const SECRET: &[u8] = b"integration-secret-integration-secret";

fn sessions() -> Sessions {
    Sessions::new(SECRET, Duration::hours(1), "token")
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub app: Router,
    sessions: Sessions,
}

pub struct Reply {
    pub status: StatusCode,
    pub set_cookie: Option<String>,
    pub body: Value,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let shared: Store = store.clone();
        Self {
            app: app(AppState::new(shared, sessions())),
            store,
            sessions: sessions(),
        }
    }

    pub fn store(&self) -> Store {
        self.store.clone()
    }

    pub fn token_expiring(&self, id: Uuid, role: Role, expires_at: DateTime<Utc>) -> String {
        self.sessions
            .sign(&Claims::new(id, role, expires_at))
            .expect("sign token")
    }

    pub fn token(&self, id: Uuid, role: Role) -> String {
        self.token_expiring(id, role, Utc::now() + Duration::hours(1))
    }

    pub async fn seed<R: Resource>(&self, value: R) -> Uuid {
        self.store
            .insert(R::COLLECTION, serde_json::to_value(value).expect("to json"))
            .await
            .expect("seed")
            .id
    }

    /// Seeds a person record and returns its id with a live token for it.
    pub async fn session<R: Resource>(&self, person: R, role: Role) -> (Uuid, String) {
        let id = self.seed(person).await;
        (id, self.token(id, role))
    }

    /// A token for a freshly seeded admin record.
    pub async fn admin(&self) -> String {
        let admin = Admin {
            username: format!("admin-{}", Uuid::new_v4().simple()),
            name: "Office".to_string(),
        };
        self.session(admin, Role::Admin).await.1
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("theme=dark; token={}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("infallible");

        let status = response.status();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = hyper::body::to_bytes(response.into_body())
            .await
            .expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        Reply {
            status,
            set_cookie,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Reply {
        self.call(Method::GET, uri, token, None).await
    }
}

pub mod fixtures {
    use chrono::{DateTime, Utc};
    use school_portal::models::{
        Announcement, Audience, Class, Grade, Parent, Student, Subject, Teacher,
    };
    use uuid::Uuid;

    pub fn grade(level: u32) -> Grade {
        Grade {
            level,
            label: String::new(),
        }
    }

    pub fn student(username: &str, grade_id: Uuid) -> Student {
        Student {
            username: username.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: None,
            grade_id,
            class_id: None,
            parent_id: None,
            birthday: None,
        }
    }

    pub fn teacher(username: &str) -> Teacher {
        Teacher {
            username: username.to_string(),
            first_name: "Alan".to_string(),
            last_name: "Turing".to_string(),
            email: None,
            phone: None,
            subject_ids: Vec::new(),
        }
    }

    pub fn parent(username: &str) -> Parent {
        Parent {
            username: username.to_string(),
            first_name: "Pat".to_string(),
            last_name: "Doe".to_string(),
            email: None,
            phone: None,
        }
    }

    pub fn class(name: &str, grade_id: Uuid, supervisor_id: Option<Uuid>) -> Class {
        Class {
            name: name.to_string(),
            grade_id,
            supervisor_id,
            capacity: Some(30),
        }
    }

    pub fn subject(name: &str) -> Subject {
        Subject {
            name: name.to_string(),
            code: None,
        }
    }

    pub fn announcement(
        title: &str,
        audience: Audience,
        grades: Vec<Uuid>,
        published_at: DateTime<Utc>,
    ) -> Announcement {
        Announcement {
            title: title.to_string(),
            body: format!("{} body", title),
            target_audience: audience,
            target_grades: grades,
            published_at,
        }
    }
}
