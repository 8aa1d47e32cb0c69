use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
    Parent,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Teacher, Role::Student, Role::Parent];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
            Role::Parent => "parent",
        }
    }

    /// Collection holding the person records of this role.
    pub fn collection(&self) -> &'static str {
        match self {
            Role::Admin => "admins",
            Role::Teacher => "teachers",
            Role::Student => "students",
            Role::Parent => "parents",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of roles a route accepts, fixed at the type level so the guard can
/// run as an extractor.
pub trait AcceptedRoles: Send + Sync + 'static {
    const ROLES: &'static [Role];
}

pub struct AdminOnly;
pub struct TeacherOnly;
pub struct StudentOnly;
pub struct ParentOnly;
pub struct TeacherOrAdmin;
pub struct AnyRole;

impl AcceptedRoles for AdminOnly {
    const ROLES: &'static [Role] = &[Role::Admin];
}

impl AcceptedRoles for TeacherOnly {
    const ROLES: &'static [Role] = &[Role::Teacher];
}

impl AcceptedRoles for StudentOnly {
    const ROLES: &'static [Role] = &[Role::Student];
}

impl AcceptedRoles for ParentOnly {
    const ROLES: &'static [Role] = &[Role::Parent];
}

impl AcceptedRoles for TeacherOrAdmin {
    const ROLES: &'static [Role] = &[Role::Teacher, Role::Admin];
}

impl AcceptedRoles for AnyRole {
    const ROLES: &'static [Role] = &Role::ALL;
}

#[derive(Debug, Clone, Serialize)]
pub struct NavItem {
    pub label: &'static str,
    pub path: &'static str,
}

const fn nav(label: &'static str, path: &'static str) -> NavItem {
    NavItem { label, path }
}

lazy_static! {
    static ref NAVIGATION: HashMap<Role, Vec<NavItem>> = {
        let mut menus = HashMap::new();
        menus.insert(
            Role::Admin,
            vec![
                nav("Dashboard", "/admin"),
                nav("Students", "/admin/students"),
                nav("Teachers", "/admin/teachers"),
                nav("Parents", "/admin/parents"),
                nav("Grades", "/admin/grades"),
                nav("Classes", "/admin/classes"),
                nav("Subjects", "/admin/subjects"),
                nav("Assignments", "/admin/assignments"),
                nav("Attendance", "/admin/attendance"),
                nav("Announcements", "/admin/announcements"),
                nav("Messages", "/messages"),
            ],
        );
        menus.insert(
            Role::Teacher,
            vec![
                nav("Dashboard", "/teacher"),
                nav("My classes", "/teacher/classes"),
                nav("Assignments", "/teacher/assignments"),
                nav("Attendance", "/teacher/attendance"),
                nav("Announcements", "/teacher/announcements"),
                nav("Messages", "/messages"),
            ],
        );
        menus.insert(
            Role::Student,
            vec![
                nav("Dashboard", "/student"),
                nav("Assignments", "/student/assignments"),
                nav("Attendance", "/student/attendance"),
                nav("Announcements", "/student/announcements"),
                nav("Messages", "/messages"),
            ],
        );
        menus.insert(
            Role::Parent,
            vec![
                nav("Dashboard", "/parent"),
                nav("Children", "/parent/children"),
                nav("Attendance", "/parent/attendance"),
                nav("Announcements", "/parent/announcements"),
                nav("Messages", "/messages"),
            ],
        );
        menus
    };
}

pub fn navigation(role: Role) -> &'static [NavItem] {
    NAVIGATION.get(&role).map(Vec::as_slice).unwrap_or(&[])
}
