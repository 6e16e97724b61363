//! Storage collaborator.
//!
//! The engine never touches persistence directly: it goes through [`Storage`], a
//! repository over tests, tags, questions, groups, students and teachers. Every call
//! is all-or-nothing; a failed call leaves the store as it was.

use std::fmt;

use thiserror::Error;

use crate::config::{Config, StoreLocation};
use crate::quiz::{Test, TestId, TestSummary};

pub mod sqlite;

pub use sqlite::SqliteStorage;

pub type GroupId = u32;
pub type StudentId = u32;
pub type TeacherId = u32;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("test {0} not found")]
    TestNotFound(TestId),

    #[error("group {0} not found")]
    GroupNotFound(GroupId),

    #[error("a test named '{0}' already exists")]
    DuplicateName(String),

    #[error("login '{0}' is already taken")]
    DuplicateLogin(String),

    #[error("question {question} has unknown kind '{kind}'")]
    UnknownKind { question: u32, kind: String },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StudentRecord {
    pub id: StudentId,
    pub login: String,
    pub password: String,
    pub full_name: String,
    pub group_id: GroupId,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NewStudent {
    pub login: String,
    pub password: String,
    pub full_name: String,
    pub group_id: GroupId,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TeacherRecord {
    pub id: TeacherId,
    pub login: String,
    pub password: String,
}

/// A student to enroll, with the login data handed out to them.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
    pub full_name: String,
    pub group: String,
}

/// Who logged in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Teacher {
        id: TeacherId,
        login: String,
    },
    Student {
        id: StudentId,
        full_name: String,
        group_id: GroupId,
    },
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Teacher { login, .. } => write!(f, "teacher {}", login),
            Identity::Student { full_name, .. } => write!(f, "student {}", full_name),
        }
    }
}

pub trait Storage {
    /// Full test with tags and questions of every kind.
    fn load_test(&self, id: TestId) -> Result<Test, StorageError>;

    fn list_tests(&self) -> Result<Vec<TestSummary>, StorageError>;

    /// Inserts `test`, or with `replace` deletes every tag and question of the test
    /// with `test.id` and inserts the new ones. Ids inside `test` are provisional: the
    /// store assigns fresh ids and remaps tag references.
    fn save_test(&mut self, test: Test, replace: bool) -> Result<TestId, StorageError>;

    fn list_groups(&self) -> Result<Vec<Group>, StorageError>;

    fn group(&self, id: GroupId) -> Result<Group, StorageError>;

    fn list_students_by_group(&self, group_id: GroupId) -> Result<Vec<StudentRecord>, StorageError>;

    /// Id of the group with this name, creating it if needed.
    fn upsert_group(&mut self, name: &str) -> Result<GroupId, StorageError>;

    fn insert_student(&mut self, student: NewStudent) -> Result<StudentId, StorageError>;

    /// Upserts the groups and inserts every student in one transaction.
    fn enroll(&mut self, students: &[Credentials]) -> Result<Vec<StudentId>, StorageError>;

    fn login_exists(&self, login: &str) -> Result<bool, StorageError>;

    /// Creates the teacher account unless the login already exists.
    fn ensure_teacher(&mut self, login: &str, password: &str) -> Result<(), StorageError>;

    /// Teachers are checked before students.
    fn authenticate(&self, login: &str, password: &str) -> Result<Option<Identity>, StorageError>;
}

/// The storage handle built once at startup and passed to whoever needs it.
pub struct StorageContext {
    backend: Box<dyn Storage>,
}

impl StorageContext {
    pub fn new(backend: impl Storage + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    pub fn open(config: &Config) -> Result<Self, StorageError> {
        match &config.store {
            StoreLocation::Memory => {
                log::info!("Using in-memory storage; nothing will be saved");
                Ok(Self::new(SqliteStorage::open_in_memory()?))
            }
            StoreLocation::File(path) => Ok(Self::new(SqliteStorage::open(path)?)),
        }
    }

    pub fn storage(&self) -> &dyn Storage {
        self.backend.as_ref()
    }

    pub fn storage_mut(&mut self) -> &mut dyn Storage {
        self.backend.as_mut()
    }
}
