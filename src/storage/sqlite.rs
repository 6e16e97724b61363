use std::collections::HashMap;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::quiz::{
    Answer, OrderingItem, Question, QuestionId, QuestionKind, Tag, TagId, Test, TestId,
    TestSummary,
};
use crate::storage::{
    Credentials, Group, GroupId, Identity, NewStudent, Storage, StorageError, StudentId,
    StudentRecord,
};

const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS tests (
    id           INTEGER PRIMARY KEY,
    name         TEXT NOT NULL UNIQUE,
    teacher_name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tags (
    id      INTEGER PRIMARY KEY,
    test_id INTEGER NOT NULL REFERENCES tests(id) ON DELETE CASCADE,
    name    TEXT NOT NULL,
    quota   INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS questions (
    id             INTEGER PRIMARY KEY,
    test_id        INTEGER NOT NULL REFERENCES tests(id) ON DELETE CASCADE,
    tag_id         INTEGER REFERENCES tags(id) ON DELETE SET NULL,
    ordinal        INTEGER NOT NULL,
    kind           TEXT NOT NULL CHECK (kind IN ('free_text', 'multi_select', 'ordering')),
    body           TEXT NOT NULL,
    correct_answer TEXT
);

CREATE TABLE IF NOT EXISTS answers_check_box (
    id          INTEGER PRIMARY KEY,
    question_id INTEGER NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
    text        TEXT NOT NULL,
    is_correct  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS answers_replacement (
    id               INTEGER PRIMARY KEY,
    question_id      INTEGER NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
    text             TEXT NOT NULL,
    number_in_answer INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS student_groups (
    id   INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS students (
    id        INTEGER PRIMARY KEY,
    login     TEXT NOT NULL UNIQUE,
    password  TEXT NOT NULL,
    full_name TEXT NOT NULL,
    group_id  INTEGER NOT NULL REFERENCES student_groups(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS teachers (
    id       INTEGER PRIMARY KEY,
    login    TEXT NOT NULL UNIQUE,
    password TEXT NOT NULL
);
";

/// The store backed by one SQLite database, a file or an in-memory one.
pub struct SqliteStorage {
    conn: Connection,
}

struct QuestionRow {
    id: QuestionId,
    tag_id: Option<TagId>,
    kind: String,
    body: String,
    correct_answer: Option<String>,
}

impl SqliteStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        log::info!("Opening store {}", path.display());
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }
}

fn kind_column(kind: &QuestionKind) -> &'static str {
    match kind {
        QuestionKind::FreeText { .. } => "free_text",
        QuestionKind::MultiSelect { .. } => "multi_select",
        QuestionKind::Ordering { .. } => "ordering",
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn login_exists_in(conn: &Connection, login: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM students WHERE login = ?1)
             OR EXISTS(SELECT 1 FROM teachers WHERE login = ?1)",
        [login],
        |row| row.get(0),
    )
}

fn upsert_group_in(conn: &Connection, name: &str) -> Result<GroupId, StorageError> {
    conn.execute(
        "INSERT INTO student_groups (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
        [name],
    )?;
    Ok(conn.query_row(
        "SELECT id FROM student_groups WHERE name = ?1",
        [name],
        |row| row.get(0),
    )?)
}

fn insert_student_in(conn: &Connection, student: &NewStudent) -> Result<StudentId, StorageError> {
    if login_exists_in(conn, &student.login)? {
        return Err(StorageError::DuplicateLogin(student.login.clone()));
    }
    let group_known: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM student_groups WHERE id = ?1)",
        [student.group_id],
        |row| row.get(0),
    )?;
    if !group_known {
        return Err(StorageError::GroupNotFound(student.group_id));
    }
    conn.execute(
        "INSERT INTO students (login, password, full_name, group_id) VALUES (?1, ?2, ?3, ?4)",
        params![student.login, student.password, student.full_name, student.group_id],
    )?;
    Ok(conn.last_insert_rowid() as StudentId)
}

impl Storage for SqliteStorage {
    fn load_test(&self, id: TestId) -> Result<Test, StorageError> {
        let (name, teacher_name): (String, String) = self
            .conn
            .query_row(
                "SELECT name, teacher_name FROM tests WHERE id = ?1",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or(StorageError::TestNotFound(id))?;

        let mut stmt = self
            .conn
            .prepare("SELECT id, name, quota FROM tags WHERE test_id = ?1 ORDER BY id")?;
        let tags = stmt
            .query_map([id], |row| Ok(Tag::new(row.get(0)?, row.get(1)?, row.get(2)?, id)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT id, tag_id, kind, body, correct_answer FROM questions
             WHERE test_id = ?1 ORDER BY ordinal",
        )?;
        let rows = stmt
            .query_map([id], |row| {
                Ok(QuestionRow {
                    id: row.get(0)?,
                    tag_id: row.get(1)?,
                    kind: row.get(2)?,
                    body: row.get(3)?,
                    correct_answer: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut options_stmt = self.conn.prepare(
            "SELECT text, is_correct FROM answers_check_box WHERE question_id = ?1 ORDER BY id",
        )?;
        let mut items_stmt = self.conn.prepare(
            "SELECT text, number_in_answer FROM answers_replacement
             WHERE question_id = ?1 ORDER BY id",
        )?;

        let mut questions = Vec::with_capacity(rows.len());
        for row in rows {
            let kind = match row.kind.as_str() {
                "free_text" => QuestionKind::FreeText {
                    correct_answer: row.correct_answer.unwrap_or_default(),
                },
                "multi_select" => QuestionKind::MultiSelect {
                    options: options_stmt
                        .query_map([row.id], |r| Ok(Answer::new(r.get(0)?, r.get(1)?)))?
                        .collect::<Result<_, _>>()?,
                },
                "ordering" => QuestionKind::Ordering {
                    items: items_stmt
                        .query_map([row.id], |r| Ok(OrderingItem::new(r.get(0)?, r.get(1)?)))?
                        .collect::<Result<_, _>>()?,
                },
                other => {
                    return Err(StorageError::UnknownKind {
                        question: row.id,
                        kind: other.to_string(),
                    })
                }
            };
            questions.push(Question::new(row.id, row.body, row.tag_id, kind));
        }

        Ok(Test {
            id,
            name,
            teacher_name,
            tags,
            questions,
        })
    }

    fn list_tests(&self) -> Result<Vec<TestSummary>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, teacher_name FROM tests ORDER BY id")?;
        let tests = stmt
            .query_map([], |row| {
                Ok(TestSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    teacher_name: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tests)
    }

    fn save_test(&mut self, test: Test, replace: bool) -> Result<TestId, StorageError> {
        let tx = self.conn.transaction()?;

        let written = if replace {
            tx.execute(
                "UPDATE tests SET name = ?1, teacher_name = ?2 WHERE id = ?3",
                params![test.name, test.teacher_name, test.id],
            )
        } else {
            tx.execute(
                "INSERT INTO tests (name, teacher_name) VALUES (?1, ?2)",
                params![test.name, test.teacher_name],
            )
        };
        match written {
            Err(err) if is_unique_violation(&err) => {
                return Err(StorageError::DuplicateName(test.name))
            }
            Err(err) => return Err(err.into()),
            Ok(0) => return Err(StorageError::TestNotFound(test.id)),
            Ok(_) => {}
        }

        let test_id = if replace {
            tx.execute("DELETE FROM questions WHERE test_id = ?1", [test.id])?;
            tx.execute("DELETE FROM tags WHERE test_id = ?1", [test.id])?;
            test.id
        } else {
            tx.last_insert_rowid() as TestId
        };

        let mut tag_ids: HashMap<TagId, i64> = HashMap::new();
        for tag in &test.tags {
            tx.execute(
                "INSERT INTO tags (test_id, name, quota) VALUES (?1, ?2, ?3)",
                params![test_id, tag.name, tag.quota],
            )?;
            tag_ids.insert(tag.id, tx.last_insert_rowid());
        }

        for (ordinal, question) in test.questions.iter().enumerate() {
            let tag_id = question.tag_id.and_then(|id| tag_ids.get(&id).copied());
            let correct_answer = match &question.kind {
                QuestionKind::FreeText { correct_answer } => Some(correct_answer.as_str()),
                _ => None,
            };
            tx.execute(
                "INSERT INTO questions (test_id, tag_id, ordinal, kind, body, correct_answer)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    test_id,
                    tag_id,
                    ordinal as i64,
                    kind_column(&question.kind),
                    question.body,
                    correct_answer
                ],
            )?;
            let question_id = tx.last_insert_rowid();

            match &question.kind {
                QuestionKind::MultiSelect { options } => {
                    for option in options {
                        tx.execute(
                            "INSERT INTO answers_check_box (question_id, text, is_correct)
                             VALUES (?1, ?2, ?3)",
                            params![question_id, option.text, option.is_correct],
                        )?;
                    }
                }
                QuestionKind::Ordering { items } => {
                    for item in items {
                        tx.execute(
                            "INSERT INTO answers_replacement (question_id, text, number_in_answer)
                             VALUES (?1, ?2, ?3)",
                            params![question_id, item.text, item.position],
                        )?;
                    }
                }
                QuestionKind::FreeText { .. } => {}
            }
        }

        tx.commit()?;
        log::debug!(
            "Stored test {} with {} tags and {} questions",
            test_id,
            test.tags.len(),
            test.questions.len()
        );
        Ok(test_id)
    }

    fn list_groups(&self) -> Result<Vec<Group>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM student_groups ORDER BY id")?;
        let groups = stmt
            .query_map([], |row| {
                Ok(Group {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(groups)
    }

    fn group(&self, id: GroupId) -> Result<Group, StorageError> {
        self.conn
            .query_row(
                "SELECT id, name FROM student_groups WHERE id = ?1",
                [id],
                |row| {
                    Ok(Group {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?
            .ok_or(StorageError::GroupNotFound(id))
    }

    fn list_students_by_group(&self, group_id: GroupId) -> Result<Vec<StudentRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, login, password, full_name, group_id FROM students
             WHERE group_id = ?1 ORDER BY id",
        )?;
        let students = stmt
            .query_map([group_id], |row| {
                Ok(StudentRecord {
                    id: row.get(0)?,
                    login: row.get(1)?,
                    password: row.get(2)?,
                    full_name: row.get(3)?,
                    group_id: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(students)
    }

    fn upsert_group(&mut self, name: &str) -> Result<GroupId, StorageError> {
        upsert_group_in(&self.conn, name)
    }

    fn insert_student(&mut self, student: NewStudent) -> Result<StudentId, StorageError> {
        insert_student_in(&self.conn, &student)
    }

    fn enroll(&mut self, students: &[Credentials]) -> Result<Vec<StudentId>, StorageError> {
        let tx = self.conn.transaction()?;
        let mut ids = Vec::with_capacity(students.len());
        for student in students {
            let group_id = upsert_group_in(&tx, &student.group)?;
            ids.push(insert_student_in(
                &tx,
                &NewStudent {
                    login: student.login.clone(),
                    password: student.password.clone(),
                    full_name: student.full_name.clone(),
                    group_id,
                },
            )?);
        }
        tx.commit()?;
        Ok(ids)
    }

    fn login_exists(&self, login: &str) -> Result<bool, StorageError> {
        Ok(login_exists_in(&self.conn, login)?)
    }

    fn ensure_teacher(&mut self, login: &str, password: &str) -> Result<(), StorageError> {
        if login_exists_in(&self.conn, login)? {
            return Ok(());
        }
        self.conn.execute(
            "INSERT INTO teachers (login, password) VALUES (?1, ?2)",
            [login, password],
        )?;
        log::info!("Created teacher account '{}'", login);
        Ok(())
    }

    fn authenticate(&self, login: &str, password: &str) -> Result<Option<Identity>, StorageError> {
        if login.is_empty() || password.is_empty() {
            return Ok(None);
        }
        let teacher = self
            .conn
            .query_row(
                "SELECT id, login FROM teachers WHERE login = ?1 AND password = ?2",
                [login, password],
                |row| {
                    Ok(Identity::Teacher {
                        id: row.get(0)?,
                        login: row.get(1)?,
                    })
                },
            )
            .optional()?;
        if teacher.is_some() {
            return Ok(teacher);
        }
        Ok(self
            .conn
            .query_row(
                "SELECT id, full_name, group_id FROM students WHERE login = ?1 AND password = ?2",
                [login, password],
                |row| {
                    Ok(Identity::Student {
                        id: row.get(0)?,
                        full_name: row.get(1)?,
                        group_id: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn store() -> SqliteStorage {
        SqliteStorage::open_in_memory().unwrap()
    }

    fn count(store: &SqliteStorage, table: &str) -> i64 {
        store
            .conn
            .query_row(&format!("SELECT count(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    fn draft_test(name: &str) -> Test {
        Test {
            id: 0,
            name: name.to_string(),
            teacher_name: "Поляков".to_string(),
            tags: vec![Tag::new(1, "Оценки".to_string(), 1, 0)],
            questions: vec![
                Question::new(
                    1,
                    "2 + 2".to_string(),
                    Some(1),
                    QuestionKind::FreeText {
                        correct_answer: "4".to_string(),
                    },
                ),
                Question::new(
                    2,
                    "Оценка должна быть".to_string(),
                    Some(1),
                    QuestionKind::MultiSelect {
                        options: vec![
                            Answer::new("несмещенной".to_string(), true),
                            Answer::new("смещенной".to_string(), false),
                        ],
                    },
                ),
                Question::new(
                    3,
                    "orphan".to_string(),
                    Some(99),
                    QuestionKind::Ordering {
                        items: vec![
                            OrderingItem::new("b".to_string(), 2),
                            OrderingItem::new("a".to_string(), 1),
                        ],
                    },
                ),
            ],
        }
    }

    fn student(login: &str, group: &str) -> Credentials {
        Credentials {
            login: login.to_string(),
            password: "pass1234".to_string(),
            full_name: format!("Student {login}"),
            group: group.to_string(),
        }
    }

    #[test]
    fn save_assigns_ids_and_keeps_every_kind() {
        let mut store = store();
        let id = store.save_test(draft_test("Статистика"), false).unwrap();
        let test = store.load_test(id).unwrap();

        assert_eq!(test.tags.len(), 1);
        let tag_id = test.tags[0].id;
        assert_eq!(test.tags[0].test_id, id);
        assert_eq!(test.questions[0].tag_id, Some(tag_id));
        assert_eq!(test.questions[2].tag_id, None);

        let original = draft_test("Статистика");
        for (stored, written) in test.questions.iter().zip(&original.questions) {
            assert_eq!(stored.body, written.body);
            assert_eq!(stored.kind, written.kind);
        }
    }

    #[test]
    fn duplicate_name_is_rejected_on_insert() {
        let mut store = store();
        store.save_test(draft_test("Статистика"), false).unwrap();
        let err = store.save_test(draft_test("Статистика"), false).unwrap_err();
        assert!(matches!(err, StorageError::DuplicateName(name) if name == "Статистика"));
        assert_eq!(store.list_tests().unwrap().len(), 1);
        assert_eq!(count(&store, "questions"), 3);
    }

    #[test]
    fn replace_swaps_contents_and_cascades_answers() {
        let mut store = store();
        let id = store.save_test(draft_test("Статистика"), false).unwrap();

        let mut edited = draft_test("Статистика II");
        edited.id = id;
        edited.questions.truncate(1);
        assert_eq!(store.save_test(edited, true).unwrap(), id);

        let test = store.load_test(id).unwrap();
        assert_eq!(test.name, "Статистика II");
        assert_eq!(test.questions.len(), 1);
        assert_eq!(count(&store, "tags"), 1);
        assert_eq!(count(&store, "answers_check_box"), 0);
        assert_eq!(count(&store, "answers_replacement"), 0);
    }

    #[test]
    fn replace_may_not_take_another_tests_name() {
        let mut store = store();
        let first = store.save_test(draft_test("Статистика"), false).unwrap();
        store.save_test(draft_test("Геометрия"), false).unwrap();

        let mut edited = draft_test("Геометрия");
        edited.id = first;
        assert!(matches!(
            store.save_test(edited, true),
            Err(StorageError::DuplicateName(_))
        ));
        let kept = store.load_test(first).unwrap();
        assert_eq!(kept.name, "Статистика");
        assert_eq!(kept.questions.len(), 3);
    }

    #[test]
    fn replace_of_unknown_test_fails() {
        let mut store = store();
        let mut edited = draft_test("Статистика");
        edited.id = 42;
        assert!(matches!(
            store.save_test(edited, true),
            Err(StorageError::TestNotFound(42))
        ));
        assert_eq!(count(&store, "tags"), 0);
    }

    #[test]
    fn authenticate_checks_teachers_then_students() {
        let mut store = store();
        store.ensure_teacher("teacher_admin", "123").unwrap();
        store.ensure_teacher("teacher_admin", "changed").unwrap();
        let group_id = store.upsert_group("ПМ-21").unwrap();
        assert_eq!(store.upsert_group("ПМ-21").unwrap(), group_id);
        let student_id = store
            .insert_student(NewStudent {
                login: "aB3dE6gH".to_string(),
                password: "pass1234".to_string(),
                full_name: "Иванов Иван".to_string(),
                group_id,
            })
            .unwrap();

        assert!(matches!(
            store.authenticate("teacher_admin", "123").unwrap(),
            Some(Identity::Teacher { .. })
        ));
        assert!(store.authenticate("teacher_admin", "changed").unwrap().is_none());
        assert_eq!(
            store.authenticate("aB3dE6gH", "pass1234").unwrap(),
            Some(Identity::Student {
                id: student_id,
                full_name: "Иванов Иван".to_string(),
                group_id,
            })
        );
        assert!(store.authenticate("", "").unwrap().is_none());
    }

    #[test]
    fn logins_are_unique_across_students_and_teachers() {
        let mut store = store();
        store.ensure_teacher("admin", "123").unwrap();
        let group_id = store.upsert_group("ПМ-21").unwrap();
        let student = NewStudent {
            login: "same".to_string(),
            password: "p".to_string(),
            full_name: "A".to_string(),
            group_id,
        };
        store.insert_student(student.clone()).unwrap();
        assert!(matches!(
            store.insert_student(student),
            Err(StorageError::DuplicateLogin(_))
        ));
        assert!(matches!(
            store.insert_student(NewStudent {
                login: "admin".to_string(),
                password: "p".to_string(),
                full_name: "B".to_string(),
                group_id,
            }),
            Err(StorageError::DuplicateLogin(_))
        ));
    }

    #[test]
    fn enroll_commits_all_rows_or_none() {
        let mut store = store();
        let ids = store
            .enroll(&[student("one", "ПМ-21"), student("two", "ПМ-22")])
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(store.list_groups().unwrap().len(), 2);

        let err = store
            .enroll(&[student("three", "ПМ-23"), student("three", "ПМ-23")])
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateLogin(login) if login == "three"));
        assert_eq!(store.list_groups().unwrap().len(), 2);
        assert_eq!(count(&store, "students"), 2);
        assert!(!store.login_exists("three").unwrap());
    }

    #[test]
    fn contents_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.sqlite");

        let id = {
            let mut store = SqliteStorage::open(&path).unwrap();
            store.ensure_teacher("teacher_admin", "123").unwrap();
            store.save_test(draft_test("Статистика"), false).unwrap()
        };

        let store = SqliteStorage::open(&path).unwrap();
        assert_eq!(store.load_test(id).unwrap().questions.len(), 3);
        assert!(store.authenticate("teacher_admin", "123").unwrap().is_some());
    }

    #[test]
    fn foreign_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.sqlite");
        fs::write(&path, "this is not a database, just some text that is long enough").unwrap();
        assert!(matches!(
            SqliteStorage::open(&path),
            Err(StorageError::Sqlite(_))
        ));
    }
}
