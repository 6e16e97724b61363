use std::collections::HashSet;

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::storage::{GroupId, Storage, StorageError};

const CREDENTIAL_LEN: usize = 8;

/// One line of a class list.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RosterRow {
    #[serde(alias = "ФИО")]
    pub full_name: String,
    #[serde(alias = "Группа")]
    pub group: String,
}

impl RosterRow {
    pub fn new(full_name: &str, group: &str) -> Self {
        Self {
            full_name: full_name.to_string(),
            group: group.to_string(),
        }
    }
}

pub use crate::storage::Credentials;

fn random_token<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CREDENTIAL_LEN)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}

/// Registers every non-blank row as a student with a fresh login and password.
/// Groups are created on first mention. Either every row is stored or none is.
pub fn import<R: Rng + ?Sized>(
    storage: &mut dyn Storage,
    rows: &[RosterRow],
    rng: &mut R,
) -> Result<Vec<Credentials>, StorageError> {
    let mut issued: Vec<Credentials> = Vec::with_capacity(rows.len());
    let mut taken = HashSet::new();

    for (line, row) in rows.iter().enumerate() {
        let full_name = row.full_name.trim();
        let group = row.group.trim();
        if full_name.is_empty() || group.is_empty() {
            log::warn!("Skipping roster row {}: name and group are required", line + 1);
            continue;
        }

        let login = loop {
            let candidate = random_token(rng);
            if !taken.contains(&candidate) && !storage.login_exists(&candidate)? {
                break candidate;
            }
        };
        taken.insert(login.clone());
        issued.push(Credentials {
            login,
            password: random_token(rng),
            full_name: full_name.to_string(),
            group: group.to_string(),
        });
    }

    storage.enroll(&issued)?;
    log::info!("Imported {} of {} roster rows", issued.len(), rows.len());
    Ok(issued)
}

/// Credentials of everyone in the group.
pub fn export(storage: &dyn Storage, group_id: GroupId) -> Result<Vec<Credentials>, StorageError> {
    let group = storage.group(group_id)?;
    Ok(storage
        .list_students_by_group(group_id)?
        .into_iter()
        .map(|student| Credentials {
            login: student.login,
            password: student.password,
            full_name: student.full_name,
            group: group.name.clone(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::{Test, TestId, TestSummary};
    use crate::storage::{Group, Identity, NewStudent, SqliteStorage, StudentId, StudentRecord};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Hands `enroll` a batch whose second row reuses the first login.
    struct ClashingLogins(SqliteStorage);

    impl Storage for ClashingLogins {
        fn load_test(&self, id: TestId) -> Result<Test, StorageError> {
            self.0.load_test(id)
        }
        fn list_tests(&self) -> Result<Vec<TestSummary>, StorageError> {
            self.0.list_tests()
        }
        fn save_test(&mut self, test: Test, replace: bool) -> Result<TestId, StorageError> {
            self.0.save_test(test, replace)
        }
        fn list_groups(&self) -> Result<Vec<Group>, StorageError> {
            self.0.list_groups()
        }
        fn group(&self, id: GroupId) -> Result<Group, StorageError> {
            self.0.group(id)
        }
        fn list_students_by_group(&self, group_id: GroupId) -> Result<Vec<StudentRecord>, StorageError> {
            self.0.list_students_by_group(group_id)
        }
        fn upsert_group(&mut self, name: &str) -> Result<GroupId, StorageError> {
            self.0.upsert_group(name)
        }
        fn insert_student(&mut self, student: NewStudent) -> Result<StudentId, StorageError> {
            self.0.insert_student(student)
        }
        fn enroll(&mut self, students: &[Credentials]) -> Result<Vec<StudentId>, StorageError> {
            let mut batch = students.to_vec();
            batch[1].login = batch[0].login.clone();
            self.0.enroll(&batch)
        }
        fn login_exists(&self, login: &str) -> Result<bool, StorageError> {
            self.0.login_exists(login)
        }
        fn ensure_teacher(&mut self, login: &str, password: &str) -> Result<(), StorageError> {
            self.0.ensure_teacher(login, password)
        }
        fn authenticate(&self, login: &str, password: &str) -> Result<Option<Identity>, StorageError> {
            self.0.authenticate(login, password)
        }
    }

    #[test]
    fn import_issues_unique_alphanumeric_credentials() {
        let mut store = SqliteStorage::open_in_memory().unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let rows = vec![
            RosterRow::new("Иванов Иван", "ПМ-21"),
            RosterRow::new("  ", "ПМ-21"),
            RosterRow::new("Петров Пётр", " ПМ-21 "),
            RosterRow::new("Сидоров Сидор", "ПМ-22"),
        ];

        let issued = import(&mut store, &rows, &mut rng).unwrap();
        assert_eq!(issued.len(), 3);
        for creds in &issued {
            assert_eq!(creds.login.len(), CREDENTIAL_LEN);
            assert_eq!(creds.password.len(), CREDENTIAL_LEN);
            assert!(creds.login.chars().all(|c| c.is_ascii_alphanumeric()));
            assert!(creds.password.chars().all(|c| c.is_ascii_alphanumeric()));
        }
        assert_ne!(issued[0].login, issued[1].login);
        assert_eq!(store.list_groups().unwrap().len(), 2);

        let identity = store
            .authenticate(&issued[1].login, &issued[1].password)
            .unwrap();
        assert!(matches!(
            identity,
            Some(Identity::Student { full_name, .. }) if full_name == "Петров Пётр"
        ));
    }

    #[test]
    fn export_lists_the_group() {
        let mut store = SqliteStorage::open_in_memory().unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let rows = vec![
            RosterRow::new("Иванов Иван", "ПМ-21"),
            RosterRow::new("Сидоров Сидор", "ПМ-22"),
        ];
        let issued = import(&mut store, &rows, &mut rng).unwrap();

        let group = store
            .list_groups()
            .unwrap()
            .into_iter()
            .find(|g| g.name == "ПМ-21")
            .unwrap();
        assert_eq!(export(&store, group.id).unwrap(), vec![issued[0].clone()]);
        assert!(matches!(
            export(&store, 999),
            Err(StorageError::GroupNotFound(999))
        ));
    }

    #[test]
    fn failed_insert_leaves_no_students_or_groups() {
        let mut store = ClashingLogins(SqliteStorage::open_in_memory().unwrap());
        let mut rng = StdRng::seed_from_u64(13);
        let rows = vec![
            RosterRow::new("Иванов Иван", "ПМ-21"),
            RosterRow::new("Сидоров Сидор", "ПМ-22"),
            RosterRow::new("Петров Пётр", "ПМ-22"),
        ];

        let err = import(&mut store, &rows, &mut rng).unwrap_err();
        assert!(matches!(err, StorageError::DuplicateLogin(_)));
        assert!(store.list_groups().unwrap().is_empty());
    }

    #[test]
    fn rows_accept_russian_column_names() {
        let rows: Vec<RosterRow> =
            serde_json::from_str(r#"[{"ФИО": "Иванов Иван", "Группа": "ПМ-21"}]"#).unwrap();
        assert_eq!(rows, vec![RosterRow::new("Иванов Иван", "ПМ-21")]);
    }
}
