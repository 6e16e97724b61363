use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::SeedableRng;
use testing_center::quiz::sampler::{assemble, ItemOrder};
use testing_center::quiz::session::{QuestionStatus, TestSession};
use testing_center::quiz::{Question, QuestionKind, Response, Tag, Test};
use testing_center::seed;
use testing_center::storage::{SqliteStorage, Storage};

fn arithmetic_test() -> Test {
    Test {
        id: 1,
        name: "Арифметика".to_string(),
        teacher_name: "Поляков".to_string(),
        tags: vec![Tag::new(1, "Сложение".to_string(), 2, 1)],
        questions: (1..=5)
            .map(|n| {
                Question::new(
                    n,
                    format!("{n} + {n} = ?"),
                    Some(1),
                    QuestionKind::FreeText {
                        correct_answer: (n * 2).to_string(),
                    },
                )
            })
            .collect(),
    }
}

fn correct_answer(kind: &QuestionKind) -> Option<Response> {
    match kind {
        QuestionKind::FreeText { correct_answer } => Some(Response::FreeText(correct_answer.clone())),
        QuestionKind::MultiSelect { options } => Some(Response::MultiSelect(
            options
                .iter()
                .filter(|o| o.is_correct)
                .map(|o| o.text.clone())
                .collect(),
        )),
        QuestionKind::Ordering { .. } => None,
    }
}

#[test]
fn one_right_one_wrong_scores_fifty() {
    let test = arithmetic_test();
    let mut rng = StdRng::seed_from_u64(2024);
    let questions = assemble(&test, ItemOrder::Stored, &mut rng);
    assert_eq!(questions.len(), 2);
    assert_ne!(questions[0].question.id, questions[1].question.id);

    let mut session = TestSession::start(questions).unwrap();
    let right = correct_answer(&session.current_question().question.kind).unwrap();
    assert!(session.submit(&right).unwrap());

    assert_eq!(session.advance(), Some(1));
    assert!(!session.submit(&Response::FreeText("0".to_string())).unwrap());

    assert_eq!(session.advance(), None);
    assert!(session.is_complete());
    assert_eq!(session.finalize(), 50);
}

#[test]
fn skipped_question_is_revisited_before_finishing() {
    let test = arithmetic_test();
    let mut rng = StdRng::seed_from_u64(9);
    let mut session = TestSession::start(assemble(&test, ItemOrder::Stored, &mut rng)).unwrap();

    assert_eq!(session.advance(), Some(1));
    assert_eq!(session.statuses()[0], QuestionStatus::Skipped);
    let right = correct_answer(&session.current_question().question.kind).unwrap();
    session.submit(&right).unwrap();

    assert_eq!(session.advance(), Some(0));
    let right = correct_answer(&session.current_question().question.kind).unwrap();
    session.submit(&right).unwrap();
    assert_eq!(session.advance(), None);
    assert_eq!(session.finalize(), 100);
}

#[test]
fn demo_test_can_be_passed_with_full_marks() {
    let mut store = SqliteStorage::open_in_memory().unwrap();
    let id = seed::seed_if_empty(&mut store).unwrap().unwrap();
    let test = store.load_test(id).unwrap();

    let mut rng = StdRng::seed_from_u64(1);
    let mut session = TestSession::start(assemble(&test, ItemOrder::Shuffled, &mut rng)).unwrap();
    assert_eq!(session.len(), 3);

    loop {
        let kind = session.current_question().question.kind.clone();
        let verdict = match kind {
            QuestionKind::Ordering { items } => {
                let mut slots: Vec<usize> = (0..items.len()).collect();
                slots.sort_by_key(|slot| items[*slot].position);
                for slot in slots {
                    session.toggle_item(slot).unwrap();
                }
                assert!(session.can_submit());
                session.submit_ordering().unwrap()
            }
            other => session.submit(&correct_answer(&other).unwrap()).unwrap(),
        };
        assert!(verdict);
        if session.advance().is_none() {
            break;
        }
    }
    assert_eq!(session.finalize(), 100);
}

fn picked(texts: &[&str]) -> Response {
    Response::MultiSelect(texts.iter().map(|t| t.to_string()).collect::<BTreeSet<String>>())
}

#[test]
fn wrong_selection_fails_multi_select() {
    let mut store = SqliteStorage::open_in_memory().unwrap();
    let id = seed::seed_if_empty(&mut store).unwrap().unwrap();
    let test = store.load_test(id).unwrap();

    let mut rng = StdRng::seed_from_u64(3);
    let questions = assemble(&test, ItemOrder::Stored, &mut rng);
    let estimator = questions
        .iter()
        .position(|sq| sq.question.body.starts_with("Выбрать все правильные"))
        .unwrap();

    let attempts = [
        (picked(&["несмещенной"]), false),
        (picked(&["несмещенной", "состоятельной", "смещенной"]), false),
        (picked(&["состоятельной", "несмещенной"]), true),
    ];
    for (response, expected) in attempts {
        let mut session = TestSession::start(questions.clone()).unwrap();
        session.open(estimator).unwrap();
        assert_eq!(session.submit(&response).unwrap(), expected);
    }
}

#[test]
fn sqlite_store_serves_sessions_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.sqlite");

    let id = {
        let mut store = SqliteStorage::open(&path).unwrap();
        seed::seed_if_empty(&mut store).unwrap().unwrap()
    };

    let store = SqliteStorage::open(&path).unwrap();
    let test = store.load_test(id).unwrap();
    let mut rng = StdRng::seed_from_u64(5);
    let session = TestSession::start(assemble(&test, ItemOrder::Shuffled, &mut rng)).unwrap();
    assert_eq!(session.len(), 3);
    assert_eq!(session.finalize(), 0);
}
