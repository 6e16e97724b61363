use crate::quiz::authoring::{DraftAnswer, DraftQuestion, TestDraft};
use crate::quiz::error::AuthoringError;
use crate::quiz::TestId;
use crate::storage::Storage;

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// The statistics test a fresh install starts with.
pub fn demo_draft() -> TestDraft {
    let mut draft = TestDraft::new("Первый тест".to_string(), "Поляков".to_string());

    draft.add(DraftQuestion::new(
        "Выбрать все правильные варинат ответа\nОценка параметра рассположения должна быть ______"
            .to_string(),
        DraftAnswer::MultiSelect {
            correct: texts(&["несмещенной", "состоятельной"]),
            wrong: texts(&["смещенной", "несостоятельной", "доверительной", "нормальной"]),
        },
        None,
    ));

    draft.add(DraftQuestion::new(
        "Выбрать правильный вариант ответа.\nДля оценки параметра распределения случайной \
         величины используют доверительные интервалы, если"
            .to_string(),
        DraftAnswer::MultiSelect {
            correct: texts(&["число опытов мало"]),
            wrong: texts(&[
                "число опытов велика",
                "заданы большие (>50) значения случайной величины",
                "заданы маленькие (<1 значения случайной величины)",
            ]),
        },
        None,
    ));

    draft.add(DraftQuestion::new(
        "Последовательность решения задачи линейного программирования на основе ее \
         геометрической интерпретации"
            .to_string(),
        DraftAnswer::Ordering {
            items: texts(&[
                "Строят прямые, уравнения которых получаются в результате замены в ограничениях \
                 знаков неравенств на знаки точных равенств",
                "Находят полуплоскости, определяемые каждым из ограничений задачи",
                "Находят многоугольник решений",
                "Строят вектор",
                "Строят прямую, проходящую через многоугольник решений",
                "Передвигают прямую в направлении вектора, в результате чего либо находят точку \
                 (точки), в которой целевая функция принимает максимальное значение, либо \
                 устанавливают неограниченность сверху функции на множестве планов",
                "Определяют координаты точки максимума функции и вычисляют значение целевой \
                 функции в этой точке",
            ]),
        },
        None,
    ));

    draft
}

/// Stores the demo test when the store has no tests at all.
pub fn seed_if_empty(storage: &mut dyn Storage) -> Result<Option<TestId>, AuthoringError> {
    if !storage.list_tests()?.is_empty() {
        return Ok(None);
    }
    let draft = demo_draft();
    let id = draft.commit(storage, &draft.default_quotas())?;
    log::info!("Seeded demo test '{}'", draft.name());
    Ok(Some(id))
}
