use std::collections::BTreeSet;

use crate::quiz::{Answer, OrderingItem, Question, QuestionKind, Response};

/// Checks a submitted response against the stored correct answer.
///
/// A response of a different kind than the question is simply wrong.
pub fn validate(question: &Question, response: &Response) -> bool {
    match (&question.kind, response) {
        (QuestionKind::FreeText { correct_answer }, Response::FreeText(submitted)) => {
            free_text(correct_answer, submitted)
        }
        (QuestionKind::MultiSelect { options }, Response::MultiSelect(selected)) => {
            multi_select(options, selected)
        }
        (QuestionKind::Ordering { items }, Response::Ordering(ranks)) => ordering(items, ranks),
        _ => false,
    }
}

/// Exact, case-sensitive comparison. Surrounding whitespace counts.
pub fn free_text(correct_answer: &str, submitted: &str) -> bool {
    submitted == correct_answer
}

/// Every correct option must be checked and no wrong one may be.
pub fn multi_select(options: &[Answer], selected: &BTreeSet<String>) -> bool {
    options.iter().all(|option| {
        let checked = selected.contains(&option.text);
        checked == option.is_correct
    })
}

/// Compares the per-slot ranks with the stored positions read in the order
/// the items were displayed. It does not look at item texts.
pub fn ordering(items: &[OrderingItem], ranks: &[u32]) -> bool {
    items.len() == ranks.len()
        && items
            .iter()
            .zip(ranks)
            .all(|(item, rank)| item.position == *rank)
}
