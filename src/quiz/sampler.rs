use rand::seq::SliceRandom;
use rand::Rng;

use crate::quiz::{Question, QuestionKind, SessionQuestion, Test};

/// How ordering items and multi-select options are laid out when a session is assembled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ItemOrder {
    /// Shuffled once per assembly.
    #[default]
    Shuffled,
    /// Kept in storage order.
    Stored,
}

/// Builds the question list of one session.
///
/// For every tag, in the test's tag order, draws `min(quota, pool size)` questions
/// without replacement from the questions carrying that tag. The per-tag draws are
/// concatenated; there is no shuffle across tags. Questions without a tag are never drawn.
pub fn assemble<R>(test: &Test, item_order: ItemOrder, rng: &mut R) -> Vec<SessionQuestion>
where
    R: Rng + ?Sized,
{
    let mut chosen: Vec<Question> = Vec::new();

    for tag in &test.tags {
        let pool = test.pool(tag.id);
        let quota = tag.quota as usize;
        if quota > pool.len() {
            log::warn!(
                "Tag '{}' of test '{}' asks for {} questions but only {} exist",
                tag.name,
                test.name,
                quota,
                pool.len()
            );
        }
        let take = quota.min(pool.len());
        log::debug!("Drawing {} of {} questions for tag '{}'", take, pool.len(), tag.name);

        chosen.extend(pool.choose_multiple(rng, take).map(|q| (*q).clone()));
    }

    chosen
        .into_iter()
        .enumerate()
        .map(|(display_index, mut question)| {
            if item_order == ItemOrder::Shuffled {
                match &mut question.kind {
                    QuestionKind::Ordering { items } => items.shuffle(rng),
                    QuestionKind::MultiSelect { options } => options.shuffle(rng),
                    QuestionKind::FreeText { .. } => {}
                }
            }
            SessionQuestion {
                question,
                display_index,
            }
        })
        .collect()
}
