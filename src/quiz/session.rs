use crate::quiz::error::SessionError;
use crate::quiz::ordering::OrderingTracker;
use crate::quiz::validate::validate;
use crate::quiz::{QuestionKind, Response, SessionQuestion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum QuestionStatus {
    NotViewed,
    /// Currently open and not answered. At most one question is in this state.
    Viewed,
    Answered,
    /// Left while open without an answer.
    Skipped,
}

/// One student's attempt at a test.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TestSession {
    questions: Vec<SessionQuestion>,
    current: usize,
    status: Vec<QuestionStatus>,
    correct: usize,
    tracker: Option<OrderingTracker>,
}

impl TestSession {
    /// Starts a session over the assembled questions and opens the first one.
    pub fn start(questions: Vec<SessionQuestion>) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::Empty);
        }
        let mut session = Self {
            status: vec![QuestionStatus::NotViewed; questions.len()],
            questions,
            current: 0,
            correct: 0,
            tracker: None,
        };
        session.enter(0);
        log::info!("Session started with {} questions", session.len());
        Ok(session)
    }

    /// Opens a question. Answered questions can be opened for review but not re-answered.
    pub fn open(&mut self, index: usize) -> Result<&SessionQuestion, SessionError> {
        if index >= self.questions.len() {
            return Err(SessionError::IndexOutOfRange {
                index,
                len: self.questions.len(),
            });
        }
        self.enter(index);
        Ok(&self.questions[index])
    }

    fn enter(&mut self, index: usize) {
        if self.status[self.current] == QuestionStatus::Viewed {
            self.status[self.current] = QuestionStatus::Skipped;
        }
        self.current = index;

        let answered = self.status[index] == QuestionStatus::Answered;
        if !answered {
            self.status[index] = QuestionStatus::Viewed;
        }

        // A revisit always starts ranking from scratch.
        self.tracker = match &self.questions[index].question.kind {
            QuestionKind::Ordering { items } if !answered => Some(OrderingTracker::new(items.len())),
            _ => None,
        };
        log::debug!("Opened question {} ({:?})", index, self.status[index]);
    }

    /// Checks the response against the open question and marks it answered.
    /// Returns whether the response was correct.
    pub fn submit(&mut self, response: &Response) -> Result<bool, SessionError> {
        if self.status[self.current] == QuestionStatus::Answered {
            return Err(SessionError::AlreadyAnswered(self.current));
        }
        let correct = validate(&self.questions[self.current].question, response);
        if correct {
            self.correct += 1;
        }
        self.status[self.current] = QuestionStatus::Answered;
        self.tracker = None;
        log::debug!(
            "Question {} answered {}",
            self.current,
            if correct { "correctly" } else { "incorrectly" }
        );
        Ok(correct)
    }

    /// Submits the ranking built with [`TestSession::toggle_item`].
    pub fn submit_ordering(&mut self) -> Result<bool, SessionError> {
        if self.status[self.current] == QuestionStatus::Answered {
            return Err(SessionError::AlreadyAnswered(self.current));
        }
        let ranks = self
            .tracker
            .as_ref()
            .ok_or(SessionError::NotOrdering(self.current))?
            .ranking()?;
        self.submit(&Response::Ordering(ranks))
    }

    /// Picks or unpicks an item of the open ordering question.
    pub fn toggle_item(&mut self, slot: usize) -> Result<(), SessionError> {
        if self.status[self.current] == QuestionStatus::Answered {
            return Err(SessionError::AlreadyAnswered(self.current));
        }
        self.tracker
            .as_mut()
            .ok_or(SessionError::NotOrdering(self.current))?
            .toggle(slot)
    }

    /// Whether the submit control of the open question is enabled.
    pub fn can_submit(&self) -> bool {
        self.status[self.current] == QuestionStatus::Viewed
            && self.tracker.as_ref().map_or(true, OrderingTracker::is_complete)
    }

    /// Opens the next unanswered question after the current one, wrapping around.
    /// Returns `None` once every question is answered.
    pub fn advance(&mut self) -> Option<usize> {
        let len = self.questions.len();
        let next = (1..=len)
            .map(|shift| (self.current + shift) % len)
            .find(|idx| self.status[*idx] != QuestionStatus::Answered)?;
        self.enter(next);
        Some(next)
    }

    pub fn is_complete(&self) -> bool {
        self.status.iter().all(|s| *s == QuestionStatus::Answered)
    }

    /// Score as a whole percentage, see [`percentage`].
    pub fn finalize(&self) -> u32 {
        percentage(self.correct, self.questions.len())
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn current_question(&self) -> &SessionQuestion {
        &self.questions[self.current]
    }

    pub fn questions(&self) -> &[SessionQuestion] {
        &self.questions
    }

    pub fn statuses(&self) -> &[QuestionStatus] {
        &self.status
    }

    pub fn tracker(&self) -> Option<&OrderingTracker> {
        self.tracker.as_ref()
    }

    pub fn correct_count(&self) -> usize {
        self.correct
    }

    pub fn answered_count(&self) -> usize {
        self.status
            .iter()
            .filter(|s| **s == QuestionStatus::Answered)
            .count()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// `correct / total * 100` in floating point, rounded half to even.
/// 23 of 40 is 57.49999999999999 there and scores 57.
fn percentage(correct: usize, total: usize) -> u32 {
    (correct as f64 / total as f64 * 100.0).round_ties_even() as u32
}
