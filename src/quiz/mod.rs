use std::collections::BTreeSet;
use std::fmt;

pub mod authoring;
pub mod error;
pub mod ordering;
pub mod sampler;
pub mod session;
pub mod validate;

pub type TestId = u32;
pub type TagId = u32;
pub type QuestionId = u32;

/// Label of the tag that collects questions authored without one.
pub const UNTAGGED: &str = "Untagged";

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Test {
    pub id: TestId,
    pub name: String,
    pub teacher_name: String,
    pub tags: Vec<Tag>,
    pub questions: Vec<Question>,
}

impl Test {
    pub fn summary(&self) -> TestSummary {
        TestSummary {
            id: self.id,
            name: self.name.clone(),
            teacher_name: self.teacher_name.clone(),
        }
    }

    pub fn tag(&self, id: TagId) -> Option<&Tag> {
        self.tags.iter().find(|t| t.id == id)
    }

    /// Questions of any kind referencing the given tag, in storage order.
    pub fn pool(&self, tag_id: TagId) -> Vec<&Question> {
        self.questions
            .iter()
            .filter(|q| q.tag_id == Some(tag_id))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TestSummary {
    pub id: TestId,
    pub name: String,
    pub teacher_name: String,
}

impl fmt::Display for TestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} — {}", self.name, self.teacher_name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    /// How many questions to draw from this tag's pool.
    pub quota: u32,
    pub test_id: TestId,
}

impl Tag {
    pub fn new(id: TagId, name: String, quota: u32, test_id: TestId) -> Self {
        Self {
            id,
            name,
            quota,
            test_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Question {
    pub id: QuestionId,
    /// Opaque body payload (HTML in practice).
    pub body: String,
    pub tag_id: Option<TagId>,
    pub kind: QuestionKind,
}

impl Question {
    pub fn new(id: QuestionId, body: String, tag_id: Option<TagId>, kind: QuestionKind) -> Self {
        Self {
            id,
            body,
            tag_id,
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    FreeText { correct_answer: String },
    MultiSelect { options: Vec<Answer> },
    Ordering { items: Vec<OrderingItem> },
}

impl QuestionKind {
    pub fn name(&self) -> &'static str {
        match self {
            QuestionKind::FreeText { .. } => "free text",
            QuestionKind::MultiSelect { .. } => "multi select",
            QuestionKind::Ordering { .. } => "ordering",
        }
    }
}

/// One option of a multi-select question.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Answer {
    pub text: String,
    pub is_correct: bool,
}

impl Answer {
    pub fn new(text: String, is_correct: bool) -> Self {
        Self { text, is_correct }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OrderingItem {
    pub text: String,
    /// 1-based place of the item in the correct sequence.
    pub position: u32,
}

impl OrderingItem {
    pub fn new(text: String, position: u32) -> Self {
        Self { text, position }
    }
}

/// A sampled question snapshot owned by one session.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SessionQuestion {
    pub question: Question,
    pub display_index: usize,
}

/// What a student submits for a question.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Response {
    FreeText(String),
    /// Texts of the checked options.
    MultiSelect(BTreeSet<String>),
    /// Rank given to each displayed item, slot by slot.
    Ordering(Vec<u32>),
}
