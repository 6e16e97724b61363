use std::collections::BTreeMap;

use crate::quiz::error::AuthoringError;
use crate::quiz::{Answer, OrderingItem, Question, QuestionKind, Tag, Test, TestId, UNTAGGED};
use crate::storage::Storage;

/// Answer data of a draft question, as the teacher enters it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DraftAnswer {
    FreeText { answer: String },
    MultiSelect { correct: Vec<String>, wrong: Vec<String> },
    /// Items listed in the correct order.
    Ordering { items: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DraftQuestion {
    pub body: String,
    pub answer: DraftAnswer,
    #[serde(default)]
    pub tag: Option<String>,
}

impl DraftQuestion {
    pub fn new(body: String, answer: DraftAnswer, tag: Option<String>) -> Self {
        let tag = tag
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty() && t != UNTAGGED);
        Self { body, answer, tag }
    }

    pub fn tag_label(&self) -> &str {
        self.tag.as_deref().unwrap_or(UNTAGGED)
    }
}

/// A test being written or edited. Nothing reaches storage before [`TestDraft::commit`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestDraft {
    editing: Option<TestId>,
    name: String,
    teacher_name: String,
    questions: Vec<DraftQuestion>,
    tag_counts: BTreeMap<String, u32>,
}

impl TestDraft {
    pub fn new(name: String, teacher_name: String) -> Self {
        Self {
            name,
            teacher_name,
            ..Self::default()
        }
    }

    /// Loads a stored test for editing. Committing the draft replaces that test.
    pub fn edit(test: &Test) -> Result<Self, AuthoringError> {
        let mut draft = Self::new(test.name.clone(), test.teacher_name.clone());
        draft.editing = Some(test.id);

        for (index, question) in test.questions.iter().enumerate() {
            let tag = question
                .tag_id
                .and_then(|id| test.tag(id))
                .map(|tag| tag.name.clone());
            let answer = match &question.kind {
                QuestionKind::FreeText { correct_answer } => DraftAnswer::FreeText {
                    answer: correct_answer.clone(),
                },
                QuestionKind::MultiSelect { options } => {
                    let (correct, wrong): (Vec<&Answer>, Vec<&Answer>) =
                        options.iter().partition(|o| o.is_correct);
                    DraftAnswer::MultiSelect {
                        correct: correct.into_iter().map(|o| o.text.clone()).collect(),
                        wrong: wrong.into_iter().map(|o| o.text.clone()).collect(),
                    }
                }
                QuestionKind::Ordering { items } => {
                    if !positions_are_permutation(items) {
                        return Err(AuthoringError::MalformedPositions(index));
                    }
                    let mut sorted: Vec<&OrderingItem> = items.iter().collect();
                    sorted.sort_by_key(|item| item.position);
                    DraftAnswer::Ordering {
                        items: sorted.into_iter().map(|item| item.text.clone()).collect(),
                    }
                }
            };
            draft.add(DraftQuestion::new(question.body.clone(), answer, tag));
        }

        Ok(draft)
    }

    pub fn editing(&self) -> Option<TestId> {
        self.editing
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn teacher_name(&self) -> &str {
        &self.teacher_name
    }

    pub fn set_info(&mut self, name: String, teacher_name: String) {
        self.name = name;
        self.teacher_name = teacher_name;
    }

    pub fn questions(&self) -> &[DraftQuestion] {
        &self.questions
    }

    /// Number of draft questions per tag label.
    pub fn tag_counts(&self) -> &BTreeMap<String, u32> {
        &self.tag_counts
    }

    /// Quotas offered to the teacher before saving: every question of every tag.
    pub fn default_quotas(&self) -> BTreeMap<String, u32> {
        self.tag_counts.clone()
    }

    pub fn add(&mut self, question: DraftQuestion) -> usize {
        self.count_in(question.tag_label().to_string());
        self.questions.push(question);
        self.questions.len() - 1
    }

    pub fn replace(&mut self, index: usize, question: DraftQuestion) -> Result<(), AuthoringError> {
        let old_label = self
            .questions
            .get(index)
            .ok_or(AuthoringError::UnknownDraftIndex(index))?
            .tag_label()
            .to_string();
        if old_label != question.tag_label() {
            self.count_out(&old_label);
            self.count_in(question.tag_label().to_string());
        }
        self.questions[index] = question;
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<DraftQuestion, AuthoringError> {
        if index >= self.questions.len() {
            return Err(AuthoringError::UnknownDraftIndex(index));
        }
        let question = self.questions.remove(index);
        self.count_out(question.tag_label());
        Ok(question)
    }

    fn count_in(&mut self, label: String) {
        *self.tag_counts.entry(label).or_insert(0) += 1;
    }

    fn count_out(&mut self, label: &str) {
        if let Some(count) = self.tag_counts.get_mut(label) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.tag_counts.remove(label);
            }
        }
    }

    /// Rewrites the draft question by question from an import file. Returns the quotas
    /// to commit with: the file's overrides on top of the new defaults.
    pub fn apply(&mut self, file: DraftFile) -> Result<BTreeMap<String, u32>, AuthoringError> {
        self.set_info(file.name, file.teacher_name);

        let kept = self.questions.len();
        let wanted = file.questions.len();
        for (index, question) in file.questions.into_iter().enumerate() {
            let question = DraftQuestion::new(question.body, question.answer, question.tag);
            if index < kept {
                self.replace(index, question)?;
            } else {
                self.add(question);
            }
        }
        while self.questions.len() > wanted {
            let last = self.questions.len() - 1;
            self.remove(last)?;
        }

        let mut quotas = self.default_quotas();
        quotas.extend(file.quotas);
        Ok(quotas)
    }

    /// Validates the draft and turns it into a test with provisional ids.
    /// `quotas` overrides the per-tag defaults; unknown labels are ignored.
    pub fn build(&self, quotas: &BTreeMap<String, u32>) -> Result<Test, AuthoringError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AuthoringError::EmptyTestName);
        }
        let teacher_name = self.teacher_name.trim();
        if teacher_name.is_empty() {
            return Err(AuthoringError::EmptyTeacherName);
        }
        if self.questions.is_empty() {
            return Err(AuthoringError::NoQuestions);
        }

        let test_id = self.editing.unwrap_or_default();
        let tags: Vec<Tag> = self
            .tag_counts
            .iter()
            .zip(1..)
            .map(|((label, count), id)| {
                let quota = quotas.get(label).copied().unwrap_or(*count);
                Tag::new(id, label.clone(), quota, test_id)
            })
            .collect();

        let mut questions = Vec::with_capacity(self.questions.len());
        for (index, draft) in self.questions.iter().enumerate() {
            if draft.body.trim().is_empty() {
                return Err(AuthoringError::EmptyQuestionBody(index));
            }
            let kind = match &draft.answer {
                DraftAnswer::FreeText { answer } => QuestionKind::FreeText {
                    correct_answer: answer.clone(),
                },
                DraftAnswer::MultiSelect { correct, wrong } => {
                    if correct.is_empty() {
                        return Err(AuthoringError::NoCorrectOption(index));
                    }
                    let options = correct
                        .iter()
                        .map(|text| Answer::new(text.clone(), true))
                        .chain(wrong.iter().map(|text| Answer::new(text.clone(), false)))
                        .collect();
                    QuestionKind::MultiSelect { options }
                }
                DraftAnswer::Ordering { items } => {
                    if items.len() < 2 {
                        return Err(AuthoringError::TooFewOrderingItems(index));
                    }
                    let items = items
                        .iter()
                        .zip(1..)
                        .map(|(text, position)| OrderingItem::new(text.clone(), position))
                        .collect();
                    QuestionKind::Ordering { items }
                }
            };
            let tag_id = tags
                .iter()
                .find(|tag| tag.name == draft.tag_label())
                .map(|tag| tag.id);
            questions.push(Question::new(index as u32 + 1, draft.body.clone(), tag_id, kind));
        }

        Ok(Test {
            id: test_id,
            name: name.to_string(),
            teacher_name: teacher_name.to_string(),
            tags,
            questions,
        })
    }

    /// Saves the draft. A new test is inserted; an edited one has all of its tags and
    /// questions replaced. The name is checked before anything is written.
    pub fn commit(
        &self,
        storage: &mut dyn Storage,
        quotas: &BTreeMap<String, u32>,
    ) -> Result<TestId, AuthoringError> {
        let test = self.build(quotas)?;

        let clash = storage
            .list_tests()?
            .into_iter()
            .any(|t| t.name == test.name && Some(t.id) != self.editing);
        if clash {
            return Err(AuthoringError::DuplicateName(test.name));
        }

        let name = test.name.clone();
        let question_count = test.questions.len();
        let id = storage.save_test(test, self.editing.is_some())?;
        log::info!(
            "Test '{}' {} with {} questions",
            name,
            if self.editing.is_some() { "saved" } else { "created" },
            question_count
        );
        Ok(id)
    }
}

/// A whole draft as written in an import file.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DraftFile {
    pub name: String,
    pub teacher_name: String,
    pub questions: Vec<DraftQuestion>,
    /// Per-tag quota overrides.
    #[serde(default)]
    pub quotas: BTreeMap<String, u32>,
}

impl DraftFile {
    /// The stored test in import-file form, with its current quotas.
    pub fn from_test(test: &Test) -> Result<Self, AuthoringError> {
        let draft = TestDraft::edit(test)?;
        Ok(Self {
            name: draft.name,
            teacher_name: draft.teacher_name,
            questions: draft.questions,
            quotas: test
                .tags
                .iter()
                .map(|tag| (tag.name.clone(), tag.quota))
                .collect(),
        })
    }

    pub fn into_draft(self) -> (TestDraft, BTreeMap<String, u32>) {
        let mut draft = TestDraft::new(self.name, self.teacher_name);
        for question in self.questions {
            draft.add(DraftQuestion::new(question.body, question.answer, question.tag));
        }
        let mut quotas = draft.default_quotas();
        quotas.extend(self.quotas);
        (draft, quotas)
    }
}

/// Positions form exactly `1..=N`.
pub fn positions_are_permutation(items: &[OrderingItem]) -> bool {
    let mut positions: Vec<u32> = items.iter().map(|item| item.position).collect();
    positions.sort_unstable();
    positions.iter().zip(1..).all(|(position, expected)| *position == expected)
}
