use crate::quiz::error::SessionError;

/// Click-to-rank state of one open ordering question.
///
/// Items are addressed by their display slot. Selecting an item gives it the next
/// rank; deselecting it closes the gap so ranks stay `1..=selected`.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OrderingTracker {
    total: usize,
    selection: Vec<usize>,
}

impl OrderingTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            selection: Vec::with_capacity(total),
        }
    }

    pub fn toggle(&mut self, slot: usize) -> Result<(), SessionError> {
        if slot >= self.total {
            return Err(SessionError::IndexOutOfRange {
                index: slot,
                len: self.total,
            });
        }
        match self.selection.iter().position(|s| *s == slot) {
            Some(at) => {
                self.selection.remove(at);
            }
            None => self.selection.push(slot),
        }
        Ok(())
    }

    pub fn rank_of(&self, slot: usize) -> Option<u32> {
        self.selection
            .iter()
            .position(|s| *s == slot)
            .map(|at| at as u32 + 1)
    }

    /// Rank label of every slot; `None` for slots not yet picked.
    pub fn labels(&self) -> Vec<Option<u32>> {
        (0..self.total).map(|slot| self.rank_of(slot)).collect()
    }

    pub fn selected(&self) -> usize {
        self.selection.len()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Submitting is allowed only once every item has a rank.
    pub fn is_complete(&self) -> bool {
        self.selection.len() == self.total
    }

    pub fn ranking(&self) -> Result<Vec<u32>, SessionError> {
        if !self.is_complete() {
            return Err(SessionError::OrderingIncomplete {
                selected: self.selection.len(),
                total: self.total,
            });
        }
        Ok(self.labels().into_iter().flatten().collect())
    }
}
