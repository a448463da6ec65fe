//! Per-submitter form sessions.
//!
//! The outer map lock is only held long enough to find or insert an owner's
//! slot; answers are written under that owner's own lock, so owners never
//! wait on each other.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::AnswerError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSession {
    pub owner_id: String,
    pub answers: HashMap<String, String>,
    pub required_fields: HashSet<String>,
}

impl FormSession {
    fn new(owner_id: &str, required_fields: HashSet<String>) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            answers: HashMap::new(),
            required_fields,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.answers.len() == self.required_fields.len()
    }
}

/// Completeness before and after an answer was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub was_complete: bool,
    pub is_complete: bool,
}

impl AnswerOutcome {
    pub fn completeness_changed(self) -> bool {
        self.was_complete != self.is_complete
    }
}

/// Result of an atomic "drain if complete".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    NoSession,
    Incomplete { answered: usize, required: usize },
    Drained(HashMap<String, String>),
}

#[derive(Debug)]
struct Slot {
    session: FormSession,
    /// Set once drained; writers that raced the drain retry on a fresh slot.
    closed: bool,
}

#[derive(Debug)]
pub struct SessionStore {
    required_fields: HashSet<String>,
    sessions: Mutex<HashMap<String, Arc<Mutex<Slot>>>>,
}

impl SessionStore {
    pub fn new(required_fields: impl IntoIterator<Item = String>) -> Self {
        Self {
            required_fields: required_fields.into_iter().collect(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn required_fields(&self) -> &HashSet<String> {
        &self.required_fields
    }

    async fn slot(&self, owner: &str) -> Arc<Mutex<Slot>> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(owner.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(Slot {
                    session: FormSession::new(owner, self.required_fields.clone()),
                    closed: false,
                }))
            })
            .clone()
    }

    async fn existing(&self, owner: &str) -> Option<Arc<Mutex<Slot>>> {
        self.sessions.lock().await.get(owner).cloned()
    }

    /// Upsert one answer, creating the owner's session on first use.  A second
    /// form launch by the same owner keeps working on the same session.
    pub async fn record_answer(
        &self,
        owner: &str,
        field: &str,
        value: &str,
    ) -> Result<AnswerOutcome, AnswerError> {
        if !self.required_fields.contains(field) {
            return Err(AnswerError::NotRequired(field.to_string()));
        }
        loop {
            let slot = self.slot(owner).await;
            let mut slot = slot.lock().await;
            if slot.closed {
                continue;
            }
            let was_complete = slot.session.is_complete();
            slot.session
                .answers
                .insert(field.to_string(), value.to_string());
            return Ok(AnswerOutcome {
                was_complete,
                is_complete: slot.session.is_complete(),
            });
        }
    }

    pub async fn is_complete(&self, owner: &str) -> bool {
        match self.existing(owner).await {
            Some(slot) => {
                let slot = slot.lock().await;
                !slot.closed && slot.session.is_complete()
            }
            None => false,
        }
    }

    pub async fn has_session(&self, owner: &str) -> bool {
        self.existing(owner).await.is_some()
    }

    /// Copy of the owner's current answers.
    pub async fn answers(&self, owner: &str) -> HashMap<String, String> {
        match self.existing(owner).await {
            Some(slot) => slot.lock().await.session.answers.clone(),
            None => HashMap::new(),
        }
    }

    /// Remove the session and return its answers in one step.
    pub async fn drain(&self, owner: &str) -> Option<HashMap<String, String>> {
        let slot = self.sessions.lock().await.remove(owner)?;
        let mut slot = slot.lock().await;
        slot.closed = true;
        Some(std::mem::take(&mut slot.session.answers))
    }

    /// Drop an owner's session without submitting it.
    pub async fn discard(&self, owner: &str) -> bool {
        match self.drain(owner).await {
            Some(answers) => {
                debug!(owner = %owner, answered = answers.len(), "discarded form session");
                true
            }
            None => false,
        }
    }

    /// Drain only when every required field is answered.
    pub async fn drain_complete(&self, owner: &str) -> DrainOutcome {
        let mut sessions = self.sessions.lock().await;
        let Some(slot) = sessions.get(owner).cloned() else {
            return DrainOutcome::NoSession;
        };
        let mut slot = slot.lock().await;
        if !slot.session.is_complete() {
            return DrainOutcome::Incomplete {
                answered: slot.session.answers.len(),
                required: slot.session.required_fields.len(),
            };
        }
        sessions.remove(owner);
        slot.closed = true;
        DrainOutcome::Drained(std::mem::take(&mut slot.session.answers))
    }

    /// Put answers back after a failed submission so the owner can retry.
    /// Answers recorded in the meantime win over the restored ones.
    pub async fn restore(&self, owner: &str, answers: HashMap<String, String>) {
        loop {
            let slot = self.slot(owner).await;
            let mut slot = slot.lock().await;
            if slot.closed {
                continue;
            }
            for (field, value) in answers {
                if self.required_fields.contains(&field) {
                    slot.session.answers.entry(field).or_insert(value);
                }
            }
            return;
        }
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
