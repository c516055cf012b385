//! Conversation history: ordered, role-tagged turns.
//!
//! A [`Conversation`] only ever grows at the tail. The retry parser appends
//! corrective turns and extends the last assistant turn in place; nothing in
//! this crate removes or reorders turns.

use serde::{Deserialize, Serialize};

/// The author of a [`Turn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human / user side of the dialogue.
    Human,
    /// The model.
    Assistant,
}

/// One role-tagged message within a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who wrote the turn.
    pub role: Role,
    /// The turn body.
    pub text: String,
}

impl Turn {
    /// Create a turn with an explicit role.
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    /// Create a human turn.
    pub fn human(text: impl Into<String>) -> Self {
        Self::new(Role::Human, text)
    }

    /// Create an assistant turn.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }
}

/// An ordered sequence of [`Turn`]s.
///
/// # Example
///
/// ```
/// use llm_harness::conversation::{Conversation, Turn};
///
/// let mut convo = Conversation::new()
///     .with(Turn::human("List the ingredients."))
///     .with(Turn::assistant("<shopping-list>"));
/// convo.extend_last("<item/></shopping-list>");
///
/// assert_eq!(convo.len(), 2);
/// assert_eq!(convo.last().unwrap().text, "<shopping-list><item/></shopping-list>");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// An empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append.
    pub fn with(mut self, turn: Turn) -> Self {
        self.turns.push(turn);
        self
    }

    /// Append a turn at the tail.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Append text to the body of the last turn.
    ///
    /// Returns `false` (and does nothing) if the conversation is empty.
    pub fn extend_last(&mut self, text: &str) -> bool {
        match self.turns.last_mut() {
            Some(turn) => {
                turn.text.push_str(text);
                true
            }
            None => false,
        }
    }

    /// The most recent turn.
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// All turns, oldest first.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }
}

impl From<Vec<Turn>> for Conversation {
    fn from(turns: Vec<Turn>) -> Self {
        Self { turns }
    }
}

impl<'a> IntoIterator for &'a Conversation {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}
