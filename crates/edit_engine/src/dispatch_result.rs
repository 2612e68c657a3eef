//! Dispatch results

use serde::{Deserialize, Serialize};

/// How much of the screen a dispatch invalidated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScreenUpdate {
    #[default]
    None,
    /// Only the paragraph holding the cursor
    SinglePar,
    Full,
}

/// What a dispatch did, returned by value to the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub handled: bool,
    pub update: ScreenUpdate,
    /// The document content changed
    pub buffer_changed: bool,
    /// Text for the status line
    pub message: Option<String>,
}

impl DispatchResult {
    /// Nothing wanted the command
    pub fn refused() -> Self {
        Self::default()
    }

    /// Handled without visible change
    pub fn handled() -> Self {
        Self {
            handled: true,
            ..Self::default()
        }
    }

    /// The cursor moved
    pub fn moved() -> Self {
        Self {
            handled: true,
            update: ScreenUpdate::SinglePar,
            ..Self::default()
        }
    }

    /// The document changed
    pub fn changed() -> Self {
        Self {
            handled: true,
            update: ScreenUpdate::Full,
            buffer_changed: true,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_update(mut self, update: ScreenUpdate) -> Self {
        self.update = self.update.max_with(update);
        self
    }
}

impl ScreenUpdate {
    fn rank(self) -> u8 {
        match self {
            ScreenUpdate::None => 0,
            ScreenUpdate::SinglePar => 1,
            ScreenUpdate::Full => 2,
        }
    }

    /// The larger of two updates
    pub fn max_with(self, other: ScreenUpdate) -> ScreenUpdate {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

/// Which way a handler left its node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Finish {
    /// Put the cursor after the node
    Forward,
    /// Put the cursor before the node
    Backward,
    /// Screen-right of the node
    Right,
    Left,
    /// Leave the node and let its parent handle the request
    Up,
    Down,
}

/// Answer of one level of the dispatch chain
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Outcome {
    Handled(DispatchResult),
    NotHandled,
    Finished(Finish),
}

impl Outcome {
    pub(crate) fn moved() -> Self {
        Outcome::Handled(DispatchResult::moved())
    }

    pub(crate) fn changed() -> Self {
        Outcome::Handled(DispatchResult::changed())
    }

    /// Handled, with nothing but a status message
    pub(crate) fn message(message: impl Into<String>) -> Self {
        Outcome::Handled(DispatchResult::handled().with_message(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert!(!DispatchResult::refused().handled);
        let changed = DispatchResult::changed();
        assert!(changed.handled && changed.buffer_changed);
        assert_eq!(changed.update, ScreenUpdate::Full);
        let moved = DispatchResult::moved().with_message("at end");
        assert!(!moved.buffer_changed);
        assert_eq!(moved.message.as_deref(), Some("at end"));
    }

    #[test]
    fn test_update_only_grows() {
        let result = DispatchResult::changed().with_update(ScreenUpdate::SinglePar);
        assert_eq!(result.update, ScreenUpdate::Full);
        let result = DispatchResult::handled().with_update(ScreenUpdate::SinglePar);
        assert_eq!(result.update, ScreenUpdate::SinglePar);
    }
}
