use types::GameMarkId;

/// A submitted mark is correct iff it equals the configured answer for the
/// task. A task with no configured answer accepts nothing.
pub fn is_correct(submitted: GameMarkId, expected: Option<GameMarkId>) -> bool {
    expected == Some(submitted)
}
