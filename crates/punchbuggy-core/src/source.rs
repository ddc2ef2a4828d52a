use punchbuggy_types::error::Result;
use punchbuggy_types::state::ApplicationState;

/// Supplies the live state on demand. Must be cheap and free of side effects.
pub trait StateSource: Send + Sync {
    /// `None` means there is nothing to back up.
    fn current_state(&self) -> Option<ApplicationState>;
}

impl<F> StateSource for F
where
    F: Fn() -> Option<ApplicationState> + Send + Sync,
{
    fn current_state(&self) -> Option<ApplicationState> {
        self()
    }
}

/// Replaces the live state with a restored copy.
pub trait StateApplier: Send + Sync {
    fn apply_state(&self, state: ApplicationState) -> Result<()>;
}

impl<F> StateApplier for F
where
    F: Fn(ApplicationState) -> Result<()> + Send + Sync,
{
    fn apply_state(&self, state: ApplicationState) -> Result<()> {
        self(state)
    }
}
