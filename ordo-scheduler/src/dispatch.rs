//! Outcome of a dispatch attempt.

/// What happened when the scheduler was asked for the next task.
///
/// `Idle` is the normal answer for an empty queue, not an error.
#[must_use = "an idle dispatch means no executor ran"]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dispatch<R> {
    /// A task was dequeued and the executor returned this value.
    Executed(R),
    /// No work was pending; the executor was not invoked.
    Idle,
}

impl<R> Dispatch<R> {
    /// Returns true if the executor ran.
    pub fn is_executed(&self) -> bool {
        matches!(self, Dispatch::Executed(_))
    }

    /// Returns true if the queue was empty.
    pub fn is_idle(&self) -> bool {
        matches!(self, Dispatch::Idle)
    }

    /// Converts into the executor's return value, if it ran.
    pub fn into_option(self) -> Option<R> {
        match self {
            Dispatch::Executed(value) => Some(value),
            Dispatch::Idle => None,
        }
    }

    /// Maps the executor's return value.
    pub fn map<U, F: FnOnce(R) -> U>(self, f: F) -> Dispatch<U> {
        match self {
            Dispatch::Executed(value) => Dispatch::Executed(f(value)),
            Dispatch::Idle => Dispatch::Idle,
        }
    }
}

impl<R> From<Dispatch<R>> for Option<R> {
    fn from(dispatch: Dispatch<R>) -> Self {
        dispatch.into_option()
    }
}
