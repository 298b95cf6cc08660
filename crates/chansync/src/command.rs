//! Requests carried from callers to the coordinating task

use core::fmt;
use tokio::sync::oneshot;

/// Caller-supplied transformation applied to the guarded value in place
pub type Mutator<T> = Box<dyn FnOnce(&mut T) + Send + 'static>;

/// A single request on the shared request channel
pub enum Request<T> {
    /// Copy the current value into a private reply channel
    Read { reply: oneshot::Sender<T> },
    /// Apply a mutator to the value
    Write { mutator: Mutator<T> },
}

impl<T> Request<T> {
    pub fn read(reply: oneshot::Sender<T>) -> Self {
        Request::Read { reply }
    }

    pub fn write<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        Request::Write {
            mutator: Box::new(mutator),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Request::Read { .. } => "read",
            Request::Write { .. } => "write",
        }
    }
}

impl<T> fmt::Debug for Request<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Read { reply } => f
                .debug_struct("Read")
                .field("reply_open", &!reply.is_closed())
                .finish(),
            Request::Write { .. } => f.debug_struct("Write").finish_non_exhaustive(),
        }
    }
}
