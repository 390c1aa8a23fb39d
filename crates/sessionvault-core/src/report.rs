//! Non-fatal error reporting.
//!
//! The session store hands errors it recovers from (fallback restores, failed
//! keep-alive saves, sanitizer failures) to an [`ErrorReporter`]. Reporting is
//! fire-and-forget and must never panic.

use std::sync::Arc;

use sessionvault_types::error::SessionError;
use tracing::error;

/// Sink for errors the store recovers from or propagates after logging.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &SessionError);
}

impl<T: ErrorReporter + ?Sized> ErrorReporter for Arc<T> {
    fn report(&self, error: &SessionError) {
        (**self).report(error)
    }
}

/// Default reporter: logs at `error` level through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, err: &SessionError) {
        error!(error = %err, "session store error");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Reporter that records every error it receives.
    #[derive(Debug, Default)]
    pub struct RecordingReporter {
        errors: Mutex<Vec<SessionError>>,
    }

    impl RecordingReporter {
        pub fn errors(&self) -> Vec<SessionError> {
            self.errors.lock().map(|e| e.clone()).unwrap_or_default()
        }
    }

    impl ErrorReporter for RecordingReporter {
        fn report(&self, error: &SessionError) {
            if let Ok(mut errors) = self.errors.lock() {
                errors.push(error.clone());
            }
        }
    }
}
