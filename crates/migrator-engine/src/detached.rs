//! Background tasks whose outcome is still observed.

use std::fmt::Display;
use std::future::Future;

use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Run `future` in the background and hand its outcome to `sink`.
///
/// Failures are logged and recorded. A panic inside `future` is reported to
/// the sink as an error instead of being lost with the task.
pub fn spawn_detached<F, T, E, S>(name: &'static str, future: F, sink: S) -> JoinHandle<()>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
    S: FnOnce(Result<T, String>) + Send + 'static,
{
    let inner = tokio::spawn(future);

    tokio::spawn(async move {
        let outcome = match inner.await {
            Ok(Ok(value)) => {
                debug!(task = name, "Detached task finished");
                Ok(value)
            }
            Ok(Err(e)) => {
                error!(task = name, error = %e, "Detached task failed");
                Err(e.to_string())
            }
            Err(join_error) => {
                error!(task = name, error = %join_error, "Detached task aborted");
                Err(join_error.to_string())
            }
        };
        sink(outcome);
    })
}
