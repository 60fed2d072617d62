//! Task group: spawn tasks, join all of them, keep the first failure.

use std::future::Future;

use tokio::task::JoinSet;

use crate::lifecycle::context::{CancelReason, Context};

/// Failure reported by [`TaskGroup::wait`].
#[derive(Debug, thiserror::Error)]
pub enum GroupError<E> {
    /// A task returned an error.
    #[error(transparent)]
    Task(E),

    /// A task panicked or was aborted.
    #[error("task panicked: {0}")]
    Panicked(String),
}

/// A fixed set of tasks sharing one [`Context`].
///
/// The first task to fail cancels the context so its peers can unwind.
/// `wait` still joins every task before returning.
pub struct TaskGroup<E> {
    tasks: JoinSet<Result<(), E>>,
    context: Context,
}

impl<E> TaskGroup<E>
where
    E: std::error::Error + Send + 'static,
{
    /// Create a group bound to `context`.
    pub fn with_context(context: Context) -> Self {
        Self {
            tasks: JoinSet::new(),
            context,
        }
    }

    /// Spawn a task into the group.
    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    /// Join every task and return the first failure, if any.
    pub async fn wait(mut self) -> Result<(), GroupError<E>> {
        let mut first: Option<GroupError<E>> = None;

        while let Some(joined) = self.tasks.join_next().await {
            let failure = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => GroupError::Task(e),
                Err(join_err) => GroupError::Panicked(join_err.to_string()),
            };

            if first.is_none() {
                self.context
                    .cancel(CancelReason::TaskFailed(failure.to_string()));
                first = Some(failure);
            } else {
                tracing::debug!(error = %failure, "Discarding later task failure");
            }
        }

        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Debug, PartialEq, thiserror::Error)]
    #[error("{0}")]
    struct TestError(&'static str);

    #[tokio::test]
    async fn test_all_ok() {
        let ctx = Context::new();
        let mut group: TaskGroup<TestError> = TaskGroup::with_context(ctx.clone());
        group.spawn(async { Ok(()) });
        group.spawn(async { Ok(()) });

        assert!(group.wait().await.is_ok());
        assert!(ctx.err().is_none());
    }

    #[tokio::test]
    async fn test_first_error_cancels_peers() {
        let ctx = Context::new();
        let mut group = TaskGroup::with_context(ctx.clone());

        let peer_ctx = ctx.clone();
        group.spawn(async move {
            peer_ctx.done().await;
            Ok(())
        });
        group.spawn(async { Err(TestError("address in use")) });

        let err = group.wait().await.unwrap_err();
        assert!(matches!(err, GroupError::Task(TestError("address in use"))));
        assert_eq!(
            ctx.err(),
            Some(CancelReason::TaskFailed("address in use".into()))
        );
    }

    #[tokio::test]
    async fn test_later_errors_are_discarded() {
        let mut group = TaskGroup::with_context(Context::new());
        group.spawn(async { Err(TestError("first")) });
        group.spawn(async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Err(TestError("second"))
        });

        let err = group.wait().await.unwrap_err();
        assert_eq!(err.to_string(), "first");
    }

    #[tokio::test]
    async fn test_panic_is_a_failure() {
        let mut group: TaskGroup<TestError> = TaskGroup::with_context(Context::new());
        group.spawn(async {
            if true {
                panic!("boom");
            }
            Ok(())
        });

        let err = group.wait().await.unwrap_err();
        assert!(matches!(err, GroupError::Panicked(_)));
    }
}
