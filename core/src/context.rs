// stockpile/src/context.rs

//! Per-operation deadline and cancellation.
//!
//! Every storage and service call takes an [`OpContext`]. Work running under
//! a context that is cancelled or past its deadline is dropped, and a
//! transaction handle never commits once its context is done.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{CancelReason, StoreError, StoreResult};

#[derive(Debug, Clone)]
pub struct OpContext {
  deadline: Option<Instant>,
  token: CancellationToken,
}

impl Default for OpContext {
  fn default() -> Self {
    Self::background()
  }
}

impl OpContext {
  /// No deadline, cancelled only through [`OpContext::cancel`].
  pub fn background() -> Self {
    Self {
      deadline: None,
      token: CancellationToken::new(),
    }
  }

  pub fn with_timeout(timeout: Duration) -> Self {
    Self::background().deadline_at(Instant::now() + timeout)
  }

  /// Tightens the deadline; a later deadline than the current one is ignored.
  pub fn deadline_at(mut self, deadline: Instant) -> Self {
    self.deadline = Some(match self.deadline {
      Some(current) if current <= deadline => current,
      _ => deadline,
    });
    self
  }

  /// A context that is cancelled together with `self` (but can also be
  /// cancelled on its own) and inherits its deadline.
  pub fn child(&self) -> Self {
    Self {
      deadline: self.deadline,
      token: self.token.child_token(),
    }
  }

  pub fn deadline(&self) -> Option<Instant> {
    self.deadline
  }

  pub fn cancel(&self) {
    self.token.cancel();
  }

  pub fn is_done(&self) -> bool {
    self.done_reason().is_some()
  }

  fn done_reason(&self) -> Option<CancelReason> {
    if self.token.is_cancelled() {
      return Some(CancelReason::Cancelled);
    }
    match self.deadline {
      Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
      _ => None,
    }
  }

  /// `Err(Cancelled)` once the context is done.
  pub fn check(&self) -> StoreResult<()> {
    match self.done_reason() {
      Some(reason) => Err(StoreError::Cancelled(reason)),
      None => Ok(()),
    }
  }

  /// Drives `fut` until it finishes or the context is done, whichever comes
  /// first. On cancellation the future is dropped, which releases anything
  /// it holds (an open transaction rolls back on drop).
  pub async fn run<T, F>(&self, fut: F) -> StoreResult<T>
  where
    F: Future<Output = StoreResult<T>>,
  {
    self.check()?;
    tokio::select! {
      biased;
      _ = self.token.cancelled() => Err(StoreError::Cancelled(CancelReason::Cancelled)),
      _ = sleep_until(self.deadline) => Err(StoreError::Cancelled(CancelReason::DeadlineExceeded)),
      result = fut => result,
    }
  }
}

async fn sleep_until(deadline: Option<Instant>) {
  match deadline {
    Some(deadline) => tokio::time::sleep_until(deadline).await,
    None => std::future::pending::<()>().await,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ErrorKind;

  #[tokio::test]
  async fn background_context_runs_to_completion() {
    let ctx = OpContext::background();
    let value = ctx.run(async { Ok::<_, StoreError>(42) }).await.unwrap();
    assert_eq!(value, 42);
    assert!(ctx.check().is_ok());
  }

  #[tokio::test(start_paused = true)]
  async fn deadline_aborts_slow_work() {
    let ctx = OpContext::with_timeout(Duration::from_millis(50));
    let result = ctx
      .run(async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok::<_, StoreError>(())
      })
      .await;
    assert!(matches!(
      result,
      Err(StoreError::Cancelled(CancelReason::DeadlineExceeded))
    ));
    assert_eq!(ctx.check().unwrap_err().kind(), ErrorKind::Cancelled);
  }

  #[tokio::test]
  async fn cancelling_parent_cancels_child() {
    let parent = OpContext::background();
    let child = parent.child();
    parent.cancel();
    assert!(child.is_done());
    assert!(matches!(
      child.run(async { Ok::<_, StoreError>(()) }).await,
      Err(StoreError::Cancelled(CancelReason::Cancelled))
    ));
  }

  #[tokio::test]
  async fn deadline_only_tightens() {
    let ctx = OpContext::with_timeout(Duration::from_secs(1));
    let first = ctx.deadline().unwrap();
    let later = ctx.clone().deadline_at(first + Duration::from_secs(30));
    assert_eq!(later.deadline(), Some(first));
    let sooner = ctx.deadline_at(first - Duration::from_millis(500));
    assert!(sooner.deadline().unwrap() < first);
  }
}
