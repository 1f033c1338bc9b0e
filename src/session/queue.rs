//! Single-consumer transition queue.
//!
//! One tokio task owns the state value and runs transitions strictly in
//! submission order. Transition `n + 1` does not read the state until the
//! state produced by transition `n` has been reconciled and committed.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error};

use super::SessionError;

/// Un paso atómico `State -> Future<State>`.
pub type Transition<S> = Box<dyn FnOnce(S) -> BoxFuture<'static, anyhow::Result<S>> + Send>;

/// Runs between computing a new state and committing it.
#[async_trait]
pub trait Reconcile<S>: Send + Sync + 'static {
    async fn reconcile(&self, old: &S, new: S) -> S;
}

/// Reconciler que no hace nada.
#[cfg(test)]
pub struct NoReconcile;

#[cfg(test)]
#[async_trait]
impl<S: Send + Sync + 'static> Reconcile<S> for NoReconcile {
    async fn reconcile(&self, _old: &S, new: S) -> S {
        new
    }
}

struct Job<S> {
    transition: Transition<S>,
    done: oneshot::Sender<Result<bool, SessionError>>,
}

/// Resolves once the submitted transition committed (or failed).
#[must_use = "drop the completion explicitly if the outcome is not needed"]
pub struct Completion {
    rx: oneshot::Receiver<Result<bool, SessionError>>,
}

impl Completion {
    pub async fn wait(self) -> Result<(), SessionError> {
        self.applied().await.map(drop)
    }

    /// Like [`wait`](Self::wait), but reports whether the transition
    /// produced a state different from the one it was handed. `false` means
    /// the transition did not apply to the state it found.
    pub async fn applied(self) -> Result<bool, SessionError> {
        self.rx.await.unwrap_or(Err(SessionError::Closed))
    }
}

/// Handle to a running queue. Cloning shares the same actor.
pub struct TransitionQueue<S> {
    tx: mpsc::Sender<Job<S>>,
    state: watch::Receiver<S>,
    backlog: usize,
}

impl<S> Clone for TransitionQueue<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            state: self.state.clone(),
            backlog: self.backlog,
        }
    }
}

impl<S> TransitionQueue<S>
where
    S: Clone + PartialEq + Send + Sync + 'static,
{
    /// Spawns the actor task. Must be called inside a tokio runtime.
    pub fn spawn<R>(initial: S, reconciler: R, backlog: usize, label: impl Into<String>) -> Self
    where
        R: Reconcile<S>,
    {
        let (tx, rx) = mpsc::channel(backlog.max(1));
        let (state_tx, state_rx) = watch::channel(initial.clone());
        tokio::spawn(run_queue(initial, reconciler, rx, state_tx, label.into()));

        Self {
            tx,
            state: state_rx,
            backlog,
        }
    }

    /// Submits a transition. Fails immediately when the backlog is full.
    pub fn enqueue<F, Fut>(&self, transition: F) -> Result<Completion, SessionError>
    where
        F: FnOnce(S) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<S>> + Send + 'static,
    {
        let (done, rx) = oneshot::channel();
        let job = Job {
            transition: Box::new(move |state| Box::pin(transition(state))),
            done,
        };

        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SessionError::Overloaded {
                backlog: self.backlog,
            },
            mpsc::error::TrySendError::Closed(_) => SessionError::Closed,
        })?;

        Ok(Completion { rx })
    }

    /// Último estado confirmado.
    pub fn snapshot(&self) -> S {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.state.clone()
    }
}

async fn run_queue<S, R>(
    mut state: S,
    reconciler: R,
    mut rx: mpsc::Receiver<Job<S>>,
    state_tx: watch::Sender<S>,
    label: String,
) where
    S: Clone + PartialEq + Send + Sync + 'static,
    R: Reconcile<S>,
{
    debug!("🧵 Cola de transiciones iniciada ({})", label);

    while let Some(job) = rx.recv().await {
        let outcome = match (job.transition)(state.clone()).await {
            Ok(next) => {
                let changed = next != state;
                let next = reconciler.reconcile(&state, next).await;
                state = next;
                state_tx.send_replace(state.clone());
                Ok(changed)
            }
            Err(e) => {
                // El estado confirmado no cambia
                error!("❌ Transición fallida en {}: {:?}", label, e);
                Err(SessionError::TransitionFailed(format!("{e:#}")))
            }
        };

        let _ = job.done.send(outcome);
    }

    debug!("🧵 Cola de transiciones finalizada ({})", label);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    #[tokio::test]
    async fn transitions_run_in_submission_order() {
        let queue = TransitionQueue::spawn(Vec::<u32>::new(), NoReconcile, 16, "test");

        let mut completions = Vec::new();
        for i in 0..10u32 {
            completions.push(
                queue
                    .enqueue(move |mut seen: Vec<u32>| async move {
                        // Las primeras duermen más: sólo el orden de envío importa
                        tokio::time::sleep(Duration::from_millis(u64::from(10 - i))).await;
                        seen.push(i);
                        Ok(seen)
                    })
                    .unwrap(),
            );
        }
        for completion in completions {
            completion.wait().await.unwrap();
        }

        assert_eq!(queue.snapshot(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn concurrent_submitters_never_interleave() {
        let queue = TransitionQueue::spawn(0u64, NoReconcile, 64, "test");
        let active = Arc::new(Mutex::new(0u32));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let queue = queue.clone();
            let active = active.clone();
            tasks.push(tokio::spawn(async move {
                queue
                    .enqueue(move |n| async move {
                        {
                            let mut running = active.lock().unwrap();
                            *running += 1;
                            assert_eq!(*running, 1);
                        }
                        tokio::task::yield_now().await;
                        *active.lock().unwrap() -= 1;
                        Ok(n + 1)
                    })
                    .unwrap()
                    .wait()
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(queue.snapshot(), 8);
    }

    #[tokio::test]
    async fn failed_transition_keeps_state_and_queue_alive() {
        let queue = TransitionQueue::spawn(1u32, NoReconcile, 8, "test");

        let failed = queue
            .enqueue(|_| async { anyhow::bail!("boom") })
            .unwrap();
        let next = queue.enqueue(|n: u32| async move { Ok(n + 1) }).unwrap();

        assert!(matches!(
            failed.wait().await,
            Err(SessionError::TransitionFailed(msg)) if msg.contains("boom")
        ));
        next.wait().await.unwrap();
        assert_eq!(queue.snapshot(), 2);
    }

    #[tokio::test]
    async fn full_backlog_fails_fast() {
        let queue = TransitionQueue::spawn(0u32, NoReconcile, 2, "test");
        let (release, gate) = oneshot::channel::<()>();

        // Ocupa al consumidor
        let blocker = queue
            .enqueue(move |n| async move {
                let _ = gate.await;
                Ok(n)
            })
            .unwrap();
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let a = queue.enqueue(|n| async move { Ok(n + 1) }).unwrap();
        let b = queue.enqueue(|n| async move { Ok(n + 1) }).unwrap();
        let overflow = queue.enqueue(|n| async move { Ok(n + 100) });

        assert!(matches!(
            overflow,
            Err(SessionError::Overloaded { backlog: 2 })
        ));

        release.send(()).unwrap();
        blocker.wait().await.unwrap();
        a.wait().await.unwrap();
        b.wait().await.unwrap();
        assert_eq!(queue.snapshot(), 2);
    }

    struct Recording(Arc<Mutex<Vec<(u32, u32)>>>);

    #[async_trait]
    impl Reconcile<u32> for Recording {
        async fn reconcile(&self, old: &u32, new: u32) -> u32 {
            self.0.lock().unwrap().push((*old, new));
            new * 10
        }
    }

    #[tokio::test]
    async fn reconciler_sees_old_and_new_before_commit() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let queue = TransitionQueue::spawn(1u32, Recording(seen.clone()), 8, "test");

        queue
            .enqueue(|n| async move { Ok(n + 1) })
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![(1, 2)]);
        assert_eq!(queue.snapshot(), 20);
    }

    #[tokio::test]
    async fn completion_reports_whether_the_transition_applied() {
        let queue = TransitionQueue::spawn(5u32, Recording(Arc::default()), 8, "test");

        let unchanged = queue.enqueue(|n: u32| async move { Ok(n) }).unwrap();
        let changed = queue.enqueue(|n: u32| async move { Ok(n + 1) }).unwrap();

        // El reconciliador no cuenta como cambio
        assert_eq!(unchanged.applied().await, Ok(false));
        assert_eq!(changed.applied().await, Ok(true));
    }
}
