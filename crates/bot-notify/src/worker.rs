//! Background worker that runs notification jobs.
//!
//! Callers submit [`Job`]s through a [`JobQueue`] without waiting. The
//! worker runs every job as its own task, with at most `max_in_flight`
//! running at once. A delivered notification schedules a visibility job for
//! its recipient, which also runs on its own. Nothing is retried, and a
//! failed job is logged and dropped.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, warn};

use crate::dispatcher::NotificationDispatcher;
use crate::visibility::VisibilitySynchronizer;

/// Work handled by the notification worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Post `message` as `bot_id` to `recipient_id`
    Deliver {
        bot_id: String,
        recipient_id: String,
        message: String,
    },
    /// Make the bot's direct channel visible to `recipient_id`
    EnsureVisible {
        recipient_id: String,
        bot_id: String,
    },
}

impl Job {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Deliver { .. } => "deliver",
            Self::EnsureVisible { .. } => "ensure_visible",
        }
    }
}

/// Non-blocking submission handle for the worker.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
}

impl JobQueue {
    /// Queue `job` without waiting. Returns `false` if it was dropped.
    pub fn submit(&self, job: Job) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) => {
                warn!(job = job.kind(), "Notification queue full, dropping job");
                false
            }
            Err(TrySendError::Closed(job)) => {
                warn!(job = job.kind(), "Notification worker stopped, dropping job");
                false
            }
        }
    }
}

/// Consumes the job queue.
pub struct NotificationWorker {
    dispatcher: Arc<NotificationDispatcher>,
    visibility: Arc<VisibilitySynchronizer>,
    rx: mpsc::Receiver<Job>,
    max_in_flight: usize,
}

impl NotificationWorker {
    /// Create a worker and the queue feeding it.
    #[must_use]
    pub fn new(
        dispatcher: Arc<NotificationDispatcher>,
        visibility: Arc<VisibilitySynchronizer>,
        capacity: usize,
        max_in_flight: usize,
    ) -> (Self, JobQueue) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = Self {
            dispatcher,
            visibility,
            rx,
            max_in_flight: max_in_flight.max(1),
        };
        (worker, JobQueue { tx })
    }

    /// Run the worker on the current tokio runtime.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process jobs until every queue handle is dropped and all work is done.
    pub async fn run(mut self) {
        let mut tasks: JoinSet<Option<Job>> = JoinSet::new();
        let mut open = true;

        loop {
            tokio::select! {
                Some(result) = tasks.join_next(), if !tasks.is_empty() => match result {
                    Ok(Some(follow_up)) => self.start(&mut tasks, follow_up),
                    Ok(None) => {}
                    Err(e) => error!(error = %e, "Notification task failed"),
                },
                job = self.rx.recv(), if open && tasks.len() < self.max_in_flight => match job {
                    Some(job) => self.start(&mut tasks, job),
                    None => open = false,
                },
                else => break,
            }
        }

        debug!("Notification worker stopped");
    }

    fn start(&self, tasks: &mut JoinSet<Option<Job>>, job: Job) {
        let dispatcher = Arc::clone(&self.dispatcher);
        let visibility = Arc::clone(&self.visibility);
        tasks.spawn(async move { run_job(&dispatcher, &visibility, job).await });
    }
}

/// Run one job, returning the follow-up job if there is one.
async fn run_job(
    dispatcher: &NotificationDispatcher,
    visibility: &VisibilitySynchronizer,
    job: Job,
) -> Option<Job> {
    match job {
        Job::Deliver {
            bot_id,
            recipient_id,
            message,
        } => match dispatcher.send_as(&bot_id, &recipient_id, &message).await {
            Ok(_) => Some(Job::EnsureVisible {
                recipient_id,
                bot_id,
            }),
            Err(e) => {
                warn!(%recipient_id, error = %e, "Notification dropped");
                None
            }
        },
        Job::EnsureVisible {
            recipient_id,
            bot_id,
        } => {
            if let Err(e) = visibility.ensure_visible(&recipient_id, &bot_id).await {
                warn!(%recipient_id, %bot_id, error = %e, "Failed to show direct channel");
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::{BroadcastBus, Fault, MemoryBackend};
    use crate::config::BotAccountConfig;
    use crate::model::PREFERENCE_CATEGORY_DIRECT_CHANNEL_SHOW;
    use crate::provisioner::BotAccountProvisioner;
    use crate::resolver::DirectChannelResolver;

    async fn build_worker(
        backend: &Arc<MemoryBackend>,
        capacity: usize,
    ) -> (NotificationWorker, JobQueue, String) {
        let bus = Arc::new(BroadcastBus::default());
        let provisioner = Arc::new(BotAccountProvisioner::new(
            backend.clone(),
            BotAccountConfig::default(),
        ));
        let bot = provisioner.ensure_bot_account().await.unwrap();
        let dispatcher = Arc::new(NotificationDispatcher::new(
            provisioner,
            DirectChannelResolver::new(backend.clone()),
            backend.clone(),
            bus.clone(),
        ));
        let visibility = Arc::new(VisibilitySynchronizer::new(backend.clone(), bus));
        let (worker, queue) = NotificationWorker::new(dispatcher, visibility, capacity, 4);
        (worker, queue, bot.id.clone())
    }

    #[tokio::test]
    async fn test_delivery_schedules_visibility_follow_up() {
        let backend = Arc::new(MemoryBackend::new());
        let alice = backend.add_user("alice").await;
        let (worker, queue, bot_id) = build_worker(&backend, 8).await;
        let handle = worker.spawn();

        assert!(queue.submit(Job::Deliver {
            bot_id: bot_id.clone(),
            recipient_id: alice.id.clone(),
            message: "hello".to_string(),
        }));
        drop(queue);
        handle.await.unwrap();

        assert_eq!(backend.posts().await.len(), 1);
        let pref = backend
            .preference(&alice.id, PREFERENCE_CATEGORY_DIRECT_CHANNEL_SHOW, &bot_id)
            .await
            .unwrap();
        assert!(pref.is_shown());
    }

    #[tokio::test]
    async fn test_failed_delivery_skips_visibility() {
        let backend = Arc::new(MemoryBackend::new());
        let alice = backend.add_user("alice").await;
        backend.set_fault(Fault::PostCreate, true);
        let (worker, queue, bot_id) = build_worker(&backend, 8).await;
        let handle = worker.spawn();

        queue.submit(Job::Deliver {
            bot_id,
            recipient_id: alice.id.clone(),
            message: "hello".to_string(),
        });
        drop(queue);
        handle.await.unwrap();

        assert!(backend.posts().await.is_empty());
        assert_eq!(backend.preference_writes(), 0);
    }

    #[tokio::test]
    async fn test_full_queue_drops_jobs() {
        let backend = Arc::new(MemoryBackend::new());
        let (worker, queue, bot_id) = build_worker(&backend, 1).await;

        let job = Job::EnsureVisible {
            recipient_id: "u1".to_string(),
            bot_id,
        };
        assert!(queue.submit(job.clone()));
        assert!(!queue.submit(job));

        drop(queue);
        worker.run().await;
        assert_eq!(backend.preference_writes(), 1);
    }

    #[tokio::test]
    async fn test_stopped_worker_rejects_jobs() {
        let backend = Arc::new(MemoryBackend::new());
        let (worker, queue, bot_id) = build_worker(&backend, 4).await;
        drop(worker);

        assert!(!queue.submit(Job::EnsureVisible {
            recipient_id: "u1".to_string(),
            bot_id,
        }));
    }
}
