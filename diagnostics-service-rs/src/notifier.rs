// diagnostics-service-rs/src/notifier.rs
//
// Best-effort progress events to the external observer.
//
// Events are queued to a single background sender task so the pipeline
// never blocks on the observer, while the in-progress/completed ordering
// per task is preserved (one channel, one sender loop, sequential POSTs).
// Delivery failures are logged and swallowed; pipeline correctness never
// depends on the observer being reachable.

use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;

const DELIVERY_TIMEOUT_SECS: u64 = 5;

/// Pipeline stage state as the observer expects it on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskStatus {
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Completed")]
    Completed,
}

#[derive(Debug, Serialize)]
struct TaskUpdate {
    task: String,
    status: TaskStatus,
}

#[derive(Debug, Clone)]
pub struct TaskNotifier {
    sender: mpsc::UnboundedSender<TaskUpdate>,
}

impl TaskNotifier {
    /// Spawns the background sender. Must be called from within a tokio
    /// runtime.
    pub fn new(base_url: &str) -> Self {
        let endpoint = format!("{}/notify-task", base_url.trim_end_matches('/'));
        let client = Client::builder()
            .timeout(Duration::from_secs(DELIVERY_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        let (sender, mut receiver) = mpsc::unbounded_channel::<TaskUpdate>();

        tokio::spawn(async move {
            while let Some(update) = receiver.recv().await {
                if let Err(err) = client.post(&endpoint).json(&update).send().await {
                    log::warn!(
                        "Task update delivery failed for '{}': {}",
                        update.task,
                        err
                    );
                }
            }
        });

        Self { sender }
    }

    /// Observer address from standard configuration.
    pub fn from_env() -> Self {
        let base_url = config_rs::get_client_address("NOTIFIER", 8088, None);
        Self::new(&base_url)
    }

    /// Queues one status event. Fire-and-forget: a full or closed queue is
    /// not an error the pipeline cares about.
    pub fn notify(&self, task: &str, status: TaskStatus) {
        let update = TaskUpdate {
            task: task.to_string(),
            status,
        };
        if self.sender.send(update).is_err() {
            log::warn!("Task update channel closed; dropping event for '{}'", task);
        }
    }
}
