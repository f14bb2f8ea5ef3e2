//! Delivers channel messages to consumers with retries and dead-lettering.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use messaging::{InMemoryBroker, Message, PartitionReceiver, Publisher, dead_letter_channel};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::ServiceError;
use crate::consumer::EventConsumer;

/// Header carrying the failure reason on dead-lettered messages.
pub const EXCEPTION_MESSAGE_HEADER: &str = "x-exception-message";
/// Header carrying the channel a dead-lettered message came from.
pub const ORIGINAL_CHANNEL_HEADER: &str = "x-original-channel";

/// How often and how patiently a failing message is retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts including the first delivery.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(1000),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt following failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let scaled = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(scaled.min(self.max_backoff.as_secs_f64()).max(0.0))
            .unwrap_or(self.max_backoff)
    }
}

/// What happened to one message.
#[derive(Debug)]
pub enum Delivery {
    /// The consumer applied it.
    Applied { attempts: u32 },
    /// The consumer refused it; it was not retried.
    Rejected(ServiceError),
    /// Every attempt failed.
    Exhausted { attempts: u32, error: ServiceError },
}

impl Delivery {
    pub fn is_applied(&self) -> bool {
        matches!(self, Delivery::Applied { .. })
    }
}

/// Hands `message` to `consumer`, retrying retryable failures per `policy`.
#[tracing::instrument(skip_all, fields(consumer = consumer.name(), message_id = %message.message_id))]
pub async fn process_message<C: EventConsumer + ?Sized>(
    consumer: &C,
    message: &Message,
    policy: &RetryPolicy,
) -> Delivery {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match consumer.handle(message).await {
            Ok(()) => {
                metrics::counter!("events_consumed_total", "consumer" => consumer.name())
                    .increment(1);
                return Delivery::Applied { attempts: attempt };
            }
            Err(error) if !error.is_retryable() => {
                tracing::warn!(%error, "event rejected");
                metrics::counter!("events_rejected_total", "consumer" => consumer.name())
                    .increment(1);
                return Delivery::Rejected(error);
            }
            Err(error) if attempt >= max_attempts => {
                tracing::error!(%error, attempts = attempt, "event retries exhausted");
                metrics::counter!("events_rejected_total", "consumer" => consumer.name())
                    .increment(1);
                return Delivery::Exhausted {
                    attempts: attempt,
                    error,
                };
            }
            Err(error) => {
                let wait = policy.backoff(attempt);
                tracing::warn!(%error, attempt, backoff_ms = wait.as_millis() as u64, "event failed, retrying");
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
        }
    }
}

/// Starts consumers on a broker, one worker per partition.
#[derive(Clone)]
pub struct ConsumerRunner {
    broker: InMemoryBroker,
    policy: RetryPolicy,
}

impl ConsumerRunner {
    pub fn new(broker: InMemoryBroker, policy: RetryPolicy) -> Self {
        Self { broker, policy }
    }

    /// Subscribes `consumer` to its channel and starts its workers.
    ///
    /// Each partition is consumed sequentially, so events sharing a key are
    /// applied in publish order.
    pub async fn start(&self, consumer: Arc<dyn EventConsumer>) -> ConsumerHandle {
        let channel = consumer.channel();
        let subscription = self.broker.subscribe(channel.as_str()).await;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let workers = subscription
            .into_partitions()
            .into_iter()
            .map(|receiver| {
                tokio::spawn(run_partition(
                    Arc::clone(&consumer),
                    receiver,
                    self.broker.clone(),
                    self.policy.clone(),
                    shutdown_rx.clone(),
                ))
            })
            .collect::<Vec<_>>();

        tracing::info!(
            consumer = consumer.name(),
            %channel,
            workers = workers.len(),
            "consumer started"
        );
        ConsumerHandle {
            name: consumer.name(),
            shutdown: shutdown_tx,
            workers,
        }
    }
}

async fn run_partition(
    consumer: Arc<dyn EventConsumer>,
    mut receiver: PartitionReceiver,
    broker: InMemoryBroker,
    policy: RetryPolicy,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let message = tokio::select! {
            _ = shutdown.changed() => break,
            next = receiver.recv() => match next {
                Some(message) => message,
                None => break,
            },
        };

        match process_message(consumer.as_ref(), &message, &policy).await {
            Delivery::Applied { .. } => {}
            Delivery::Rejected(error) | Delivery::Exhausted { error, .. } => {
                dead_letter(&broker, consumer.channel().as_str(), message, &error).await;
            }
        }
    }
    tracing::debug!(
        consumer = consumer.name(),
        partition = receiver.partition(),
        "partition worker stopped"
    );
}

async fn dead_letter(broker: &InMemoryBroker, channel: &str, message: Message, error: &ServiceError) {
    let target = dead_letter_channel(channel);
    let mut parked = message;
    parked
        .headers
        .insert(EXCEPTION_MESSAGE_HEADER.to_string(), error.to_string());
    parked
        .headers
        .insert(ORIGINAL_CHANNEL_HEADER.to_string(), channel.to_string());

    match broker.publish(&target, parked).await {
        Ok(()) => tracing::warn!(channel = %target, %error, "message dead-lettered"),
        Err(e) => tracing::error!(channel = %target, error = %e, "dead-lettering failed"),
    }
}

/// Running workers of one consumer.
pub struct ConsumerHandle {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl ConsumerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stops the workers after their current message and waits for them.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for result in join_all(self.workers).await {
            if let Err(e) = result {
                tracing::error!(consumer = self.name, error = %e, "consumer worker failed");
            }
        }
        tracing::info!(consumer = self.name, "consumer stopped");
    }
}
