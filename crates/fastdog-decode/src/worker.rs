//! Background decode workers.
//!
//! Each worker task owns its own [`DualDecoder`]. Requests carry a
//! monotonically increasing task id; replies come back on one shared channel
//! and are routed to the waiting caller through the pending-task map.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use bytes::Bytes;
use fastdog_codec::{DecodeOptions, DecodeResult};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::DecoderConfig;
use crate::decoder::DualDecoder;
use crate::error::{DecoderError, Result};
use crate::select::{BackendHost, NativeHost};

pub type TaskId = u64;

type Reply = oneshot::Sender<Result<DecodeResult>>;

struct Job {
    task: TaskId,
    data: Bytes,
    zero_copy: bool,
    options: DecodeOptions,
}

pub struct DecodeWorkerPool {
    senders: Vec<mpsc::UnboundedSender<Job>>,
    pending: Arc<Mutex<HashMap<TaskId, Reply>>>,
    next_task: AtomicU64,
    next_worker: AtomicUsize,
    workers: Vec<JoinHandle<()>>,
    router: JoinHandle<()>,
}

impl DecodeWorkerPool {
    /// Start `workers` decode tasks (at least one) on the current runtime.
    pub fn spawn(workers: usize, config: DecoderConfig) -> Self {
        Self::spawn_with_host(workers, config, Arc::new(NativeHost))
    }

    pub fn spawn_with_host(
        workers: usize,
        config: DecoderConfig,
        host: Arc<dyn BackendHost>,
    ) -> Self {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<(TaskId, Result<DecodeResult>)>();
        let pending: Arc<Mutex<HashMap<TaskId, Reply>>> = Arc::default();

        let mut senders = Vec::new();
        let mut handles = Vec::new();
        for index in 0..workers.max(1) {
            let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
            let mut decoder = DualDecoder::with_host(config.clone(), host.clone());
            let done = done_tx.clone();
            handles.push(tokio::spawn(async move {
                while let Some(job) = rx.recv().await {
                    let result = decoder.decode(&job.data, job.zero_copy, &job.options).await;
                    if done.send((job.task, result)).is_err() {
                        break;
                    }
                }
                debug!(worker = index, "decode worker stopped");
            }));
            senders.push(tx);
        }

        let routes = pending.clone();
        let router = tokio::spawn(async move {
            while let Some((task, result)) = done_rx.recv().await {
                if let Some(reply) = routes.lock().remove(&task) {
                    let _ = reply.send(result);
                }
            }
        });

        Self {
            senders,
            pending,
            next_task: AtomicU64::new(1),
            next_worker: AtomicUsize::new(0),
            workers: handles,
            router,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.senders.len()
    }

    /// Requests dispatched but not yet answered.
    pub fn pending_tasks(&self) -> usize {
        self.pending.lock().len()
    }

    /// Decode on the next worker in round-robin order.
    pub async fn decode(
        &self,
        data: Bytes,
        zero_copy: bool,
        options: DecodeOptions,
    ) -> Result<DecodeResult> {
        let task = self.next_task.fetch_add(1, Ordering::Relaxed);
        let worker = self.next_worker.fetch_add(1, Ordering::Relaxed) % self.senders.len();

        let (reply, response) = oneshot::channel();
        self.pending.lock().insert(task, reply);

        let job = Job {
            task,
            data,
            zero_copy,
            options,
        };
        if self.senders[worker].send(job).is_err() {
            self.pending.lock().remove(&task);
            return Err(DecoderError::WorkerGone(worker));
        }
        debug!(task, worker, "decode dispatched");

        response.await.map_err(|_| DecoderError::WorkerGone(worker))?
    }

    /// Close the request channels and wait for every worker to finish.
    pub async fn shutdown(self) {
        drop(self.senders);
        for handle in self.workers {
            let _ = handle.await;
        }
        let _ = self.router.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fastdog_codec::encode_json;
    use futures_util::future::join_all;
    use serde_json::json;

    #[tokio::test]
    async fn replies_reach_their_callers() {
        let pool = DecodeWorkerPool::spawn(3, DecoderConfig::default());
        let requests = (0..12).map(|i| {
            let envelope = Bytes::from(encode_json(&json!({"id": i})).unwrap());
            let pool = &pool;
            async move { (i, pool.decode(envelope, false, DecodeOptions::default()).await) }
        });

        for (i, result) in join_all(requests).await {
            assert_eq!(result.unwrap().data.as_json(), Some(&json!({"id": i})));
        }
        assert_eq!(pool.pending_tasks(), 0);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn errors_are_routed_too() {
        let pool = DecodeWorkerPool::spawn(1, DecoderConfig::default());
        let err = pool
            .decode(Bytes::from_static(b"garbage"), false, DecodeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DecoderError::Decode { .. }));
        pool.shutdown().await;
    }
}
