//! Bounded worker pool for async execution
//!
//! Worker threads share one FIFO job channel. With a queue size the channel
//! is bounded and `execute` blocks the producer while it is full.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::features::backend::ports::BackendError;

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Clone)]
enum JobSender {
    Bounded(SyncSender<Job>),
    Unbounded(Sender<Job>),
}

impl JobSender {
    fn send(&self, job: Job) -> Result<(), mpsc::SendError<Job>> {
        match self {
            JobSender::Bounded(tx) => tx.send(job),
            JobSender::Unbounded(tx) => tx.send(job),
        }
    }
}

pub struct WorkerPool {
    name: String,
    threads: usize,
    queue_size: Option<usize>,
    sender: Mutex<Option<JobSender>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(name: impl Into<String>, threads: usize, queue_size: Option<usize>) -> std::io::Result<Self> {
        let name = name.into();
        let threads = threads.max(1);
        let (sender, receiver) = match queue_size {
            Some(size) => {
                let (tx, rx) = mpsc::sync_channel(size);
                (JobSender::Bounded(tx), rx)
            }
            None => {
                let (tx, rx) = mpsc::channel();
                (JobSender::Unbounded(tx), rx)
            }
        };
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(threads);
        for i in 0..threads {
            let receiver = Arc::clone(&receiver);
            let handle = thread::Builder::new()
                .name(format!("indexrelay-{}-{}", name, i))
                .spawn(move || worker_loop(receiver))?;
            workers.push(handle);
        }

        tracing::debug!(pool = %name, threads, ?queue_size, "worker pool started");
        Ok(Self {
            name,
            threads,
            queue_size,
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn queue_size(&self) -> Option<usize> {
        self.queue_size
    }

    /// Queue a job; blocks while a bounded queue is full
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) -> Result<(), BackendError> {
        let sender = self
            .sender
            .lock()
            .clone()
            .ok_or_else(|| BackendError::PoolShutDown(self.name.clone()))?;
        sender
            .send(Box::new(job))
            .map_err(|_| BackendError::PoolShutDown(self.name.clone()))
    }

    /// Stop accepting jobs, run what is queued, join the workers
    pub fn shutdown(&self) {
        drop(self.sender.lock().take());
        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            if handle.join().is_err() {
                tracing::error!(pool = %self.name, "worker thread panicked");
            }
        }
        tracing::debug!(pool = %self.name, "worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(receiver: Arc<Mutex<Receiver<Job>>>) {
    loop {
        let job = receiver.lock().recv();
        match job {
            Ok(job) => {
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    tracing::error!("indexing job panicked");
                }
            }
            Err(_) => break,
        }
    }
}
