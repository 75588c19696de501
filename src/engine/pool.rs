//! Fixed-size worker pool
//!
//! Workers pull jobs from one shared channel. Each worker owns a private
//! resource (a repository handle) created on its first job; a failed creation
//! is reported to that job and retried on the next one.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{self, Receiver, Sender};
use log::{debug, warn};

use crate::error::{MiningError, MiningResult};

type Job<R> = Box<dyn FnOnce(Result<&R, &MiningError>) + Send>;

/// Creates a worker's private resource
pub type WorkerInit<R> = Arc<dyn Fn() -> MiningResult<R> + Send + Sync>;

pub struct WorkerPool<R: 'static> {
    sender: Option<Sender<Job<R>>>,
    workers: Vec<JoinHandle<()>>,
}

impl<R: 'static> WorkerPool<R> {
    pub fn new(size: usize, init: WorkerInit<R>) -> MiningResult<Self> {
        let size = size.max(1);
        let (sender, receiver) = crossbeam_channel::unbounded::<Job<R>>();

        let mut workers = Vec::with_capacity(size);
        for index in 0..size {
            let receiver = receiver.clone();
            let init = Arc::clone(&init);
            let handle = thread::Builder::new()
                .name(format!("gminer-worker-{}", index))
                .spawn(move || worker_loop(index, receiver, init))?;
            workers.push(handle);
        }
        debug!("Started {} mining workers", size);

        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job. It receives the executing worker's resource, or the error
    /// that prevented creating it.
    pub fn execute<F>(&self, job: F) -> MiningResult<()>
    where
        F: FnOnce(Result<&R, &MiningError>) + Send + 'static,
    {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| MiningError::job("worker pool is shut down"))?;
        sender
            .send(Box::new(job))
            .map_err(|_| MiningError::job("all mining workers have exited"))
    }
}

impl<R: 'static> Drop for WorkerPool<R> {
    fn drop(&mut self) {
        // Closing the channel ends every worker loop once the queue drains
        self.sender.take();
        for worker in self.workers.drain(..) {
            let name = worker.thread().name().unwrap_or("worker").to_string();
            if worker.join().is_err() {
                warn!("{} terminated abnormally", name);
            }
        }
    }
}

fn worker_loop<R>(index: usize, receiver: Receiver<Job<R>>, init: WorkerInit<R>) {
    let mut resource: Option<R> = None;

    for job in receiver.iter() {
        if resource.is_none() {
            match init() {
                Ok(created) => resource = Some(created),
                Err(e) => {
                    warn!("Worker {} could not initialize: {}", index, e);
                    job(Err(&e));
                    continue;
                }
            }
        }
        if let Some(resource) = resource.as_ref() {
            job(Ok(resource));
        }
    }
    debug!("Worker {} finished", index);
}
