//! Local Batch Executor
//!
//! Runs one node's work range as fixed-size transactional batches on a bounded pool.
//!
//! ## Responsibilities
//! - **Queueing**: every batch of the range is queued up front on a closed job channel.
//! - **Workers**: `concurrency` workers pull batches until the queue is drained. Each batch
//!   builds its entities and commits them (or deletes them, for a removal campaign) on a
//!   blocking thread, bounded by the transaction timeout.
//! - **Join barrier**: outcomes go to a result channel that is read only after every worker
//!   has exited. A failed batch never cancels its siblings; the error is raised afterwards.

use super::backend::EntityBackend;
use super::factory::{EntityFactoryFn, FactoryRegistry};
use super::types::{BatchOutcome, ExecutionSummary};
use crate::campaign::progress::ProgressCounter;
use crate::campaign::types::{BatchJob, CampaignDescriptor, CampaignOperation, WorkRange};
use crate::error::{DatasetError, DatasetResult};

use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;

pub struct BatchExecutor {
    backend: Arc<dyn EntityBackend>,
    factories: Arc<FactoryRegistry>,
}

#[derive(Clone)]
enum BatchWork {
    Create(EntityFactoryFn),
    Remove,
}

/// Everything a worker needs to run a batch, shared by all workers of one run.
#[derive(Clone)]
struct BatchContext {
    backend: Arc<dyn EntityBackend>,
    work: BatchWork,
    descriptor: Arc<CampaignDescriptor>,
    counter: Arc<ProgressCounter>,
}

impl BatchExecutor {
    pub fn new(backend: Arc<dyn EntityBackend>, factories: Arc<FactoryRegistry>) -> Arc<Self> {
        Arc::new(Self { backend, factories })
    }

    /// Creates (or removes) every entity of `range`, returning once all batches have finished.
    pub async fn run(
        &self,
        descriptor: &CampaignDescriptor,
        range: WorkRange,
        counter: Arc<ProgressCounter>,
    ) -> DatasetResult<ExecutionSummary> {
        let started = Instant::now();
        let jobs = range.batches(descriptor.batch_size);
        let total = jobs.len();

        if total == 0 {
            tracing::info!("Empty work range {}, nothing to create", range);
            return Ok(ExecutionSummary {
                created: 0,
                batches: 0,
                failed: 0,
                duration: started.elapsed(),
            });
        }

        let work = match descriptor.operation {
            CampaignOperation::Create => BatchWork::Create(
                self.factories
                    .factory_for(descriptor.kind)
                    .map_err(|e| DatasetError::Configuration(e.to_string()))?,
            ),
            CampaignOperation::Remove => BatchWork::Remove,
        };

        let (job_tx, job_rx) = mpsc::channel::<BatchJob>(total);
        for job in jobs {
            job_tx
                .try_send(job)
                .map_err(|e| DatasetError::Configuration(format!("Failed to queue batch: {}", e)))?;
        }
        drop(job_tx);

        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<BatchOutcome>();
        let context = BatchContext {
            backend: self.backend.clone(),
            work,
            descriptor: Arc::new(descriptor.clone()),
            counter,
        };

        let workers = descriptor.concurrency.clamp(1, total);
        tracing::debug!(
            "Running {} batches of up to {} {} on {} workers",
            total,
            descriptor.batch_size,
            descriptor.kind,
            workers
        );

        let mut pool = JoinSet::new();
        for worker_id in 0..workers {
            let jobs = job_rx.clone();
            let results = result_tx.clone();
            let context = context.clone();
            pool.spawn(async move { worker_loop(worker_id, jobs, results, context).await });
        }
        drop(result_tx);

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Batch worker terminated abnormally: {}", e);
            }
        }

        let mut created = 0u64;
        let mut reported = 0usize;
        let mut failed = 0usize;
        let mut first_cause: Option<anyhow::Error> = None;

        while let Some(outcome) = result_rx.recv().await {
            reported += 1;
            match outcome.result {
                Ok(count) => created += count,
                Err(e) => {
                    failed += 1;
                    if first_cause.is_none() {
                        first_cause = Some(e);
                    }
                }
            }
        }

        if reported < total {
            failed += total - reported;
            if first_cause.is_none() {
                first_cause = Some(anyhow::anyhow!(
                    "{} batches never reported an outcome",
                    total - reported
                ));
            }
        }

        let duration = started.elapsed();
        match first_cause {
            None => Ok(ExecutionSummary {
                created,
                batches: total,
                failed: 0,
                duration,
            }),
            Some(first_cause) => {
                tracing::error!(
                    "{} of {} batches failed for range {} after {:?}",
                    failed,
                    total,
                    range,
                    duration
                );
                Err(DatasetError::BatchFailure {
                    failed_batches: failed,
                    total_batches: total,
                    created,
                    first_cause,
                })
            }
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<BatchJob>>>,
    results: mpsc::UnboundedSender<BatchOutcome>,
    context: BatchContext,
) {
    loop {
        let next = {
            let mut queue = jobs.lock().await;
            queue.recv().await
        };
        let Some(job) = next else {
            break;
        };

        tracing::trace!(
            "Worker {} picked batch {} [{}, {})",
            worker_id,
            job.index,
            job.start,
            job.end
        );

        let result = run_batch(&context, job).await;
        match &result {
            Ok(count) => {
                context.counter.add(*count);
            }
            Err(e) => {
                tracing::warn!(
                    "Batch {} [{}, {}) of {} failed: {:#}",
                    job.index,
                    job.start,
                    job.end,
                    context.descriptor.kind,
                    e
                );
            }
        }

        let outcome = BatchOutcome {
            batch: job.index,
            start: job.start,
            end: job.end,
            result,
        };
        if results.send(outcome).is_err() {
            break;
        }
    }
}

/// Runs one batch as a single transaction on a blocking thread.
async fn run_batch(context: &BatchContext, job: BatchJob) -> Result<u64> {
    let context = context.clone();
    let timeout = context.descriptor.transaction_timeout();

    tokio::task::spawn_blocking(move || match &context.work {
        BatchWork::Create(factory) => commit_batch(&context, factory, job, timeout),
        BatchWork::Remove => delete_batch(&context, job, timeout),
    })
        .await
        .map_err(|e| anyhow::anyhow!("Batch {} aborted: {}", job.index, e))?
}

fn commit_batch(
    context: &BatchContext,
    factory: &EntityFactoryFn,
    job: BatchJob,
    timeout: Duration,
) -> Result<u64> {
    let deadline = Instant::now() + timeout;
    let descriptor: &CampaignDescriptor = &context.descriptor;
    let mut entities = Vec::with_capacity(job.len() as usize);

    for index in job.start..job.end {
        if Instant::now() > deadline {
            return Err(anyhow::anyhow!(
                "Transaction timeout of {:?} exceeded at index {}",
                timeout,
                index
            ));
        }
        entities.push(factory(descriptor, index)?);
    }

    context
        .backend
        .commit_batch(descriptor.kind, descriptor.realm_name(), entities, deadline)?;

    Ok(job.len() as u64)
}

fn delete_batch(context: &BatchContext, job: BatchJob, timeout: Duration) -> Result<u64> {
    let deadline = Instant::now() + timeout;
    let descriptor: &CampaignDescriptor = &context.descriptor;
    let names: Vec<String> = (job.start..job.end)
        .map(|index| descriptor.entity_name(index))
        .collect();

    context
        .backend
        .delete_batch(descriptor.kind, descriptor.realm_name(), names, deadline)
}
