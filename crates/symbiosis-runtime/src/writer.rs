//! Background persistence of extracted facts.
//!
//! The turn hands its entries to a bounded queue and returns. One worker task
//! judges and stores them in order. [`MemoryWriter::drain`] waits until every
//! job queued before it has been processed.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dedup::{FactCandidate, FactJudge, FactVerdict};
use symbiosis_core::MemoryEntry;
use symbiosis_memory::MemoryRetriever;

/// Default number of queued jobs before `submit` waits for room.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

const FACT_KEYWORD_MIN_CHARS: usize = 5;
const FACT_KEYWORDS: usize = 3;

/// One turn's worth of entries plus the memory rows that turn retrieved.
#[derive(Debug, Clone, Default)]
pub struct WriteJob {
    pub entries: Vec<MemoryEntry>,
    pub context: Vec<String>,
}

enum Command {
    Write(WriteJob),
    Flush(oneshot::Sender<()>),
}

pub struct MemoryWriter {
    tx: mpsc::Sender<Command>,
    handle: JoinHandle<()>,
}

impl MemoryWriter {
    /// Start the worker. Must be called inside a tokio runtime.
    pub fn spawn(judge: FactJudge, retriever: Arc<MemoryRetriever>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = Worker { judge, retriever };
        let handle = tokio::spawn(worker.run(rx));
        Self { tx, handle }
    }

    /// Queue a job. Waits only when the queue is full.
    pub async fn submit(&self, job: WriteJob) {
        if job.entries.is_empty() {
            return;
        }
        let count = job.entries.len();
        if self.tx.send(Command::Write(job)).await.is_err() {
            warn!(count, "memory writer stopped, entries dropped");
        } else {
            debug!(count, "entries queued for storage");
        }
    }

    /// Wait for every job queued so far.
    pub async fn drain(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(Command::Flush(done)).await.is_ok() {
            let _ = wait.await;
        }
    }

    /// Finish queued work and stop the worker.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "memory writer task failed");
        }
    }
}

struct Worker {
    judge: FactJudge,
    retriever: Arc<MemoryRetriever>,
}

impl Worker {
    async fn run(self, mut rx: mpsc::Receiver<Command>) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                Command::Write(job) => self.process(job).await,
                Command::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        debug!("memory writer stopped");
    }

    async fn process(&self, job: WriteJob) {
        let mut accepted: Vec<String> = Vec::new();
        for entry in job.entries {
            if entry.is_blank() {
                continue;
            }
            let specific = self.retriever.retrieve(&fact_keywords(&entry.fact)).await;
            let mut context = job.context.clone();
            context.extend(specific.relevant_memories);

            let candidate = FactCandidate {
                fact: &entry.fact,
                entities: &entry.entities,
            };
            let entry = match self.judge.judge(candidate, &context, &accepted).await {
                FactVerdict::Duplicate => {
                    debug!(fact = %entry.fact, "duplicate fact discarded");
                    continue;
                }
                FactVerdict::Meta => {
                    debug!(fact = %entry.fact, "conversational fact discarded");
                    continue;
                }
                FactVerdict::Contradiction(message) => {
                    warn!(fact = %entry.fact, %message, "fact contradicts memory, discarded");
                    continue;
                }
                FactVerdict::New { fact, entities } => MemoryEntry {
                    fact,
                    entities,
                    ..entry
                },
            };

            match self.retriever.backend().store_atomic(&entry).await {
                Ok(()) => info!(fact = %entry.fact, importance = entry.importance, "fact stored"),
                Err(e) => warn!(error = %e, fact = %entry.fact, "fact not stored"),
            }
            accepted.push(entry.fact);
        }
    }
}

/// Words longer than four letters, the first three of them.
pub fn fact_keywords(fact: &str) -> Vec<String> {
    fact.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.chars().count() >= FACT_KEYWORD_MIN_CHARS)
        .take(FACT_KEYWORDS)
        .map(String::from)
        .collect()
}
