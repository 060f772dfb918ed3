//! Test utilities for tablecat-store.
//!
//! `FaultInjectingBackend` wraps an [`InMemoryBackend`] and lets a test make
//! specific writes fail or stall the way a remote store would (network
//! error, throttling), and records every scan so a test can assert which
//! partitions a query touched.

use crate::memory_impl::InMemoryBackend;
use crate::storage_trait::{KvIterator, Partition, Result, StorageBackend, StorageError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type PartitionPredicate = Arc<dyn Fn(&Partition) -> bool + Send + Sync>;

/// Arguments of one recorded `scan` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanArgs {
    pub partition: String,
    pub start_key: Option<Vec<u8>>,
    pub end_key: Option<Vec<u8>>,
    pub limit: Option<usize>,
}

#[derive(Default)]
struct Faults {
    fail_puts: Option<PartitionPredicate>,
    fail_deletes: Option<PartitionPredicate>,
    // Remaining successful puts before every further put fails
    puts_before_failure: Option<usize>,
    delay_puts: Option<(PartitionPredicate, Duration)>,
}

/// StorageBackend wrapper with injectable write failures and scan recording.
pub struct FaultInjectingBackend {
    inner: InMemoryBackend,
    faults: Mutex<Faults>,
    scans: Mutex<Vec<ScanArgs>>,
    put_calls: AtomicUsize,
}

impl FaultInjectingBackend {
    pub fn new() -> Self {
        Self {
            inner: InMemoryBackend::new(),
            faults: Mutex::new(Faults::default()),
            scans: Mutex::new(Vec::new()),
            put_calls: AtomicUsize::new(0),
        }
    }

    /// Fail every put (including conditional puts) whose partition matches.
    pub fn fail_puts_where<F>(&self, predicate: F)
    where
        F: Fn(&Partition) -> bool + Send + Sync + 'static,
    {
        self.faults.lock().fail_puts = Some(Arc::new(predicate));
    }

    /// Fail every delete whose partition matches.
    pub fn fail_deletes_where<F>(&self, predicate: F)
    where
        F: Fn(&Partition) -> bool + Send + Sync + 'static,
    {
        self.faults.lock().fail_deletes = Some(Arc::new(predicate));
    }

    /// Let `n` more puts succeed, then fail all following puts.
    pub fn fail_puts_after(&self, n: usize) {
        self.faults.lock().puts_before_failure = Some(n);
    }

    /// Stall every matching put for `delay` before it is applied.
    ///
    /// Calls reach the backend on a blocking thread, so the sleep blocks
    /// only that call.
    pub fn delay_puts_where<F>(&self, predicate: F, delay: Duration)
    where
        F: Fn(&Partition) -> bool + Send + Sync + 'static,
    {
        self.faults.lock().delay_puts = Some((Arc::new(predicate), delay));
    }

    /// Remove every injected fault; the store behaves normally again.
    pub fn clear_faults(&self) {
        *self.faults.lock() = Faults::default();
    }

    /// All scans issued so far, in call order.
    pub fn scans(&self) -> Vec<ScanArgs> {
        self.scans.lock().clone()
    }

    pub fn scan_calls(&self) -> usize {
        self.scans.lock().len()
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    /// The wrapped store, for direct inspection.
    pub fn inner(&self) -> &InMemoryBackend {
        &self.inner
    }

    fn check_put(&self, partition: &Partition) -> Result<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        let delay = match &self.faults.lock().delay_puts {
            Some((predicate, delay)) if predicate(partition) => Some(*delay),
            _ => None,
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let mut faults = self.faults.lock();
        if let Some(predicate) = &faults.fail_puts {
            if predicate(partition) {
                return Err(StorageError::IoError(format!(
                    "injected put failure on partition {}",
                    partition
                )));
            }
        }
        if let Some(remaining) = faults.puts_before_failure.as_mut() {
            if *remaining == 0 {
                return Err(StorageError::IoError(format!(
                    "injected crash before put on partition {}",
                    partition
                )));
            }
            *remaining -= 1;
        }
        Ok(())
    }

    fn check_delete(&self, partition: &Partition) -> Result<()> {
        let faults = self.faults.lock();
        if let Some(predicate) = &faults.fail_deletes {
            if predicate(partition) {
                return Err(StorageError::IoError(format!(
                    "injected delete failure on partition {}",
                    partition
                )));
            }
        }
        Ok(())
    }
}

impl Default for FaultInjectingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for FaultInjectingBackend {
    fn get(&self, partition: &Partition, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(partition, key)
    }

    fn put(&self, partition: &Partition, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_put(partition)?;
        self.inner.put(partition, key, value)
    }

    fn put_if_absent(&self, partition: &Partition, key: &[u8], value: &[u8]) -> Result<bool> {
        self.check_put(partition)?;
        self.inner.put_if_absent(partition, key, value)
    }

    fn delete(&self, partition: &Partition, key: &[u8]) -> Result<()> {
        self.check_delete(partition)?;
        self.inner.delete(partition, key)
    }

    fn scan(
        &self,
        partition: &Partition,
        start_key: Option<&[u8]>,
        end_key: Option<&[u8]>,
        limit: Option<usize>,
    ) -> Result<KvIterator<'_>> {
        self.scans.lock().push(ScanArgs {
            partition: partition.name().to_string(),
            start_key: start_key.map(|k| k.to_vec()),
            end_key: end_key.map(|k| k.to_vec()),
            limit,
        });
        self.inner.scan(partition, start_key, end_key, limit)
    }

    fn backend_name(&self) -> &'static str {
        "fault-injecting-memory"
    }
}
