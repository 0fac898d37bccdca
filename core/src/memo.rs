use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};

use crate::error::{DownloadError, DownloadResult};

struct InFlight {
    result: Mutex<Option<DownloadResult<PathBuf>>>,
    done: Condvar,
}

impl InFlight {
    fn new() -> Self {
        Self {
            result: Mutex::new(None),
            done: Condvar::new(),
        }
    }
}

/// Collapses overlapping requests for the same cache path onto a single
/// executing operation. Waiters receive a clone of the leader's result; the
/// entry is removed once recorded, so a later call executes again.
pub struct TaskMemoizer {
    in_flight: Mutex<HashMap<PathBuf, Arc<InFlight>>>,
}

impl TaskMemoizer {
    pub fn new() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn run_deduplicated<F>(&self, key: &Path, op: F) -> DownloadResult<PathBuf>
    where
        F: FnOnce() -> DownloadResult<PathBuf>,
    {
        let (cell, leader) = {
            let mut map = self
                .in_flight
                .lock()
                .map_err(|_| DownloadError::Internal("in-flight map lock poisoned".to_string()))?;
            match map.get(key) {
                Some(cell) => (Arc::clone(cell), false),
                None => {
                    let cell = Arc::new(InFlight::new());
                    map.insert(key.to_path_buf(), Arc::clone(&cell));
                    (cell, true)
                }
            }
        };

        if leader {
            self.lead(key, &cell, op)
        } else {
            wait_for_result(&cell)
        }
    }

    fn lead<F>(&self, key: &Path, cell: &InFlight, op: F) -> DownloadResult<PathBuf>
    where
        F: FnOnce() -> DownloadResult<PathBuf>,
    {
        // Clears the entry and wakes waiters on every exit path. If the
        // operation unwinds before recording a result, waiters receive an
        // Internal error instead of blocking forever.
        struct Finish<'a> {
            memo: &'a TaskMemoizer,
            key: &'a Path,
            cell: &'a InFlight,
        }
        impl Drop for Finish<'_> {
            fn drop(&mut self) {
                let mut map = match self.memo.in_flight.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                map.remove(self.key);
                drop(map);

                let mut slot = match self.cell.result.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                if slot.is_none() {
                    *slot = Some(Err(DownloadError::Internal(
                        "download task aborted".to_string(),
                    )));
                }
                drop(slot);
                self.cell.done.notify_all();
            }
        }

        let finish = Finish {
            memo: self,
            key,
            cell,
        };
        let result = op();
        {
            let mut slot = match finish.cell.result.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *slot = Some(result.clone());
        }
        drop(finish);
        result
    }
}

impl Default for TaskMemoizer {
    fn default() -> Self {
        Self::new()
    }
}

fn wait_for_result(cell: &InFlight) -> DownloadResult<PathBuf> {
    let mut slot = match cell.result.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    loop {
        if let Some(result) = slot.as_ref() {
            return result.clone();
        }
        slot = match cell.done.wait(slot) {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
    }
}
