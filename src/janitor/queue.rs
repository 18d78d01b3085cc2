use std::fmt;

/// One record key held by a worker's processing queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueEntry {
    /// Processing queue holding the key, e.g. `processing-predict:pod-abc`
    pub processing_queue: String,
    /// Work queue the record was claimed from, e.g. `predict`
    pub queue: String,
    /// Worker identity owning the processing queue, e.g. `pod-abc`
    pub worker: String,
    /// Key of the job record
    pub record_key: String,
}

impl QueueEntry {
    /// Build an entry from a processing queue named `{prefix}-{queue}:{worker}`.
    ///
    /// Returns `None` when the name does not follow that convention.
    pub fn parse(prefix: &str, processing_queue: &str, record_key: &str) -> Option<Self> {
        let (queue, worker) = split_processing_queue(prefix, processing_queue)?;
        Some(Self {
            processing_queue: processing_queue.to_string(),
            queue: queue.to_string(),
            worker: worker.to_string(),
            record_key: record_key.to_string(),
        })
    }
}

impl fmt::Display for QueueEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.record_key, self.processing_queue)
    }
}

/// Split `{prefix}-{queue}:{worker}` into `(queue, worker)`.
///
/// Worker names never contain `:`, so the split happens on the last one.
pub fn split_processing_queue<'a>(prefix: &str, name: &'a str) -> Option<(&'a str, &'a str)> {
    let (head, worker) = name.rsplit_once(':')?;
    let queue = head.strip_prefix(prefix)?.strip_prefix('-')?;
    if queue.is_empty() || worker.is_empty() {
        return None;
    }
    Some((queue, worker))
}
