use tokio::sync::mpsc;

/// Progress events emitted by a bagging or validation run.
///
/// Consumers subscribe before the run starts and receive an ordered stream
/// ending in exactly one terminal event ([`BagEvent::Completed`] or
/// [`BagEvent::Error`]). Nothing is emitted after the terminal event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BagEvent {
    /// The run has started
    Start { message: String },
    /// A file was written into (or read from) the bag
    FileAdded {
        path: String,
        /// Rough completion hint over the known file total, 0..=100
        percent: u8,
    },
    /// Checksums for a file were finalized
    Checksum { path: String },
    /// Terminal: the run finished
    Completed { succeeded: bool, message: String },
    /// Terminal: the run aborted on an unrecoverable error
    Error { message: String },
}

impl BagEvent {
    fn is_terminal(&self) -> bool {
        matches!(self, BagEvent::Completed { .. } | BagEvent::Error { .. })
    }
}

/// Event producer half. Dropped receivers are tolerated; emission after a
/// terminal event is ignored.
#[derive(Debug, Default)]
pub(crate) struct EventSender {
    tx: Option<mpsc::UnboundedSender<BagEvent>>,
    terminated: bool,
}

impl EventSender {
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<BagEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.tx = Some(tx);
        rx
    }

    pub fn emit(&mut self, event: BagEvent) {
        if self.terminated {
            return;
        }
        if event.is_terminal() {
            self.terminated = true;
        }
        if let Some(tx) = &self.tx {
            // Receiver may be gone; events are advisory
            let _ = tx.send(event);
        }
    }

    pub fn start(&mut self, message: impl Into<String>) {
        self.emit(BagEvent::Start {
            message: message.into(),
        });
    }

    pub fn file_added(&mut self, path: &str, done: usize, total: usize) {
        let percent = if total == 0 {
            100
        } else {
            ((done * 100) / total).min(100) as u8
        };
        self.emit(BagEvent::FileAdded {
            path: path.to_string(),
            percent,
        });
    }

    pub fn checksum(&mut self, path: &str) {
        self.emit(BagEvent::Checksum {
            path: path.to_string(),
        });
    }

    pub fn completed(&mut self, succeeded: bool, message: impl Into<String>) {
        self.emit(BagEvent::Completed {
            succeeded,
            message: message.into(),
        });
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.emit(BagEvent::Error {
            message: message.into(),
        });
    }
}
