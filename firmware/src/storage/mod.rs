//! SD card record storage.
//!
//! Records are appended to `DATA.TXT` in the card's first FAT volume. The
//! directory entry only learns the new file size when the handle is closed,
//! so the sink cycles the handle every [`SYNC_EVERY`] records. Once a close
//! has succeeded the record is on the card, whatever happens while reopening.

use payload_core::records::StorageWriteError;

#[cfg(target_os = "none")]
mod card;

#[cfg(target_os = "none")]
pub use self::card::{DummyTime, SdRecordSink};

pub const LOG_FILE_NAME: &str = "DATA.TXT";
/// Records between directory entry updates.
pub const SYNC_EVERY: u32 = 10;

/// Counts written records and says when the handle is due for a close/reopen.
#[derive(Debug, Default)]
pub struct SyncSchedule {
    since_sync: u32,
}

impl SyncSchedule {
    #[must_use]
    pub const fn new() -> Self {
        Self { since_sync: 0 }
    }

    /// Notes one record written through the open handle. Returns `true` when
    /// the file should be synced now.
    pub fn written(&mut self) -> bool {
        self.since_sync = self.since_sync.saturating_add(1);
        self.since_sync >= SYNC_EVERY
    }

    pub fn reset(&mut self) {
        self.since_sync = 0;
    }
}

/// Which half of a close/reopen sync failed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SyncFailure {
    /// The directory entry was not updated.
    Close(StorageWriteError),
    /// The entry was updated but the file could not be opened again.
    Reopen(StorageWriteError),
}

/// What a successful data write turns into once the sync step has run.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Settled {
    /// Record stored, handle still open.
    Committed,
    /// Record stored, but the handles are gone; the next append remounts.
    CommittedRemount,
    /// Record not durable; the caller retries it after a remount.
    Failed(StorageWriteError),
}

impl Settled {
    /// Resolves a write that reached the file. `sync` is `None` when no sync
    /// was due.
    #[must_use]
    pub fn after_write(sync: Option<Result<(), SyncFailure>>) -> Self {
        match sync {
            None | Some(Ok(())) => Settled::Committed,
            Some(Err(SyncFailure::Reopen(_))) => Settled::CommittedRemount,
            Some(Err(SyncFailure::Close(error))) => Settled::Failed(error),
        }
    }

    #[must_use]
    pub const fn needs_remount(self) -> bool {
        !matches!(self, Settled::Committed)
    }

    pub const fn into_result(self) -> Result<(), StorageWriteError> {
        match self {
            Settled::Committed | Settled::CommittedRemount => Ok(()),
            Settled::Failed(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_falls_due_every_tenth_record() {
        let mut schedule = SyncSchedule::new();
        let due: Vec<bool> = (0..SYNC_EVERY).map(|_| schedule.written()).collect();
        assert!(due[..9].iter().all(|due| !due));
        assert!(due[9]);

        schedule.reset();
        let due_after_reset = (0..SYNC_EVERY).filter(|_| schedule.written()).count();
        assert_eq!(due_after_reset, 1);
    }

    #[test]
    fn reopen_failure_keeps_the_written_record() {
        let settled = Settled::after_write(Some(Err(SyncFailure::Reopen(StorageWriteError::Io))));
        assert_eq!(settled, Settled::CommittedRemount);
        assert_eq!(settled.into_result(), Ok(()));
        assert!(settled.needs_remount());
    }

    #[test]
    fn close_failure_asks_for_a_retry() {
        let settled = Settled::after_write(Some(Err(SyncFailure::Close(StorageWriteError::Full))));
        assert_eq!(settled.into_result(), Err(StorageWriteError::Full));
        assert!(settled.needs_remount());
    }

    #[test]
    fn plain_write_commits_without_remount() {
        for sync in [None, Some(Ok(()))] {
            let settled = Settled::after_write(sync);
            assert_eq!(settled, Settled::Committed);
            assert!(!settled.needs_remount());
        }
    }
}
