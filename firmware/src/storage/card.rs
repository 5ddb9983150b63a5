use embassy_time::Delay;
use embedded_hal::spi::SpiDevice;
use embedded_sdmmc::{
    Error as SdError, Mode, RawDirectory, RawFile, RawVolume, SdCard, TimeSource, Timestamp,
    VolumeIdx, VolumeManager,
};
use payload_core::records::{LogRecord, RecordSink, StorageWriteError};

use super::{LOG_FILE_NAME, Settled, SyncFailure, SyncSchedule};

const MAX_OPEN_FILES: usize = 2;

/// The payload has no RTC; files carry a fixed creation date.
#[derive(Default)]
pub struct DummyTime;

impl TimeSource for DummyTime {
    fn get_timestamp(&self) -> Timestamp {
        Timestamp {
            year_since_1970: 56,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

pub type CardManager<SPI, T> = VolumeManager<SdCard<SPI, Delay>, T, MAX_OPEN_FILES>;

struct OpenLog {
    volume: RawVolume,
    root: RawDirectory,
    file: RawFile,
}

pub struct SdRecordSink<SPI, T>
where
    SPI: SpiDevice,
    T: TimeSource,
{
    mgr: CardManager<SPI, T>,
    open: Option<OpenLog>,
    schedule: SyncSchedule,
}

impl<SPI, T> SdRecordSink<SPI, T>
where
    SPI: SpiDevice,
    T: TimeSource,
{
    pub fn new(spi: SPI, time: T) -> Self {
        Self {
            mgr: VolumeManager::new(SdCard::new(spi, Delay), time),
            open: None,
            schedule: SyncSchedule::new(),
        }
    }

    /// Opens the volume and the log file up front so a missing card shows up
    /// at boot rather than on the first record.
    pub fn mount(&mut self) -> Result<(), StorageWriteError> {
        if self.open.is_none() {
            self.open = Some(self.open_log()?);
        }
        Ok(())
    }

    pub fn is_mounted(&self) -> bool {
        self.open.is_some()
    }

    fn open_log(&mut self) -> Result<OpenLog, StorageWriteError> {
        let volume = self
            .mgr
            .open_raw_volume(VolumeIdx(0))
            .map_err(|_| StorageWriteError::NotReady)?;
        let root = match self.mgr.open_root_dir(volume) {
            Ok(root) => root,
            Err(_) => {
                let _ = self.mgr.close_volume(volume);
                return Err(StorageWriteError::NotReady);
            }
        };
        let file = self.open_file(root).inspect_err(|_| {
            let _ = self.mgr.close_dir(root);
            let _ = self.mgr.close_volume(volume);
        })?;
        Ok(OpenLog { volume, root, file })
    }

    fn open_file(&mut self, root: RawDirectory) -> Result<RawFile, StorageWriteError> {
        let file = self
            .mgr
            .open_file_in_dir(root, LOG_FILE_NAME, Mode::ReadWriteCreateOrAppend)
            .map_err(classify)?;
        if let Err(error) = self.mgr.file_seek_from_end(file, 0) {
            let _ = self.mgr.close_file(file);
            return Err(classify(error));
        }
        Ok(file)
    }

    /// Forgets every handle so the next append starts from a fresh mount.
    fn unmount(&mut self) {
        if let Some(open) = self.open.take() {
            let _ = self.mgr.close_file(open.file);
            let _ = self.mgr.close_dir(open.root);
            let _ = self.mgr.close_volume(open.volume);
        }
        self.schedule.reset();
    }

    fn sync(&mut self) -> Result<(), SyncFailure> {
        let Some(open) = self.open.as_ref() else {
            return Err(SyncFailure::Close(StorageWriteError::NotReady));
        };
        let (file, root) = (open.file, open.root);
        self.mgr
            .close_file(file)
            .map_err(|error| SyncFailure::Close(classify(error)))?;

        let file = self.open_file(root).map_err(SyncFailure::Reopen)?;
        if let Some(open) = self.open.as_mut() {
            open.file = file;
        }
        self.schedule.reset();
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), StorageWriteError> {
        self.mount()?;
        let Some(open) = self.open.as_ref() else {
            return Err(StorageWriteError::NotReady);
        };
        if let Err(error) = self.mgr.write(open.file, bytes) {
            self.unmount();
            return Err(classify(error));
        }

        let sync = self.schedule.written().then(|| self.sync());
        let settled = Settled::after_write(sync);
        if settled.needs_remount() {
            self.unmount();
        }
        settled.into_result()
    }
}

impl<SPI, T> RecordSink for SdRecordSink<SPI, T>
where
    SPI: SpiDevice,
    T: TimeSource,
{
    fn append_record(&mut self, record: &LogRecord) -> Result<(), StorageWriteError> {
        let text = record.render().map_err(|_| StorageWriteError::Io)?;
        self.write(text.as_bytes())
    }
}

fn classify<E: core::fmt::Debug>(error: SdError<E>) -> StorageWriteError {
    match error {
        SdError::DiskFull | SdError::NotEnoughSpace => StorageWriteError::Full,
        SdError::NoSuchVolume | SdError::FormatError(_) => StorageWriteError::NotReady,
        _ => StorageWriteError::Io,
    }
}
