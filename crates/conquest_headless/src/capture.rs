//! Frame capture for offline rendering.
//!
//! A capture file is a bincode stream: one [`CaptureHeader`], then one
//! `Some(CaptureFrame)` per simulated tick, then a `None` terminator. A
//! file without the terminator was cut short and is rejected on read.
//!
//! Each frame carries the full snapshot after the tick plus that tick's
//! events, so a renderer can draw any frame without replaying the game.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use conquest_core::events::{Outcome, TickEvents};
use conquest_core::random::RandomSource;
use conquest_core::simulation::Simulation;
use conquest_core::snapshot::WorldSnapshot;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Capture format version.
pub const CAPTURE_VERSION: u32 = 1;

/// Errors reading or writing capture files.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// File system failure.
    #[error("capture I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding or decoding failure, including a truncated stream.
    #[error("capture encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    /// The file was written by an incompatible version.
    #[error("capture version mismatch: expected {expected}, got {found}")]
    VersionMismatch {
        /// Version this build reads
        expected: u32,
        /// Version found in the file
        found: u32,
    },
}

/// Metadata at the start of a capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureHeader {
    /// Format version.
    pub version: u32,
    /// Seed the game ran with.
    pub seed: u64,
    /// Ticks per simulated second.
    pub tick_rate: u32,
    /// Visual theme of the map.
    pub biome: Option<String>,
}

impl CaptureHeader {
    /// Header for the current format version.
    #[must_use]
    pub fn new(seed: u64, tick_rate: u32, biome: Option<String>) -> Self {
        Self {
            version: CAPTURE_VERSION,
            seed,
            tick_rate,
            biome,
        }
    }
}

/// World state after one tick, with the events of that tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureFrame {
    /// State after the tick.
    pub snapshot: WorldSnapshot,
    /// What happened during the tick.
    pub events: TickEvents,
}

/// Streams frames into a writer.
pub struct CaptureWriter<W: Write> {
    writer: W,
    frames: u64,
}

impl<W: Write> CaptureWriter<W> {
    /// Write the header and get ready for frames.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be written.
    pub fn new(mut writer: W, header: &CaptureHeader) -> Result<Self, CaptureError> {
        bincode::serialize_into(&mut writer, header)?;
        Ok(Self { writer, frames: 0 })
    }

    /// Append one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be written.
    pub fn write_frame(&mut self, frame: &CaptureFrame) -> Result<(), CaptureError> {
        bincode::serialize_into(&mut self.writer, &Some(frame))?;
        self.frames += 1;
        Ok(())
    }

    /// Frames written so far.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Write the terminator, flush, and hand back the writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminator cannot be written or flushed.
    pub fn finish(mut self) -> Result<W, CaptureError> {
        bincode::serialize_into(&mut self.writer, &None::<CaptureFrame>)?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Reads frames back from a capture stream.
pub struct CaptureReader<R: Read> {
    reader: R,
    header: CaptureHeader,
    done: bool,
}

impl<R: Read> CaptureReader<R> {
    /// Read and check the header.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is unreadable or from another version.
    pub fn new(mut reader: R) -> Result<Self, CaptureError> {
        let header: CaptureHeader = bincode::deserialize_from(&mut reader)?;
        if header.version != CAPTURE_VERSION {
            return Err(CaptureError::VersionMismatch {
                expected: CAPTURE_VERSION,
                found: header.version,
            });
        }
        Ok(Self {
            reader,
            header,
            done: false,
        })
    }

    /// The capture's header.
    #[must_use]
    pub fn header(&self) -> &CaptureHeader {
        &self.header
    }

    /// Next frame, or `None` after the terminator.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream ends before the terminator.
    pub fn next_frame(&mut self) -> Result<Option<CaptureFrame>, CaptureError> {
        if self.done {
            return Ok(None);
        }
        let frame: Option<CaptureFrame> = bincode::deserialize_from(&mut self.reader)?;
        self.done = frame.is_none();
        Ok(frame)
    }

    /// Read every remaining frame.
    ///
    /// # Errors
    ///
    /// Returns an error if any frame fails to decode.
    pub fn read_all(mut self) -> Result<Vec<CaptureFrame>, CaptureError> {
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }
}

/// Summary of a finished capture run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSummary {
    /// Frames written.
    pub frames: u64,
    /// Outcome, if decided within the tick limit.
    pub victory: Option<Outcome>,
    /// Whether the game reached its finished state.
    pub finished: bool,
    /// State hash after the last frame.
    pub final_hash: u64,
}

/// Tick `sim` until it finishes or `max_ticks` have run, writing a frame
/// per tick.
///
/// # Errors
///
/// Returns an error if a frame cannot be written.
pub fn record<R: RandomSource, W: Write>(
    sim: &mut Simulation<R>,
    writer: &mut CaptureWriter<W>,
    max_ticks: u64,
) -> Result<CaptureSummary, CaptureError> {
    let start = writer.frames();
    while !sim.is_finished() && writer.frames() - start < max_ticks {
        let events = sim.tick();
        if !events.is_empty() {
            debug!(tick = sim.get_tick(), events = events.len(), "Captured events");
        }
        writer.write_frame(&CaptureFrame {
            snapshot: sim.snapshot(),
            events,
        })?;
    }

    Ok(CaptureSummary {
        frames: writer.frames() - start,
        victory: sim.victory(),
        finished: sim.is_finished(),
        final_hash: sim.state_hash(),
    })
}

/// Record a whole game into a capture file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn record_to_file<R: RandomSource, P: AsRef<Path>>(
    sim: &mut Simulation<R>,
    header: &CaptureHeader,
    path: P,
    max_ticks: u64,
) -> Result<CaptureSummary, CaptureError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = BufWriter::new(File::create(path)?);
    let mut writer = CaptureWriter::new(file, header)?;
    let summary = record(sim, &mut writer, max_ticks)?;
    writer.finish()?;

    info!(
        path = %path.display(),
        frames = summary.frames,
        finished = summary.finished,
        "Capture written"
    );
    Ok(summary)
}

/// Open a capture file for reading.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or has a bad header.
pub fn open<P: AsRef<Path>>(path: P) -> Result<CaptureReader<BufReader<File>>, CaptureError> {
    CaptureReader::new(BufReader::new(File::open(path)?))
}
