use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::model::Event;

/// First bytes of every journal file. Bump the trailing digit when `Event` changes shape.
const MAGIC: &[u8; 8] = b"CAMRWAL1";

/// Write one `[u32 len][bincode][u32 crc32]` frame.
fn write_frame(writer: &mut impl Write, event: &Event) -> io::Result<()> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writer.write_all(&(payload.len() as u32).to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
    Ok(())
}

enum Frame {
    Event(Event),
    /// Clean end of file.
    End,
    /// Partial or corrupt frame. Everything from here on is discarded.
    Torn,
}

/// `Ok(false)` when the reader hit EOF before filling `buf`.
fn fill(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

fn read_frame(reader: &mut impl Read) -> io::Result<Frame> {
    let mut len_buf = [0u8; 4];
    let mut first = [0u8; 1];
    // Distinguish a clean end from a frame cut inside its length prefix.
    if !fill(reader, &mut first)? {
        return Ok(Frame::End);
    }
    len_buf[0] = first[0];
    if !fill(reader, &mut len_buf[1..])? {
        return Ok(Frame::Torn);
    }
    let len = u32::from_le_bytes(len_buf) as usize;

    let mut payload = vec![0u8; len];
    let mut crc_buf = [0u8; 4];
    if !fill(reader, &mut payload)? || !fill(reader, &mut crc_buf)? {
        return Ok(Frame::Torn);
    }
    if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
        return Ok(Frame::Torn);
    }
    match bincode::deserialize::<Event>(&payload) {
        Ok(event) => Ok(Frame::Event(event)),
        Err(_) => Ok(Frame::Torn),
    }
}

/// Append-only journal file.
///
/// Layout: an 8-byte magic header, then one frame per event:
/// `[u32: len][bincode: Event][u32: crc32]`, little-endian, `len` excluding the CRC.
/// A torn last frame (crash mid-write) is dropped on replay.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
    /// File length after the last successful `flush_sync`.
    committed_len: u64,
    committed_appends: u64,
}

impl Wal {
    /// Open (or create) the journal at `path`, writing the header into a new file.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::new(file);
        if writer.get_ref().metadata()?.len() < MAGIC.len() as u64 {
            // New file, or a crash before the header made it to disk.
            writer.get_ref().set_len(0)?;
            writer.write_all(MAGIC)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        let committed_len = writer.get_ref().metadata()?.len();
        Ok(Self {
            writer,
            path: path.to_path_buf(),
            appends_since_compact: 0,
            committed_len,
            committed_appends: 0,
        })
    }

    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    /// Buffer one event. Nothing is durable until `flush_sync`.
    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        write_frame(&mut self.writer, event)?;
        self.appends_since_compact += 1;
        Ok(())
    }

    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        self.committed_len = self.writer.get_ref().metadata()?.len();
        self.committed_appends = self.appends_since_compact;
        Ok(())
    }

    /// Drop everything since the last successful `flush_sync`: buffered bytes
    /// are discarded unwritten, bytes that already reached the file are truncated.
    pub fn rollback(&mut self) -> io::Result<()> {
        let file = OpenOptions::new().append(true).open(&self.path)?;
        file.set_len(self.committed_len)?;
        let stale = std::mem::replace(&mut self.writer, BufWriter::new(file));
        // into_parts hands back the buffer instead of flushing it on drop.
        let _ = stale.into_parts();
        self.appends_since_compact = self.committed_appends;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    fn compact_tmp_path(path: &Path) -> PathBuf {
        path.with_extension("wal.tmp")
    }

    /// Write `events` as a complete journal next to `path`, fsynced.
    pub fn write_compact_file(path: &Path, events: &[Event]) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(Self::compact_tmp_path(path))?);
        writer.write_all(MAGIC)?;
        for event in events {
            write_frame(&mut writer, event)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()
    }

    /// Rename the compacted file over the journal and reopen for appends.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        fs::rename(Self::compact_tmp_path(&self.path), &self.path)?;
        let file = OpenOptions::new().append(true).open(&self.path)?;
        self.committed_len = file.metadata()?.len();
        self.writer = BufWriter::new(file);
        self.appends_since_compact = 0;
        self.committed_appends = 0;
        Ok(())
    }

    #[cfg(test)]
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        Self::write_compact_file(&self.path, events)?;
        self.swap_compact_file()
    }

    /// Read every intact event from the journal at `path`. A missing or empty
    /// file is an empty journal; a file with a foreign header is an error.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);

        let mut header = [0u8; 8];
        if !fill(&mut reader, &mut header)? {
            return Ok(Vec::new());
        }
        if &header != MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} is not a rental journal", path.display()),
            ));
        }

        let mut events = Vec::new();
        loop {
            match read_frame(&mut reader)? {
                Frame::Event(event) => events.push(event),
                Frame::End => break,
                Frame::Torn => {
                    warn!(
                        path = %path.display(),
                        replayed = events.len(),
                        "discarding torn journal tail"
                    );
                    break;
                }
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date::Day;
    use crate::model::*;
    use ulid::Ulid;

    fn tmp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("camrent_test_wal");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = fs::remove_file(&path);
        path
    }

    fn camera_created(name: &str) -> Event {
        Event::CameraCreated {
            camera: Camera {
                id: Ulid::new(),
                name: name.into(),
                link: String::new(),
                status: CameraStatus::Available,
            },
        }
    }

    fn rental_created(camera_id: Ulid) -> Event {
        Event::RentalCreated {
            rental: Rental {
                id: Ulid::new(),
                camera_id,
                range: DateRange::new(
                    Day::from_ymd(2024, 5, 1).unwrap(),
                    Day::from_ymd(2024, 5, 4).unwrap(),
                ),
                notes: "weekend trip".into(),
                color: DEFAULT_COLOR.into(),
                status: RentalStatus::Active,
            },
        }
    }

    #[test]
    fn append_and_replay() {
        let path = tmp_path("append_and_replay.wal");
        let camera = camera_created("GR IIIx");
        let camera_id = camera.camera_ids()[0];
        let events = vec![camera, rental_created(camera_id)];

        {
            let mut wal = Wal::open(&path).unwrap();
            for e in &events {
                wal.append(e).unwrap();
            }
        }

        assert_eq!(Wal::replay(&path).unwrap(), events);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn new_file_gets_header_only() {
        let path = tmp_path("header_only.wal");
        drop(Wal::open(&path).unwrap());
        assert_eq!(fs::read(&path).unwrap(), MAGIC);
        assert!(Wal::replay(&path).unwrap().is_empty());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn reopen_does_not_duplicate_header() {
        let path = tmp_path("reopen.wal");
        let event = camera_created("Q3");
        Wal::open(&path).unwrap().append(&event).unwrap();
        Wal::open(&path).unwrap().append(&event).unwrap();
        assert_eq!(Wal::replay(&path).unwrap(), vec![event.clone(), event]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn replay_drops_torn_tail() {
        let path = tmp_path("torn.wal");
        let event = camera_created("X100VI");
        Wal::open(&path).unwrap().append(&event).unwrap();
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[9u8, 0, 0, 0, 1, 2]).unwrap(); // length says 9, two bytes follow
        }
        assert_eq!(Wal::replay(&path).unwrap(), vec![event]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn replay_stops_at_bad_crc() {
        let path = tmp_path("bad_crc.wal");
        let good = camera_created("A");
        let bad = Event::CameraDeleted { id: Ulid::new() };
        Wal::open(&path).unwrap().append(&good).unwrap();
        {
            let payload = bincode::serialize(&bad).unwrap();
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&(payload.len() as u32).to_le_bytes()).unwrap();
            f.write_all(&payload).unwrap();
            f.write_all(&0xDEAD_BEEFu32.to_le_bytes()).unwrap();
        }
        assert_eq!(Wal::replay(&path).unwrap(), vec![good]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn replay_missing_file_is_empty() {
        let path = tmp_path("missing.wal");
        assert!(Wal::replay(&path).unwrap().is_empty());
    }

    #[test]
    fn replay_rejects_foreign_file() {
        let path = tmp_path("foreign.wal");
        fs::write(&path, b"PGDMP\x01\x0e\x00 not ours").unwrap();
        let err = Wal::replay(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn compact_shrinks_and_keeps_appending() {
        let path = tmp_path("compact.wal");
        let camera = camera_created("Leica M11");
        let camera_id = camera.camera_ids()[0];

        let mut wal = Wal::open(&path).unwrap();
        wal.append(&camera).unwrap();
        for _ in 0..20 {
            let created = rental_created(camera_id);
            let Event::RentalCreated { rental } = &created else { unreachable!() };
            let cancelled = Event::RentalCancelled { id: rental.id, camera_id };
            wal.append(&created).unwrap();
            wal.append(&cancelled).unwrap();
        }
        assert_eq!(wal.appends_since_compact(), 41);
        let before = fs::metadata(&path).unwrap().len();

        wal.compact(std::slice::from_ref(&camera)).unwrap();
        assert_eq!(wal.appends_since_compact(), 0);
        let after = fs::metadata(&path).unwrap().len();
        assert!(after < before, "compacted journal should shrink: {after} < {before}");

        let late = rental_created(camera_id);
        wal.append(&late).unwrap();
        drop(wal);

        assert_eq!(Wal::replay(&path).unwrap(), vec![camera, late]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn buffered_appends_become_durable_on_flush() {
        let path = tmp_path("buffered.wal");
        let events: Vec<Event> = (0..5).map(|i| camera_created(&format!("cam-{i}"))).collect();
        {
            let mut wal = Wal::open(&path).unwrap();
            for e in &events {
                wal.append_buffered(e).unwrap();
            }
            assert_eq!(wal.appends_since_compact(), 5);
            wal.flush_sync().unwrap();
        }
        assert_eq!(Wal::replay(&path).unwrap(), events);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn rollback_discards_frames_not_committed() {
        let path = tmp_path("rollback.wal");
        let kept = camera_created("kept");
        let written = camera_created("written but not synced");
        let buffered = camera_created("still buffered");
        let after = camera_created("after rollback");

        let mut wal = Wal::open(&path).unwrap();
        wal.append(&kept).unwrap();
        wal.append_buffered(&written).unwrap();
        wal.writer.flush().unwrap();
        wal.append_buffered(&buffered).unwrap();
        assert_eq!(wal.appends_since_compact(), 3);

        wal.rollback().unwrap();
        assert_eq!(wal.appends_since_compact(), 1);
        assert_eq!(Wal::replay(&path).unwrap(), vec![kept.clone()]);

        wal.append(&after).unwrap();
        drop(wal);
        assert_eq!(Wal::replay(&path).unwrap(), vec![kept, after]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn rollback_after_compaction_keeps_compacted_file() {
        let path = tmp_path("rollback_compact.wal");
        let camera = camera_created("compacted");
        let dropped = camera_created("dropped");

        let mut wal = Wal::open(&path).unwrap();
        wal.append(&camera).unwrap();
        wal.append(&camera_created("superseded")).unwrap();
        wal.compact(std::slice::from_ref(&camera)).unwrap();
        wal.append_buffered(&dropped).unwrap();
        wal.writer.flush().unwrap();
        wal.rollback().unwrap();
        drop(wal);

        assert_eq!(Wal::replay(&path).unwrap(), vec![camera]);
        let _ = fs::remove_file(&path);
    }
}
