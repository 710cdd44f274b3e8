//! FileSource dispatch against files on disk.

use std::io::Write;

use pitch_slices::{Error, FileSource, ObservationSource};
use pretty_assertions::assert_eq;

#[test]
fn text_file_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cadence.pcs");
    std::fs::write(&path, "0 4 7\n5 9 0\n7 11 2\n0 4 7\n").unwrap();

    let obs = FileSource.parse(&path).unwrap();

    assert_eq!(obs.slice_count(), 4);
    assert_eq!(obs.len(), 12);
}

#[test]
fn midi_file_by_extension() {
    let mut track = vec![0x00, 0x90, 69, 100, 0x83, 0x60, 0x80, 69, 0];
    track.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"MThd");
    bytes.extend_from_slice(&6u32.to_be_bytes());
    bytes.extend_from_slice(&0u16.to_be_bytes());
    bytes.extend_from_slice(&1u16.to_be_bytes());
    bytes.extend_from_slice(&96u16.to_be_bytes());
    bytes.extend_from_slice(b"MTrk");
    bytes.extend_from_slice(&(track.len() as u32).to_be_bytes());
    bytes.extend_from_slice(&track);

    let mut file = tempfile::Builder::new().suffix(".MID").tempfile().unwrap();
    file.write_all(&bytes).unwrap();

    let obs = FileSource.parse(file.path()).unwrap();

    assert_eq!(obs.pitch_classes(), &[9]);
}

#[test]
fn unknown_extension_is_unsupported() {
    let file = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
    assert!(matches!(
        FileSource.parse(file.path()),
        Err(Error::UnsupportedFormat(_))
    ));
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = FileSource.parse(&dir.path().join("absent.mid"));
    assert!(matches!(result, Err(Error::Io { .. })));
}
