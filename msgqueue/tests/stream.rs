use embedded_io::{Read, Write};
use msgqueue::{Handle, QueueError, QueueFlags, QueueReader, QueueWriter};

fn adapters(capacity: usize) -> (QueueWriter, QueueReader) {
    let writer = Handle::create(capacity, QueueFlags::WRITER).unwrap();
    let reader = writer.open(QueueFlags::READER).unwrap();
    (
        QueueWriter::new(writer).unwrap(),
        QueueReader::new(reader).unwrap(),
    )
}

#[test]
fn test_write_read_through_traits() {
    let (mut writer, mut reader) = adapters(64);

    assert_eq!(writer.write(b"Hello").unwrap(), 5);
    writer.flush().unwrap();

    let mut buf = [0u8; 10];
    let n = reader.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"Hello");
}

#[test]
fn test_write_all_sends_one_message() {
    let (mut writer, mut reader) = adapters(64);

    writer.write_all(b"whole").unwrap();

    let mut buf = [0u8; 10];
    assert_eq!(reader.read(&mut buf).unwrap(), 5);
    assert_eq!(reader.handle().stats().unwrap().used, 0);
}

#[test]
fn test_empty_write_is_noop() {
    let (mut writer, reader) = adapters(64);

    assert_eq!(writer.write(b"").unwrap(), 0);
    assert_eq!(reader.handle().stats().unwrap().used, 0);
}

#[test]
fn test_end_of_stream_is_zero() {
    let (writer, mut reader) = adapters(64);
    drop(writer);

    let mut buf = [0u8; 4];
    assert_eq!(reader.read(&mut buf).unwrap(), 0);
}

#[test]
fn test_broken_pipe_kind() {
    let (mut writer, reader) = adapters(64);
    drop(reader);

    let err = writer.write(b"x").unwrap_err();
    assert!(matches!(err, QueueError::BrokenPipe));
    assert_eq!(
        embedded_io::Error::kind(&err),
        embedded_io::ErrorKind::BrokenPipe
    );
}

#[test]
fn test_adapters_check_capabilities() {
    let writer = Handle::create(64, QueueFlags::WRITER).unwrap();
    let reader = writer.open(QueueFlags::READER).unwrap();

    assert!(matches!(QueueReader::new(writer), Err(QueueError::BadHandle)));
    assert!(matches!(QueueWriter::new(reader), Err(QueueError::BadHandle)));
    assert!(matches!(QueueReader::new(Handle::null()), Err(QueueError::BadHandle)));
}

#[test]
fn test_into_inner_returns_handle() {
    let (writer, reader) = adapters(64);
    let reader = reader.into_inner();
    let writer = writer.into_inner();

    writer.write(b"raw").unwrap();
    let mut buf = [0u8; 4];
    assert_eq!(reader.read(&mut buf).unwrap(), 3);
}
