//! Message queue demo
//!
//! Several producers write into their own queues; one consumer multiplexes
//! all of them with `poll` until every producer has closed.
//!
//! Environment: `MSGQUEUE_CAPACITY`, `MSGQUEUE_HINT`, `RUST_LOG`.

use msgqueue::{poll, Handle, PollEntry, PollEvents, QueueConfig, QueueError, QueueFlags};

const PRODUCERS: usize = 3;
const MESSAGES_PER_PRODUCER: usize = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = QueueConfig::from_env()?;

    let mut readers = Vec::with_capacity(PRODUCERS);
    let mut producer_tasks = Vec::with_capacity(PRODUCERS);

    for id in 0..PRODUCERS {
        let queue_config = config
            .clone()
            .with_flags(QueueFlags::WRITER)
            .with_debug_hint(&format!("{}-{id}", config.debug_hint));
        let writer = Handle::create_with(&queue_config)?;
        readers.push(writer.open(QueueFlags::READER)?);

        producer_tasks.push(tokio::task::spawn_blocking(move || produce(id, writer)));
    }

    let consumer_task = tokio::task::spawn_blocking(move || consume(readers));

    for task in producer_tasks {
        task.await??;
    }
    let received = consumer_task.await??;

    println!("All producers closed, {received} messages received");
    Ok(())
}

fn produce(id: usize, mut writer: Handle) -> Result<(), QueueError> {
    for seq in 0..MESSAGES_PER_PRODUCER {
        let message = format!("producer {id}: message {seq}");
        writer.write(message.as_bytes())?;
    }
    writer.close()
}

fn consume(mut readers: Vec<Handle>) -> Result<usize, QueueError> {
    let mut buf = vec![0u8; 256];
    let mut received = 0;

    while readers.iter().any(|reader| !reader.is_null()) {
        let ready: Vec<usize> = {
            let mut entries: Vec<PollEntry<'_>> = readers
                .iter()
                .map(|reader| PollEntry::new(reader, PollEvents::READABLE))
                .collect();
            poll(&mut entries)?;
            entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.is_ready())
                .map(|(i, _)| i)
                .collect()
        };

        for i in ready {
            match readers[i].read(&mut buf) {
                Ok(0) => {
                    println!("(queue {i}) EOF");
                    readers[i].close()?;
                }
                Ok(n) => {
                    received += 1;
                    println!("(queue {i}): {}", String::from_utf8_lossy(&buf[..n]));
                }
                Err(QueueError::MessageTooLarge { size, .. }) => {
                    buf.resize(size, 0);
                }
                Err(e) => return Err(e),
            }
        }
    }

    Ok(received)
}
