use std::sync::Arc;
use std::thread;

use workq::Queue;

fn item(value: u64) -> [u8; 8] {
    value.to_le_bytes()
}

#[test]
fn sequential_reads_follow_write_order() {
    let queue = Queue::open(8).expect("open queue");
    queue.write(&item(1)).expect("write 1");
    queue.write(&item(2)).expect("write 2");
    queue.write(&item(3)).expect("write 3");

    let mut buf = [0u8; 8];
    let mut seen = Vec::new();
    while queue.read_one(&mut buf).expect("read") {
        seen.push(u64::from_le_bytes(buf));
    }
    assert_eq!(seen, vec![1, 2, 3]);
    assert!(!queue.read_one(&mut buf).expect("read after empty"));
}

#[test]
fn payload_bytes_round_trip_exactly() {
    let queue = Queue::open(32).expect("open queue");
    let payload: Vec<u8> = (0..32u8).map(|b| b.wrapping_mul(37)).collect();
    queue.write(&payload).expect("write");

    let mut out = [0u8; 32];
    assert!(queue.read_one(&mut out).expect("read"));
    assert_eq!(&out[..], &payload[..]);
}

#[test]
fn concurrent_writers_and_readers_conserve_items() {
    const WRITERS: u64 = 4;
    const PER_WRITER: u64 = 5_000;
    const READS: usize = 7_000;

    let queue = Queue::open(8).expect("open queue");

    let writers: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for seq in 0..PER_WRITER {
                    queue
                        .write(&item(writer * PER_WRITER + seq))
                        .expect("write");
                }
            })
        })
        .collect();

    let reader = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            let mut seen = Vec::with_capacity(READS);
            let mut buf = [0u8; 8];
            while seen.len() < READS {
                if queue.read_one(&mut buf).expect("read") {
                    seen.push(u64::from_le_bytes(buf));
                } else {
                    thread::yield_now();
                }
            }
            seen
        })
    };

    for handle in writers {
        handle.join().expect("writer join");
    }
    let mut seen = reader.join().expect("reader join");

    let total = (WRITERS * PER_WRITER) as usize;
    assert_eq!(queue.item_count(), total - READS);

    let rest = queue.drain_all().expect("drain").expect("snapshot");
    seen.extend(
        rest.iter()
            .map(|bytes| u64::from_le_bytes(bytes.try_into().expect("8 bytes"))),
    );
    seen.sort_unstable();
    let expected: Vec<u64> = (0..WRITERS * PER_WRITER).collect();
    assert_eq!(seen, expected);
}

#[test]
fn per_writer_order_is_preserved_under_contention() {
    let queue = Queue::open(16).expect("open queue");
    let writers: Vec<_> = (0..3u64)
        .map(|writer| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for seq in 0..1_000u64 {
                    let mut buf = [0u8; 16];
                    buf[..8].copy_from_slice(&writer.to_le_bytes());
                    buf[8..].copy_from_slice(&seq.to_le_bytes());
                    queue.write(&buf).expect("write");
                }
            })
        })
        .collect();
    for handle in writers {
        handle.join().expect("writer join");
    }

    let mut last = [None::<u64>; 3];
    let mut buf = [0u8; 16];
    while queue.read_one(&mut buf).expect("read") {
        let writer = u64::from_le_bytes(buf[..8].try_into().expect("writer")) as usize;
        let seq = u64::from_le_bytes(buf[8..].try_into().expect("seq"));
        if let Some(prev) = last[writer] {
            assert_eq!(seq, prev + 1);
        }
        last[writer] = Some(seq);
    }
    assert_eq!(last, [Some(999); 3]);
}
