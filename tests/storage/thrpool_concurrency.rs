// ==============================================
// THREAD-POOL QUEUE CONCURRENCY TESTS (integration)
// ==============================================
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use thrpool::{BlockCommand, Completion, MemoryDevice, QueueConfig, Request, ThreadPoolConfig, ThreadPoolQueue};

use crate::common::fixtures::{LBA_NBYTES, counted_read, memory_queue, poke_until_some};
use crate::common::logger::init_test_logger;

#[test]
fn concurrent_submitters_lose_nothing() {
    let queue = Arc::new(memory_queue(16, 4, 64));
    let counter = Arc::new(AtomicUsize::new(0));
    let num_threads = 4;
    let per_thread = 250;

    let handles: Vec<_> = (0..num_threads)
        .map(|thread_id| {
            let queue = Arc::clone(&queue);
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                for i in 0..per_thread {
                    let mut request = counted_read(((thread_id * per_thread + i) % 64) as u64, &counter);
                    loop {
                        match queue.submit(request) {
                            Ok(()) => break,
                            Err(err) => {
                                assert!(err.is_busy());
                                request = err.into_request();
                                let _ = queue.poke(0);
                                thread::yield_now();
                            }
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_ok!(queue.wait());

    assert_eq!(counter.load(Ordering::SeqCst), num_threads * per_thread);
    assert_eq!(queue.outstanding(), 0);
    let stats = queue.stats();
    assert_eq!(stats.submitted, (num_threads * per_thread) as u64);
    assert_eq!(stats.completed, stats.submitted);
}

#[test]
fn small_pokes_then_wait_account_for_everything() {
    let queue = memory_queue(32, 4, 64);
    let counter = Arc::new(AtomicUsize::new(0));
    for slba in 0..32 {
        assert_ok!(queue.submit(counted_read(slba, &counter)));
    }

    let mut total = 0;
    for _ in 0..5 {
        total += poke_until_some(&queue, 2);
    }
    total += assert_ok!(queue.wait());

    assert_eq!(total, 32);
    assert_eq!(counter.load(Ordering::SeqCst), 32);
}

#[test]
fn single_worker_completes_in_submission_order() {
    let queue = memory_queue(16, 1, 16);
    let order = Arc::new(Mutex::new(Vec::new()));

    for slba in 0..16u64 {
        let order = Arc::clone(&order);
        let request = Request::new(
            BlockCommand::read(slba, 0),
            vec![0u8; LBA_NBYTES],
            move |cpl: Completion<BlockCommand>| order.lock().push(cpl.command.slba),
        );
        assert_ok!(queue.submit(request));
    }
    assert_eq!(assert_ok!(queue.wait()), 16);

    assert_eq!(*order.lock(), (0..16).collect::<Vec<_>>());
}

#[test]
fn callbacks_may_resubmit() {
    let queue = Arc::new(memory_queue(2, 2, 8));
    let counter = Arc::new(AtomicUsize::new(0));

    fn chained(queue: Arc<ThreadPoolQueue<MemoryDevice>>, counter: Arc<AtomicUsize>, remaining: u32) -> Request<BlockCommand> {
        Request::new(BlockCommand::read(0, 0), vec![0u8; LBA_NBYTES], move |cpl: Completion<BlockCommand>| {
            assert!(cpl.is_ok());
            counter.fetch_add(1, Ordering::SeqCst);
            if remaining > 0 {
                let next = chained(Arc::clone(&queue), Arc::clone(&counter), remaining - 1);
                queue.submit(next).expect("resubmit from callback");
            }
        })
    }

    assert_ok!(queue.submit(chained(Arc::clone(&queue), Arc::clone(&counter), 9)));
    assert_ok!(queue.wait());
    assert_eq!(counter.load(Ordering::SeqCst), 10);
    assert_eq!(queue.outstanding(), 0);
}

#[test]
fn slow_device_overlaps_commands() {
    init_test_logger();
    let device = Arc::new(MemoryDevice::new(16, LBA_NBYTES).with_latency(Duration::from_millis(20)));
    let pool = ThreadPoolConfig::new(8).unwrap();
    let queue = ThreadPoolQueue::new(Arc::clone(&device), QueueConfig::new(8, pool)).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    let started = std::time::Instant::now();
    for slba in 0..8 {
        // Submission never waits on the device.
        assert_ok!(queue.submit(counted_read(slba, &counter)));
    }
    assert!(started.elapsed() < Duration::from_millis(20 * 8));

    assert_eq!(assert_ok!(queue.wait()), 8);
    assert_eq!(device.commands_executed(), 8);
    assert_eq!(counter.load(Ordering::SeqCst), 8);
}

#[test]
fn wait_sees_callbacks_drained_by_another_thread() {
    let queue = Arc::new(memory_queue(2, 1, 8));
    let started = Arc::new(AtomicBool::new(false));
    let finished = Arc::new(AtomicBool::new(false));
    let (started_cb, finished_cb) = (Arc::clone(&started), Arc::clone(&finished));

    assert_ok!(queue.submit(Request::new(
        BlockCommand::read(0, 0),
        vec![0u8; LBA_NBYTES],
        move |_: Completion<BlockCommand>| {
            started_cb.store(true, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(300));
            finished_cb.store(true, Ordering::SeqCst);
        },
    )));

    let poker = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || poke_until_some(&queue, 0))
    };
    while !started.load(Ordering::SeqCst) {
        thread::yield_now();
    }

    // The other thread owns the completion; wait must not return before it is done.
    assert_ok!(queue.wait());
    assert!(finished.load(Ordering::SeqCst));
    assert_eq!(queue.outstanding(), 0);
    assert_eq!(poker.join().unwrap(), 1);
}

#[test]
fn panicking_callback_leaves_queue_usable() {
    let queue = memory_queue(4, 1, 8);
    let counter = Arc::new(AtomicUsize::new(0));

    assert_ok!(queue.submit(Request::new(
        BlockCommand::read(0, 0),
        vec![0u8; LBA_NBYTES],
        |_: Completion<BlockCommand>| panic!("callback failed"),
    )));
    assert_ok!(queue.submit(counted_read(1, &counter)));
    assert_ok!(queue.submit(counted_read(2, &counter)));

    let first = panic::catch_unwind(AssertUnwindSafe(|| queue.wait()));
    assert!(first.is_err());

    assert_ok!(queue.wait());
    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert_eq!(queue.outstanding(), 0);
    assert_eq!(queue.stats().completed, 3);

    // Slots freed by the panicking batch are reusable.
    for slba in 0..4 {
        assert_ok!(queue.submit(counted_read(slba, &counter)));
    }
    assert_eq!(assert_ok!(queue.wait()), 4);
}
