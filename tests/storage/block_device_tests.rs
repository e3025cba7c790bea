use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;
use thrpool::{BlockCommand, Completion, FileDevice, QueueConfig, Request, ThreadPoolConfig, ThreadPoolQueue};

use crate::common::logger::init_test_logger;

const NBLOCKS: u64 = 256;
const LBA_NBYTES: usize = 512;
const MDTS_NLB: u16 = 8; // blocks per command

struct TestContext {
    _dir: TempDir,
    queue: ThreadPoolQueue<FileDevice>,
}

impl TestContext {
    fn new(capacity: u32, nthreads: usize) -> Self {
        init_test_logger();
        let dir = tempfile::tempdir().unwrap();
        let device = Arc::new(FileDevice::open(dir.path().join("nvme0n1.img"), NBLOCKS, LBA_NBYTES).unwrap());
        let pool = ThreadPoolConfig::new(nthreads).unwrap();
        let queue = ThreadPoolQueue::new(device, QueueConfig::new(capacity, pool)).unwrap();
        Self { _dir: dir, queue }
    }

    /// Submits one command, draining completions whenever the queue is full.
    fn submit(&self, mut request: Request<BlockCommand>) {
        loop {
            match self.queue.submit(request) {
                Ok(()) => return,
                Err(err) => {
                    assert!(err.is_busy(), "unexpected rejection: {}", err);
                    request = err.into_request();
                    self.queue.poke(0).ok();
                }
            }
        }
    }
}

/// Collects read results keyed by starting LBA.
type Reads = Arc<Mutex<Vec<(u64, Vec<u8>)>>>;

fn expect_ok(cpl: Completion<BlockCommand>) {
    assert!(cpl.is_ok(), "{:?} failed: {:?}", cpl.command, cpl.status);
}

#[test]
fn fill_range_then_verify() {
    let ctx = TestContext::new(8, 4);
    let chunk = MDTS_NLB as u64;

    for slba in (0..NBLOCKS).step_by(chunk as usize) {
        let wbuf = vec![b'!'; chunk as usize * LBA_NBYTES];
        ctx.submit(Request::new(BlockCommand::write(slba, MDTS_NLB - 1), wbuf, expect_ok));
    }
    assert_ok!(ctx.queue.wait());
    ctx.submit(Request::new(BlockCommand::flush(), Vec::new(), expect_ok));
    assert_ok!(ctx.queue.wait());

    let reads: Reads = Arc::new(Mutex::new(Vec::new()));
    for slba in (0..NBLOCKS).step_by(chunk as usize) {
        let reads = Arc::clone(&reads);
        ctx.submit(Request::new(
            BlockCommand::read(slba, MDTS_NLB - 1),
            vec![0u8; chunk as usize * LBA_NBYTES],
            move |cpl: Completion<BlockCommand>| {
                assert!(cpl.is_ok());
                reads.lock().push((cpl.command.slba, cpl.data));
            },
        ));
    }
    assert_ok!(ctx.queue.wait());

    let reads = reads.lock();
    assert_eq!(reads.len() as u64, NBLOCKS / chunk);
    assert!(reads.iter().all(|(_, data)| data.iter().all(|&b| b == b'!')));
}

#[test]
fn scattered_payload_reads_back() {
    let ctx = TestContext::new(4, 2);

    // One distinct block written every fourth LBA.
    let payload = |n: u64| -> Vec<u8> { (0..LBA_NBYTES).map(|i| (n as usize * 31 + i) as u8).collect() };
    for n in 0..MDTS_NLB as u64 {
        ctx.submit(Request::new(BlockCommand::write(n * 4, 0), payload(n), expect_ok));
    }
    assert_ok!(ctx.queue.wait());

    let reads: Reads = Arc::new(Mutex::new(Vec::new()));
    for n in 0..MDTS_NLB as u64 {
        let reads = Arc::clone(&reads);
        ctx.submit(Request::new(
            BlockCommand::read(n * 4, 0),
            vec![0u8; LBA_NBYTES],
            move |cpl: Completion<BlockCommand>| {
                assert!(cpl.is_ok());
                reads.lock().push((cpl.command.slba, cpl.data));
            },
        ));
    }
    assert_ok!(ctx.queue.wait());

    let mut reads = reads.lock().clone();
    reads.sort_by_key(|(slba, _)| *slba);
    for (n, (slba, data)) in reads.into_iter().enumerate() {
        assert_eq!(slba, n as u64 * 4);
        assert_eq!(data, payload(n as u64));
    }
}

#[test]
fn out_of_range_write_fails_through_callback() {
    let ctx = TestContext::new(2, 1);
    let status = Arc::new(Mutex::new(None));
    let status_cb = Arc::clone(&status);

    ctx.submit(Request::new(
        BlockCommand::write(NBLOCKS - 1, 1),
        vec![0u8; 2 * LBA_NBYTES],
        move |cpl: Completion<BlockCommand>| {
            *status_cb.lock() = Some(cpl.status_code());
        },
    ));
    assert_eq!(assert_ok!(ctx.queue.wait()), 1);

    let code = status.lock().expect("callback ran");
    assert!(code < 0);
    assert_eq!(ctx.queue.stats().device_errors, 1);
}
