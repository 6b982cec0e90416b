use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::ffi::c_void;
use std::rc::Rc;
use std::thread;

use crate::*;

/// Each OS thread owns a separate runtime, so every test gets a clean one.
fn on_fresh_thread<F>(f: F)
where
    F: FnOnce() + Send + 'static,
{
    let _ = env_logger::builder().is_test(true).try_init();
    thread::Builder::new()
        .name("lwp-test".into())
        .spawn(f)
        .unwrap()
        .join()
        .unwrap();
}

fn small_stacks() {
    configure(
        LwpConfigBuilder::default()
            .stack_size(512 * 1024)
            .build()
            .unwrap(),
    );
}

fn drain() -> Vec<(Tid, ThreadStatus)> {
    std::iter::from_fn(wait).collect()
}

#[test]
fn test_gettid_before_start() {
    on_fresh_thread(|| {
        assert_eq!(gettid(), None);
        assert_eq!(wait(), None);
        assert_eq!(thread_count(), 0);
    });
}

#[test]
fn test_bootstrap_takes_next_id() {
    on_fresh_thread(|| {
        small_stacks();
        let a = spawn(|| 0).unwrap();
        let b = spawn(|| 0).unwrap();
        assert_eq!((a, b), (1, 2));

        start();
        assert_eq!(gettid(), Some(3));

        let me = tid2thread(3).unwrap();
        assert_eq!(me.state, ThreadState::Running);
        assert_eq!(me.status, ThreadStatus::Live);
        assert_eq!(me.stack_size, 0);

        let reaped = drain();
        assert_eq!(reaped.iter().map(|r| r.0).collect::<Vec<_>>(), [1, 2]);
    });
}

#[test]
fn test_round_robin_fairness() {
    on_fresh_thread(|| {
        small_stacks();
        let trace = Rc::new(RefCell::new(Vec::new()));
        let mut tids = Vec::new();
        for i in 0..4 {
            let trace = Rc::clone(&trace);
            let tid = spawn(move || {
                for _ in 0..3 {
                    trace.borrow_mut().push(gettid().unwrap());
                    yield_now();
                }
                10 + i
            })
            .unwrap();
            tids.push(tid);
        }

        start();
        let reaped = drain();

        let trace = trace.borrow();
        assert_eq!(trace.len(), 12);
        for round in trace.chunks(4) {
            assert_eq!(round, tids.as_slice());
        }
        let expected: Vec<_> = tids
            .iter()
            .zip(10..)
            .map(|(&tid, code)| (tid, ThreadStatus::Terminated(code)))
            .collect();
        assert_eq!(reaped, expected);
    });
}

#[test]
fn test_wait_drains_oldest_first() {
    on_fresh_thread(|| {
        small_stacks();
        let tids: Vec<_> = [3, 4, 5]
            .into_iter()
            .map(|code| spawn(move || code).unwrap())
            .collect();

        start();
        // all three ran to completion before control came back
        for &tid in &tids {
            assert_eq!(tid2thread(tid).unwrap().state, ThreadState::Zombie);
        }

        assert_eq!(wait(), Some((tids[0], ThreadStatus::Terminated(3))));
        assert_eq!(tid2thread(tids[0]), None);
        assert_eq!(wait(), Some((tids[1], ThreadStatus::Terminated(4))));
        assert_eq!(wait(), Some((tids[2], ThreadStatus::Terminated(5))));
        assert_eq!(wait(), None);
        assert_eq!(thread_count(), 1);
    });
}

#[test]
fn test_blocking_wait_is_woken_by_exit() {
    on_fresh_thread(|| {
        small_stacks();
        start();
        let main = gettid().unwrap();

        let finished = Rc::new(Cell::new(false));
        let seen_main = Rc::new(Cell::new(None));
        let b = {
            let finished = Rc::clone(&finished);
            let seen_main = Rc::clone(&seen_main);
            spawn(move || {
                for _ in 0..3 {
                    yield_now();
                }
                seen_main.set(tid2thread(main).map(|t| t.state));
                finished.set(true);
                exit(7)
            })
            .unwrap()
        };

        let (tid, status) = wait().unwrap();
        assert!(finished.get());
        assert_eq!(tid, b);
        assert_eq!(status, ThreadStatus::Terminated(7));
        assert_eq!(seen_main.get(), Some(ThreadState::Blocked));
        assert_eq!(tid2thread(main).unwrap().state, ThreadState::Running);
        with_scheduler(|s| assert_eq!(s.len(), 1));
    });
}

#[test]
fn test_last_thread_wait_returns_none() {
    on_fresh_thread(|| {
        start();
        assert_eq!(wait(), None);
        assert_eq!(gettid(), Some(1));
    });
}

#[test]
fn test_two_waiters_do_not_deadlock() {
    on_fresh_thread(|| {
        small_stacks();
        start();

        // Blocks until the main thread would be the only one left, then sees
        // nothing ready and gives up instead of blocking forever.
        let inner = Rc::new(Cell::new(None));
        let helper = {
            let inner = Rc::clone(&inner);
            spawn(move || {
                inner.set(Some(wait()));
                0
            })
            .unwrap()
        };

        assert_eq!(wait(), Some((helper, ThreadStatus::Terminated(0))));
        assert_eq!(inner.get(), Some(None));
    });
}

#[test]
fn test_handoff_goes_to_oldest_waiter() {
    on_fresh_thread(|| {
        small_stacks();
        let got = Rc::new(RefCell::new(Vec::new()));
        let w1 = {
            let got = Rc::clone(&got);
            spawn(move || {
                let reaped = wait();
                got.borrow_mut().push((gettid().unwrap(), reaped));
                0
            })
            .unwrap()
        };
        let w2 = {
            let got = Rc::clone(&got);
            spawn(move || {
                let reaped = wait();
                got.borrow_mut().push((gettid().unwrap(), reaped));
                0
            })
            .unwrap()
        };
        let e1 = spawn(|| {
            yield_now();
            21
        })
        .unwrap();
        let e2 = spawn(|| {
            yield_now();
            22
        })
        .unwrap();

        start();
        // w1 and w2 are now parked, e1 and e2 have not exited yet
        assert_eq!(tid2thread(w1).unwrap().state, ThreadState::Blocked);
        assert_eq!(tid2thread(w2).unwrap().state, ThreadState::Blocked);

        let mut reaped = drain();
        reaped.sort_unstable_by_key(|r| r.0);
        assert_eq!(
            reaped,
            [(w1, ThreadStatus::Terminated(0)), (w2, ThreadStatus::Terminated(0))]
        );
        assert_eq!(
            *got.borrow(),
            [
                (w1, Some((e1, ThreadStatus::Terminated(21)))),
                (w2, Some((e2, ThreadStatus::Terminated(22)))),
            ]
        );
    });
}

#[test]
fn test_ids_increase_and_are_never_reused() {
    on_fresh_thread(|| {
        small_stacks();
        start();
        let main = gettid().unwrap();

        let mut last = main;
        for round in 0..50 {
            let tid = spawn(move || round).unwrap();
            assert!(tid > last);
            assert_ne!(tid, NO_THREAD);
            assert_eq!(wait(), Some((tid, ThreadStatus::Terminated(round as u8))));
            assert_eq!(tid2thread(tid), None);
            last = tid;
        }
        assert_eq!(thread_count(), 1);
    });
}

#[test]
fn test_reaping_unmaps_the_stack() {
    on_fresh_thread(|| {
        small_stacks();
        let on_stack = Rc::new(Cell::new(0usize));
        let child = {
            let on_stack = Rc::clone(&on_stack);
            spawn(move || {
                let local = 0u8;
                on_stack.set(&local as *const u8 as usize);
                0
            })
            .unwrap()
        };

        start();
        let addr = on_stack.get();
        assert_ne!(addr, 0);
        assert_eq!(tid2thread(child).unwrap().state, ThreadState::Zombie);
        assert!(stack::is_mapped(addr));

        assert_eq!(wait(), Some((child, ThreadStatus::Terminated(0))));
        assert!(!stack::is_mapped(addr));
    });
}

#[test]
fn test_tid2thread_finds_scheduler_only_threads() {
    on_fresh_thread(|| {
        small_stacks();
        let pending = spawn(|| 0).unwrap();

        let info = tid2thread(pending).unwrap();
        assert_eq!(info.tid, pending);
        assert_eq!(info.state, ThreadState::Ready);
        assert!(info.stack_size >= 512 * 1024);
        assert_eq!(tid2thread(pending + 100), None);

        start();
        assert_eq!(drain().len(), 1);
        assert_eq!(tid2thread(pending), None);
    });
}

#[test]
fn test_create_with_raw_entry() {
    extern "C" fn bump(arg: *mut c_void) -> i32 {
        let cell = unsafe { &*(arg as *const Cell<i32>) };
        cell.set(cell.get() + 1);
        cell.get()
    }

    on_fresh_thread(|| {
        small_stacks();
        let counter = Box::new(Cell::new(40));
        let arg = &*counter as *const Cell<i32> as *mut c_void;
        let a = create(bump, arg).unwrap();
        let b = create(bump, arg).unwrap();

        start();
        assert_eq!(
            drain(),
            [(a, ThreadStatus::Terminated(41)), (b, ThreadStatus::Terminated(42))]
        );
        assert_eq!(counter.get(), 42);
    });
}

#[test]
fn test_exit_code_keeps_low_byte() {
    on_fresh_thread(|| {
        small_stacks();
        let tid = spawn(|| exit(0x1FF)).unwrap();
        start();
        assert_eq!(wait(), Some((tid, ThreadStatus::Terminated(0xFF))));
    });
}

#[test]
fn test_panicking_thread_exits_with_panic_code() {
    on_fresh_thread(|| {
        small_stacks();
        let tid = spawn(|| panic!("thread body failure")).unwrap();
        let ok = spawn(|| 1).unwrap();
        start();
        assert_eq!(
            drain(),
            [
                (tid, ThreadStatus::Terminated(PANIC_EXIT_CODE as u8)),
                (ok, ThreadStatus::Terminated(1)),
            ]
        );
    });
}

#[test]
fn test_start_twice_is_ignored() {
    on_fresh_thread(|| {
        start();
        start();
        assert_eq!(gettid(), Some(1));
        assert_eq!(thread_count(), 1);
    });
}

#[test]
fn test_floating_point_survives_switches() {
    on_fresh_thread(|| {
        small_stacks();
        let sums = Rc::new(RefCell::new(Vec::new()));
        for seed in 1..=3 {
            let sums = Rc::clone(&sums);
            spawn(move || {
                let mut acc = seed as f64;
                for _ in 0..5 {
                    acc = acc * 1.5 + 0.25;
                    yield_now();
                }
                sums.borrow_mut().push(acc);
                0
            })
            .unwrap();
        }
        start();
        drain();

        let expected: Vec<f64> = (1..=3)
            .map(|seed| (0..5).fold(seed as f64, |acc, _| acc * 1.5 + 0.25))
            .collect();
        assert_eq!(*sums.borrow(), expected);
    });
}

/// Pops from the back: the most recently admitted thread runs first.
struct Recording {
    pool: VecDeque<Tid>,
    admitted: Rc<RefCell<Vec<Tid>>>,
    initialized: Rc<Cell<bool>>,
}

impl Scheduler for Recording {
    fn init(&mut self) {
        self.pool.clear();
        self.initialized.set(true);
    }

    fn admit(&mut self, tid: Tid) {
        if !self.pool.contains(&tid) {
            self.pool.push_back(tid);
            self.admitted.borrow_mut().push(tid);
        }
    }

    fn remove(&mut self, tid: Tid) {
        self.pool.retain(|&t| t != tid);
    }

    fn next(&mut self) -> Option<Tid> {
        let tid = self.pool.pop_back()?;
        self.pool.push_front(tid);
        Some(tid)
    }

    fn len(&self) -> usize {
        self.pool.len()
    }
}

#[test]
fn test_set_scheduler_preserves_membership() {
    on_fresh_thread(|| {
        small_stacks();
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut tids = Vec::new();
        for _ in 0..3 {
            let order = Rc::clone(&order);
            tids.push(
                spawn(move || {
                    order.borrow_mut().push(gettid().unwrap());
                    0
                })
                .unwrap(),
            );
        }
        // a thread that never runs still gets migrated
        let admitted = Rc::new(RefCell::new(Vec::new()));
        let initialized = Rc::new(Cell::new(false));
        let old = set_scheduler(Some(Box::new(Recording {
            pool: VecDeque::new(),
            admitted: Rc::clone(&admitted),
            initialized: Rc::clone(&initialized),
        })));

        assert!(initialized.get());
        assert!(old.is_empty());
        assert_eq!(*admitted.borrow(), tids);
        with_scheduler(|s| assert_eq!(s.len(), 3));

        start();
        let main = gettid().unwrap();
        assert!(admitted.borrow().contains(&main));

        let mut reaped: Vec<_> = drain().into_iter().map(|r| r.0).collect();
        reaped.sort_unstable();
        assert_eq!(reaped, tids);

        // ran newest first
        let mut reversed = tids.clone();
        reversed.reverse();
        assert_eq!(*order.borrow(), reversed);

        let previous = set_scheduler(None);
        assert!(previous.is_empty());
        with_scheduler(|s| assert_eq!(s.len(), 1));
    });
}
