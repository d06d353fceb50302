use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use coronet::{reactor::READABLE, Executor, Reactor};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn pipe() -> (i32, i32) {
    let mut fds = [0i32; 2];
    let res = unsafe { libc::pipe(fds.as_mut_ptr()) };
    assert_eq!(res, 0, "pipe() failed");
    for fd in fds {
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFL);
            libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
        }
    }
    (fds[0], fds[1])
}

fn start() -> (Arc<Executor>, Arc<Reactor>, thread::JoinHandle<coronet::Result<()>>) {
    init_logs();
    let executor = Arc::new(Executor::with_threads(2));
    let reactor = Arc::new(Reactor::new(executor.clone()).expect("reactor"));
    let driver = reactor.clone();
    let loop_thread = thread::spawn(move || driver.run());
    (executor, reactor, loop_thread)
}

#[test]
fn readiness_wakes_the_waiting_task_on_a_worker() {
    let (_executor, reactor, loop_thread) = start();
    let reactor_thread = loop_thread.thread().id();

    let (rfd, wfd) = pipe();
    reactor.register_fd(rfd, READABLE).expect("register");

    let (tx, rx) = mpsc::channel();
    let inner = reactor.clone();
    reactor.spawn(async move {
        inner.await_fd(rfd, READABLE).await.expect("await_fd");
        let mut byte = 0u8;
        let n = unsafe { libc::read(rfd, &mut byte as *mut u8 as *mut _, 1) };
        assert_eq!(n, 1);
        tx.send((byte, thread::current().id())).unwrap();
    });

    // Let the task reach its suspension point before making the fd ready.
    thread::sleep(Duration::from_millis(50));
    let n = unsafe { libc::write(wfd, b"x".as_ptr() as *const _, 1) };
    assert_eq!(n, 1);

    let (byte, resumed_on) = rx.recv_timeout(Duration::from_secs(1)).expect("woken");
    assert_eq!(byte, b'x');
    assert_ne!(resumed_on, reactor_thread, "tasks never run on the reactor thread");
    assert_ne!(resumed_on, thread::current().id());

    reactor.unregister_fd(rfd);
    unsafe {
        libc::close(rfd);
        libc::close(wfd);
    }
    reactor.stop();
    loop_thread.join().unwrap().expect("reactor loop");
}

#[test]
fn waiter_is_resumed_at_most_once_per_registration() {
    let (_executor, reactor, loop_thread) = start();

    let (rfd, wfd) = pipe();
    reactor.register_fd(rfd, READABLE).expect("register");

    let wakes = Arc::new(AtomicUsize::new(0));
    let counted = wakes.clone();
    let (tx, rx) = mpsc::channel();
    let inner = reactor.clone();
    reactor.spawn(async move {
        inner.await_fd(rfd, READABLE).await.expect("await_fd");
        counted.fetch_add(1, Ordering::SeqCst);
        let mut byte = 0u8;
        unsafe { libc::read(rfd, &mut byte as *mut u8 as *mut _, 1) };
        tx.send(()).unwrap();
    });

    thread::sleep(Duration::from_millis(50));
    unsafe { libc::write(wfd, b"a".as_ptr() as *const _, 1) };
    rx.recv_timeout(Duration::from_secs(1)).expect("first wake");

    // The task did not re-register; further readiness must be dropped.
    unsafe { libc::write(wfd, b"b".as_ptr() as *const _, 1) };
    thread::sleep(Duration::from_millis(100));
    assert_eq!(wakes.load(Ordering::SeqCst), 1);
    assert_eq!(reactor.pending_waiters(), 0);

    reactor.unregister_fd(rfd);
    unsafe {
        libc::close(rfd);
        libc::close(wfd);
    }
    reactor.stop();
    loop_thread.join().unwrap().expect("reactor loop");
}

fn wait_until_running(reactor: &Reactor) {
    while !reactor.is_running() {
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn stop_ends_the_event_loop_and_the_executor() {
    let (executor, reactor, loop_thread) = start();

    wait_until_running(&reactor);
    reactor.stop();

    loop_thread.join().unwrap().expect("reactor loop");
    assert!(!reactor.is_running());
    assert!(!executor.is_running());
    assert_eq!(executor.worker_count(), 0);
}

#[test]
fn running_twice_is_rejected() {
    let (_executor, reactor, loop_thread) = start();
    wait_until_running(&reactor);

    let err = reactor.run().expect_err("loop is already running");
    assert!(matches!(err, coronet::Error::InvalidUsage(_)));

    reactor.stop();
    loop_thread.join().unwrap().expect("reactor loop");
}
