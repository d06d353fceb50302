use coronet::Buffer;

fn check_invariants(buffer: &Buffer) {
    assert_eq!(
        buffer.readable() + buffer.writable() + buffer.prependable(),
        buffer.capacity(),
        "regions must partition the backing storage"
    );
}

fn pipe() -> (i32, i32) {
    let mut fds = [0i32; 2];
    let res = unsafe { libc::pipe(fds.as_mut_ptr()) };
    assert_eq!(res, 0, "pipe() failed");
    (fds[0], fds[1])
}

fn write_pipe(fd: i32, data: &[u8]) {
    let n = unsafe { libc::write(fd, data.as_ptr() as *const _, data.len()) };
    assert_eq!(n, data.len() as isize, "short write into pipe");
}

fn set_nonblocking(fd: i32) {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
    }
}

#[test]
fn starts_empty_with_head_reserve() {
    let buffer = Buffer::new();
    assert_eq!(buffer.readable(), 0);
    assert_eq!(buffer.prependable(), 8);
    check_invariants(&buffer);
}

#[test]
fn append_then_retrieve_all_round_trips() {
    let mut buffer = Buffer::new();
    buffer.append(b"hello, buffer");
    assert_eq!(buffer.readable(), 13);
    check_invariants(&buffer);

    assert_eq!(buffer.retrieve_all_as_string(), "hello, buffer");
    assert_eq!(buffer.readable(), 0);
    assert_eq!(buffer.prependable(), 8);
}

#[test]
fn retrieve_advances_to_the_suffix() {
    let mut buffer = Buffer::new();
    buffer.append(b"abcdefgh");
    buffer.retrieve(3);
    assert_eq!(buffer.peek(), b"defgh");
    check_invariants(&buffer);
}

#[test]
fn retrieve_past_readable_resets_cursors() {
    let mut buffer = Buffer::new();
    buffer.append(b"abc");
    buffer.retrieve(1000);
    assert_eq!(buffer.readable(), 0);
    assert_eq!(buffer.prependable(), 8);
}

#[test]
fn retrieve_as_string_clamps_to_readable() {
    let mut buffer = Buffer::new();
    buffer.append(b"ping\npong\n");
    assert_eq!(buffer.retrieve_as_string(5), "ping\n");
    assert_eq!(buffer.retrieve_as_string(100), "pong\n");
    assert_eq!(buffer.readable(), 0);
}

#[test]
fn invariants_hold_across_mixed_operations() {
    let mut buffer = Buffer::with_capacity(32);
    for round in 0..50usize {
        let chunk = vec![round as u8; round % 17 + 1];
        buffer.append(&chunk);
        check_invariants(&buffer);
        buffer.retrieve(round % 7);
        check_invariants(&buffer);
    }
    buffer.retrieve_all();
    check_invariants(&buffer);
    assert_eq!(buffer.readable(), 0);
}

#[test]
fn append_beyond_capacity_grows() {
    let mut buffer = Buffer::with_capacity(16);
    let payload: Vec<u8> = (0..100).collect();
    buffer.append(&payload);
    assert_eq!(buffer.peek(), payload.as_slice());
    check_invariants(&buffer);
}

#[test]
fn append_compacts_when_slack_suffices() {
    let mut buffer = Buffer::with_capacity(64);
    let capacity = buffer.capacity();

    let first: Vec<u8> = (0..48).collect();
    buffer.append(&first);
    buffer.retrieve(40);

    let second: Vec<u8> = (100..150).collect();
    buffer.append(&second);

    // Readable bytes moved back onto the reserve instead of reallocating.
    assert_eq!(buffer.capacity(), capacity);
    assert_eq!(buffer.prependable(), 8);

    let mut expected: Vec<u8> = (40..48).collect();
    expected.extend(100..150);
    assert_eq!(buffer.peek(), expected.as_slice());
    check_invariants(&buffer);
}

#[test]
fn read_fd_overflows_into_spill_and_grows() {
    let (rfd, wfd) = pipe();
    let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    write_pipe(wfd, &payload);

    // Tiny writable window: everything past it must come through the spill.
    let mut buffer = Buffer::with_capacity(16);
    let n = buffer.read_fd(rfd).expect("read_fd");
    assert_eq!(n, payload.len(), "one call must deliver all pending bytes");
    assert_eq!(buffer.peek(), payload.as_slice());
    check_invariants(&buffer);

    unsafe {
        libc::close(rfd);
        libc::close(wfd);
    }
}

#[test]
fn read_fd_reports_would_block_without_moving_indices() {
    let (rfd, wfd) = pipe();
    set_nonblocking(rfd);

    let mut buffer = Buffer::new();
    buffer.append(b"already here");
    let readable = buffer.readable();
    let writable = buffer.writable();

    let err = buffer.read_fd(rfd).expect_err("empty pipe must not read");
    assert_eq!(err.kind(), std::io::ErrorKind::WouldBlock);
    assert_eq!(buffer.readable(), readable);
    assert_eq!(buffer.writable(), writable);

    unsafe {
        libc::close(rfd);
        libc::close(wfd);
    }
}

#[test]
fn read_fd_returns_zero_at_eof() {
    let (rfd, wfd) = pipe();
    unsafe { libc::close(wfd) };

    let mut buffer = Buffer::new();
    assert_eq!(buffer.read_fd(rfd).expect("read_fd"), 0);

    unsafe { libc::close(rfd) };
}

#[test]
fn write_fd_drains_the_readable_region() {
    let (rfd, wfd) = pipe();

    let mut buffer = Buffer::new();
    buffer.append(b"drain me");
    let n = buffer.write_fd(wfd).expect("write_fd");
    assert_eq!(n, 8);
    assert_eq!(buffer.readable(), 0);

    let mut out = [0u8; 8];
    let read = unsafe { libc::read(rfd, out.as_mut_ptr() as *mut _, out.len()) };
    assert_eq!(read, 8);
    assert_eq!(&out, b"drain me");

    unsafe {
        libc::close(rfd);
        libc::close(wfd);
    }
}
