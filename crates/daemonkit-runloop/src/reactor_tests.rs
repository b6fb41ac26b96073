    use super::*;
    use std::cell::Cell;
    use std::io::{Read, Write};
    use std::os::fd::BorrowedFd;
    use std::os::unix::net::UnixStream;
    use std::time::Instant;

    struct StreamChannel {
        stream: UnixStream,
        interest: Interest,
        calls: Rc<Cell<u32>>,
        unregister_self: bool,
        unregister_other: Rc<Cell<Option<ChannelId>>>,
        fail: bool,
    }

    impl StreamChannel {
        fn new(stream: UnixStream, calls: &Rc<Cell<u32>>) -> Self {
            Self {
                stream,
                interest: Interest::Readable,
                calls: calls.clone(),
                unregister_self: false,
                unregister_other: Rc::new(Cell::new(None)),
                fail: false,
            }
        }
    }

    impl AsFd for StreamChannel {
        fn as_fd(&self) -> BorrowedFd<'_> {
            self.stream.as_fd()
        }
    }

    impl Channel for StreamChannel {
        fn interest(&self) -> Interest {
            self.interest
        }

        fn on_ready(&mut self, readiness: Readiness, ctx: &ChannelContext<'_>) -> HandlerResult {
            self.calls.set(self.calls.get() + 1);
            if readiness.readable {
                let mut buf = [0u8; 64];
                let _ = self.stream.read(&mut buf)?;
            }
            if self.fail {
                return Err("channel handler failed".into());
            }
            if self.unregister_self {
                assert!(ctx.unregister());
            }
            if let Some(other) = self.unregister_other.get() {
                ctx.reactor().unregister(other);
            }
            Ok(())
        }
    }

    fn ready_pair() -> (UnixStream, UnixStream) {
        let (mut writer, reader) = UnixStream::pair().unwrap();
        writer.write_all(b"x").unwrap();
        (writer, reader)
    }

    #[test]
    fn test_empty_reactor_is_idle() {
        let mut reactor = PollReactor::default();
        assert!(reactor.is_idle());
        assert_eq!(reactor.poll_once(Some(Duration::ZERO)).unwrap(), 0);
        assert_eq!(reactor.default_timeout(), DEFAULT_POLL_TIMEOUT);
    }

    #[test]
    fn test_pass_blocks_for_timeout() {
        let mut reactor = PollReactor::default();
        let start = Instant::now();
        reactor.poll_once(Some(Duration::from_millis(20))).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_readable_channel_fires_once_per_pass() {
        let calls = Rc::new(Cell::new(0));
        let (_writer, reader) = ready_pair();
        let mut reactor = PollReactor::default();
        reactor.handle().register(StreamChannel::new(reader, &calls));

        assert_eq!(reactor.poll_once(Some(Duration::from_millis(100))).unwrap(), 1);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_idle_channel_does_not_fire() {
        let calls = Rc::new(Cell::new(0));
        let (_writer, reader) = UnixStream::pair().unwrap();
        let mut reactor = PollReactor::default();
        reactor.handle().register(StreamChannel::new(reader, &calls));

        assert_eq!(reactor.poll_once(Some(Duration::ZERO)).unwrap(), 0);
        assert_eq!(calls.get(), 0);
        assert!(!reactor.is_idle());
    }

    #[test]
    fn test_writable_interest() {
        let calls = Rc::new(Cell::new(0));
        let (_peer, stream) = UnixStream::pair().unwrap();
        let mut channel = StreamChannel::new(stream, &calls);
        channel.interest = Interest::Writable;

        let mut reactor = PollReactor::default();
        reactor.handle().register(channel);

        assert_eq!(reactor.poll_once(Some(Duration::from_millis(100))).unwrap(), 1);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_channel_unregisters_itself() {
        let calls = Rc::new(Cell::new(0));
        let (_writer, reader) = ready_pair();
        let mut channel = StreamChannel::new(reader, &calls);
        channel.unregister_self = true;

        let mut reactor = PollReactor::default();
        let handle = reactor.handle();
        let id = handle.register(channel);
        assert!(handle.contains(id));

        reactor.poll_once(Some(Duration::from_millis(100))).unwrap();
        assert_eq!(calls.get(), 1);
        assert!(!handle.contains(id));
        assert!(reactor.is_idle());
    }

    #[test]
    fn test_channel_removed_mid_pass_is_skipped() {
        let first_calls = Rc::new(Cell::new(0));
        let second_calls = Rc::new(Cell::new(0));
        let (_w1, r1) = ready_pair();
        let (_w2, r2) = ready_pair();

        let first = StreamChannel::new(r1, &first_calls);
        let target = first.unregister_other.clone();

        let mut reactor = PollReactor::default();
        let handle = reactor.handle();
        handle.register(first);
        let second_id = handle.register(StreamChannel::new(r2, &second_calls));
        target.set(Some(second_id));

        assert_eq!(reactor.poll_once(Some(Duration::from_millis(100))).unwrap(), 1);
        assert_eq!(first_calls.get(), 1);
        assert_eq!(second_calls.get(), 0);
        assert_eq!(handle.len(), 1);
    }

    #[test]
    fn test_handler_error_propagates() {
        let calls = Rc::new(Cell::new(0));
        let (_writer, reader) = ready_pair();
        let mut channel = StreamChannel::new(reader, &calls);
        channel.fail = true;

        let mut reactor = PollReactor::default();
        reactor.handle().register(channel);

        let err = reactor
            .poll_once(Some(Duration::from_millis(100)))
            .unwrap_err();
        assert!(matches!(err, MainloopError::Handler(_)));
        assert!(err.to_string().contains("channel handler failed"));
    }

    #[test]
    fn test_unregister_unknown() {
        let handle = ReactorHandle::new();
        let calls = Rc::new(Cell::new(0));
        let (_peer, stream) = UnixStream::pair().unwrap();
        let id = handle.register(StreamChannel::new(stream, &calls));

        assert!(handle.unregister(id));
        assert!(!handle.unregister(id));
        assert!(handle.is_empty());
    }

    #[test]
    fn test_readiness_from_flags() {
        let readiness = Readiness::from(PollFlags::POLLIN | PollFlags::POLLHUP);
        assert!(readiness.readable);
        assert!(readiness.hangup);
        assert!(!readiness.writable);
        assert!(!readiness.error);

        let readiness = Readiness::from(PollFlags::POLLNVAL);
        assert!(readiness.error);
    }

    #[test]
    fn test_channel_id_display() {
        let handle = ReactorHandle::new();
        let calls = Rc::new(Cell::new(0));
        let (_peer, stream) = UnixStream::pair().unwrap();
        let id = handle.register(StreamChannel::new(stream, &calls));
        assert_eq!(id.to_string(), "channel#0");
    }
