mod common;

#[cfg(test)]
mod tests {
    use super::common::init_test_logging;
    use futures::executor::block_on;
    use promise_future::{
        all, of_error, of_value, race, Error, ErrorInfo, Future, FutureState, ManualQueue,
        MutableFuture, Promise, SerialQueue,
    };
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::{thread, time::Duration};

    fn device_error() -> ErrorInfo {
        ErrorInfo::new("com.example.device", 42, "device went away")
    }

    #[test]
    fn test_success_chain() {
        init_test_logging();
        let queue = ManualQueue::new();
        let out = of_value(3).map(&queue, |x| x + 1);
        queue.run_until_idle();
        assert_eq!(out.result(), Some(4));
    }

    #[test]
    fn test_error_short_circuit() {
        init_test_logging();
        let queue = ManualQueue::new();
        let mapped = Arc::new(AtomicBool::new(false));
        let m = mapped.clone();
        let out = of_value(3)
            .fmap(&queue, |_| of_error::<i32>(device_error()))
            .map(&queue, move |_| -> i32 {
                m.store(true, Ordering::SeqCst);
                panic!("map must not run after an error")
            });
        queue.run_until_idle();
        assert_eq!(out.state(), FutureState::CompletedWithError);
        assert_eq!(out.error(), Some(device_error()));
        assert!(!mapped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_cancellation_propagation() {
        init_test_logging();
        let queue = ManualQueue::new();
        let ran = Arc::new(AtomicBool::new(false));
        let r = ran.clone();
        let mf = MutableFuture::<i32>::new();
        let out = mf.fmap(&queue, move |x| {
            r.store(true, Ordering::SeqCst);
            of_value(x + 1)
        });
        mf.cancel();
        queue.run_until_idle();
        assert_eq!(out.state(), FutureState::CompletedWithCancellation);
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_race() {
        init_test_logging();
        let mf_a = MutableFuture::new();
        let mf_b = MutableFuture::new();
        let r = race([mf_a.future(), mf_b.future()]);
        mf_a.resolve(1);
        assert_eq!(r.result(), Some(1));
        assert_eq!(mf_b.state(), FutureState::CompletedWithCancellation);
    }

    #[test]
    fn test_all_fan_in() {
        init_test_logging();
        let out = all([of_value("a"), of_value("b"), of_value("c")]);
        assert_eq!(out.result(), Some(vec!["a", "b", "c"]));
    }

    #[test]
    fn test_all_with_late_producer() {
        init_test_logging();
        let mf1 = MutableFuture::new();
        let mf2 = MutableFuture::new();
        let a = all([mf1.future(), mf2.future()]);
        mf2.resolve(20);
        assert_eq!(a.state(), FutureState::Running);
        mf1.resolve(10);
        assert_eq!(a.result(), Some(vec![10, 20]));
    }

    #[test]
    fn test_pipeline_on_serial_queue() {
        init_test_logging();
        let queue = SerialQueue::new("pipeline").unwrap();
        let (producer, consumer) = MutableFuture::<u32>::pair();
        let out = consumer
            .map(&queue, |x| x * 2)
            .fmap(&queue, |x| of_value(x.to_string()))
            .chain(&queue, |f| match f.result() {
                Some(s) => of_value(format!("<{s}>")),
                None => Future::cancelled(),
            });

        let task = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.resolve(21);
        });
        assert_eq!(block_on(out), Ok("<42>".to_owned()));
        task.join().expect("The producer thread has panicked");
    }

    #[test]
    fn test_handlers_run_on_their_queue() {
        init_test_logging();
        let queue = SerialQueue::new("notify-queue").unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        let mf = MutableFuture::<u8>::new();
        let tx2 = tx.clone();
        mf.on_completion(&queue, move |f| {
            let name = thread::current().name().map(str::to_owned);
            tx.send((f.state(), name)).unwrap();
        })
        .on_cancellation(&queue, move |_| {
            tx2.send((FutureState::Running, None)).unwrap();
        });
        mf.resolve(1);

        let (state, name) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(state, FutureState::CompletedWithResult);
        assert_eq!(name.as_deref(), Some("notify-queue"));
        // the cancellation handler was dropped unfired, closing the channel
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_await_cancelled_future() {
        init_test_logging();
        let mf = MutableFuture::<u8>::new();
        let reader = mf.future();
        let task = thread::spawn(move || block_on(reader));
        thread::sleep(Duration::from_millis(20));
        mf.cancel();
        assert_eq!(task.join().expect("The waiter thread has panicked"), Err(Error::Cancelled));
    }

    #[test]
    fn test_concurrent_producers_single_winner() {
        init_test_logging();
        for _ in 0..50 {
            let mf = MutableFuture::<usize>::new();
            let handles: Vec<_> = (0..4)
                .map(|i| {
                    let mf = mf.clone();
                    thread::spawn(move || {
                        if i == 3 {
                            mf.cancel();
                        } else {
                            mf.resolve(i);
                        }
                    })
                })
                .collect();
            for h in handles {
                h.join().expect("producer thread panicked");
            }
            let state = mf.state();
            assert!(state.is_terminal());
            // the observed outcome never changes afterwards
            assert_eq!(mf.state(), state);
        }
    }

    #[test]
    fn test_concurrent_race_single_winner() {
        init_test_logging();
        for _ in 0..50 {
            let inputs = [MutableFuture::<usize>::new(), MutableFuture::new()];
            let winner = race(inputs.iter().map(|mf| mf.future()));
            let start = Arc::new(std::sync::Barrier::new(inputs.len()));
            let handles: Vec<_> = inputs
                .iter()
                .cloned()
                .enumerate()
                .map(|(i, mf)| {
                    let start = start.clone();
                    thread::spawn(move || {
                        start.wait();
                        mf.resolve(i);
                    })
                })
                .collect();
            for h in handles {
                h.join().expect("producer thread panicked");
            }

            let value = winner.result().expect("race must settle with a value");
            assert_eq!(inputs[value].result(), Some(value));
            // the loser either finished first or was cancelled by the race
            let loser = &inputs[1 - value];
            assert!(loser.has_completed());
            assert_ne!(loser.state(), FutureState::CompletedWithError);
            assert_eq!(winner.result(), Some(value));
        }
    }
}
