use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
        mpsc,
    },
    thread,
    time::Duration,
};

use rtos2::{
    Error, EventFlagsAttr, FlagsOptions, MSG_SIZE, MessageQueueAttr, MutexAttr, MutexAttrBits,
    SemaphoreAttr, ThreadAttr, TimerAttr, TimerType, WAIT_FOREVER,
};

mod common;

use common::*;

#[test]
fn semaphore_counts_up_to_its_maximum() {
    let kernel = running_ucos3();
    let sem = kernel
        .semaphore_try_new(
            2,
            1,
            SemaphoreAttr {
                name: Some("pool"),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(kernel.semaphore_name(&sem), Some("pool"));
    assert_eq!(kernel.semaphore_count(&sem), 1);

    kernel.semaphore_release(&sem).unwrap();
    assert_eq!(kernel.semaphore_release(&sem), Err(Error::Resource));
    assert_eq!(kernel.semaphore_count(&sem), 2);

    kernel.semaphore_acquire(&sem, 0).unwrap();
    kernel.semaphore_acquire(&sem, 0).unwrap();
    assert_eq!(kernel.semaphore_acquire(&sem, 0), Err(Error::Resource));
    assert_eq!(kernel.semaphore_acquire(&sem, 5), Err(Error::Timeout));
}

#[test]
fn semaphore_creation_is_validated() {
    let kernel = running_ucos3();
    assert!(kernel.semaphore_new(0, 0, SemaphoreAttr::default()).is_none());
    assert_eq!(
        kernel
            .semaphore_try_new(1, 2, SemaphoreAttr::default())
            .err(),
        Some(Error::Parameter)
    );
}

#[test]
fn deleting_a_semaphore_wakes_its_waiter() {
    let kernel = running_ucos3();
    let sem = kernel.semaphore_try_new(1, 0, SemaphoreAttr::default()).unwrap();
    let (tx, rx) = mpsc::channel();

    let (k, s) = (kernel.clone(), sem.clone());
    let waiter = kernel
        .thread_try_new(
            move || tx.send(k.semaphore_acquire(&s, WAIT_FOREVER)).unwrap(),
            ThreadAttr::joinable("waiter"),
        )
        .unwrap();

    assert!(wait_until(|| kernel.thread_state(&waiter) == rtos2::ThreadState::Blocked));
    kernel.semaphore_delete(&sem).unwrap();
    assert_eq!(rx.recv().unwrap(), Err(Error::Resource));
    kernel.thread_join(&waiter).unwrap();

    assert_eq!(kernel.semaphore_acquire(&sem, 0), Err(Error::Parameter));
    assert_eq!(kernel.semaphore_release(&sem), Err(Error::Parameter));
    assert_eq!(kernel.semaphore_delete(&sem), Err(Error::Parameter));
    assert_eq!(kernel.semaphore_count(&sem), 0);
}

#[test]
fn mutex_reports_its_owner() {
    let kernel = running_ucos3();
    let mutex = kernel.mutex_try_new(MutexAttr::default()).unwrap();
    let gate = kernel.semaphore_try_new(1, 0, SemaphoreAttr::default()).unwrap();
    let (tx, rx) = mpsc::channel();

    let (k, m, g) = (kernel.clone(), mutex.clone(), gate.clone());
    let holder = kernel
        .thread_try_new(
            move || {
                k.mutex_acquire(&m, WAIT_FOREVER).unwrap();
                tx.send(k.mutex_acquire(&m, 0)).unwrap();
                k.semaphore_acquire(&g, WAIT_FOREVER).unwrap();
                k.mutex_release(&m).unwrap();
            },
            ThreadAttr::joinable("holder"),
        )
        .unwrap();

    // Mutexes are not recursive by default.
    assert_eq!(rx.recv().unwrap(), Err(Error::Resource));
    assert_eq!(kernel.mutex_owner(&mutex), Some(holder.clone()));
    assert_eq!(kernel.mutex_acquire(&mutex, 0), Err(Error::Resource));
    assert_eq!(kernel.mutex_acquire(&mutex, 5), Err(Error::Timeout));
    assert_eq!(kernel.mutex_release(&mutex), Err(Error::Resource));

    kernel.semaphore_release(&gate).unwrap();
    kernel.thread_join(&holder).unwrap();
    assert_eq!(kernel.mutex_owner(&mutex), None);

    kernel.mutex_acquire(&mutex, 0).unwrap();
    kernel.mutex_release(&mutex).unwrap();
    kernel.mutex_delete(&mutex).unwrap();
    assert_eq!(kernel.mutex_acquire(&mutex, 0), Err(Error::Parameter));
}

#[test]
fn recursive_mutexes_depend_on_the_profile() {
    let ucos3 = running_ucos3();
    let recursive = MutexAttr {
        attr_bits: MutexAttrBits::RECURSIVE,
        ..Default::default()
    };
    assert!(ucos3.mutex_new(recursive).is_none());

    let kernel = running_ucos2();
    let mutex = kernel
        .mutex_try_new(MutexAttr {
            attr_bits: MutexAttrBits::RECURSIVE | MutexAttrBits::PRIO_INHERIT,
            ..Default::default()
        })
        .unwrap();

    for _ in 0..3 {
        kernel.mutex_acquire(&mutex, 0).unwrap();
    }

    let (k, m) = (kernel.clone(), mutex.clone());
    let probe = move || {
        let (k, m) = (k.clone(), m.clone());
        let (tx, rx) = mpsc::channel();
        let worker = k
            .thread_try_new(
                {
                    let k = k.clone();
                    move || tx.send(k.mutex_acquire(&m, 0)).unwrap()
                },
                ThreadAttr::joinable("probe"),
            )
            .unwrap();
        let result = rx.recv().unwrap();
        k.thread_join(&worker).unwrap();
        result
    };

    for _ in 0..2 {
        kernel.mutex_release(&mutex).unwrap();
        assert_eq!(probe(), Err(Error::Resource));
    }
    kernel.mutex_release(&mutex).unwrap();
    assert_eq!(kernel.mutex_release(&mutex), Err(Error::Resource));

    // The probe now takes the mutex and exits while holding it.
    assert_eq!(probe(), Ok(()));
}

#[test]
fn event_flags_wait_modes() {
    let kernel = running_ucos3();
    let flags = kernel
        .event_flags_try_new(EventFlagsAttr {
            name: Some("events"),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(kernel.event_flags_name(&flags), Some("events"));

    assert_eq!(kernel.event_flags_set(&flags, 0b101), Ok(0b101));
    assert_eq!(
        kernel.event_flags_wait(
            &flags,
            0b101,
            FlagsOptions::WAIT_ALL | FlagsOptions::NO_CLEAR,
            0
        ),
        Ok(0b101)
    );
    assert_eq!(kernel.event_flags_get(&flags), Ok(0b101));

    assert_eq!(
        kernel.event_flags_wait(&flags, 0b110, FlagsOptions::empty(), 0),
        Ok(0b100)
    );
    assert_eq!(kernel.event_flags_get(&flags), Ok(0b001));
    assert_eq!(kernel.event_flags_clear(&flags, 0b001), Ok(0));

    assert_eq!(
        kernel.event_flags_wait(&flags, 0b1000, FlagsOptions::empty(), 0),
        Err(Error::Resource)
    );
    assert_eq!(
        kernel.event_flags_wait(&flags, 0b1000, FlagsOptions::WAIT_ALL, 5),
        Err(Error::Timeout)
    );
}

#[test]
fn event_flags_arguments_are_validated() {
    let kernel = running_ucos3();
    let flags = kernel.event_flags_try_new(EventFlagsAttr::default()).unwrap();

    assert_eq!(kernel.event_flags_set(&flags, 0), Err(Error::Parameter));
    assert_eq!(
        kernel.event_flags_set(&flags, 0x8000_0000),
        Err(Error::Parameter)
    );
    assert_eq!(
        kernel.event_flags_wait(&flags, 0, FlagsOptions::empty(), 0),
        Err(Error::Parameter)
    );
    assert_eq!(FlagsOptions::from_raw(0x4), Err(Error::Parameter));

    kernel.event_flags_delete(&flags).unwrap();
    assert_eq!(kernel.event_flags_get(&flags), Err(Error::Parameter));
    assert_eq!(kernel.event_flags_delete(&flags), Err(Error::Parameter));
}

#[test]
fn event_flags_wake_a_waiting_thread() {
    let kernel = running_ucos3();
    let flags = kernel.event_flags_try_new(EventFlagsAttr::default()).unwrap();
    let (tx, rx) = mpsc::channel();

    let (k, f) = (kernel.clone(), flags.clone());
    let waiter = kernel
        .thread_try_new(
            move || {
                let got = k.event_flags_wait(&f, 0b11, FlagsOptions::WAIT_ALL, WAIT_FOREVER);
                tx.send(got).unwrap();
            },
            ThreadAttr::joinable("waiter"),
        )
        .unwrap();

    assert!(wait_until(|| kernel.thread_state(&waiter) == rtos2::ThreadState::Blocked));
    kernel.event_flags_set(&flags, 0b01).unwrap();
    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

    kernel.native().run_in_isr(|| kernel.event_flags_set(&flags, 0b10)).unwrap();
    assert_eq!(rx.recv().unwrap(), Ok(0b11));
    kernel.thread_join(&waiter).unwrap();
    assert_eq!(kernel.event_flags_get(&flags), Ok(0));
}

#[test]
fn message_queue_is_bounded_and_fifo() {
    let kernel = running_ucos3();
    assert!(kernel.message_queue_new(4, 3, MessageQueueAttr::default()).is_none());
    assert!(kernel.message_queue_new(0, MSG_SIZE, MessageQueueAttr::default()).is_none());

    let queue = kernel
        .message_queue_try_new(4, MSG_SIZE, MessageQueueAttr::default())
        .unwrap();
    assert_eq!(kernel.message_queue_capacity(&queue), 4);
    assert_eq!(kernel.message_queue_msg_size(&queue), MSG_SIZE);

    for msg in 1..=4 {
        kernel.message_queue_put(&queue, msg, 0, 0).unwrap();
    }
    assert_eq!(kernel.message_queue_count(&queue), 4);
    assert_eq!(kernel.message_queue_space(&queue), 0);
    assert_eq!(kernel.message_queue_put(&queue, 5, 0, 0), Err(Error::Resource));
    assert_eq!(kernel.message_queue_put(&queue, 5, 0, 5), Err(Error::Timeout));

    assert_eq!(kernel.message_queue_get(&queue, 0), Ok(1));
    assert_eq!(kernel.message_queue_get(&queue, 0), Ok(2));
    assert_eq!(kernel.message_queue_space(&queue), 2);

    kernel.message_queue_reset(&queue).unwrap();
    assert_eq!(kernel.message_queue_count(&queue), 0);
    assert_eq!(kernel.message_queue_space(&queue), 4);
    assert_eq!(kernel.message_queue_get(&queue, 0), Err(Error::Resource));
    assert_eq!(kernel.message_queue_get(&queue, 5), Err(Error::Timeout));

    kernel.message_queue_delete(&queue).unwrap();
    assert_eq!(kernel.message_queue_get(&queue, 0), Err(Error::Parameter));
    assert_eq!(kernel.message_queue_capacity(&queue), 4);
    assert_eq!(kernel.message_queue_count(&queue), 0);
}

#[test]
fn message_queue_storage_is_validated() {
    let kernel = running_ucos3();
    let short: &'static mut [u8] = Vec::leak(vec![0; 3 * MSG_SIZE]);
    let rejected = kernel.message_queue_try_new(
        4,
        MSG_SIZE,
        MessageQueueAttr {
            mq_mem: Some(short),
            ..Default::default()
        },
    );
    assert_eq!(rejected.err(), Some(Error::Parameter));

    let fits: &'static mut [u8] = Vec::leak(vec![0; 4 * MSG_SIZE]);
    let queue = kernel
        .message_queue_try_new(
            4,
            MSG_SIZE,
            MessageQueueAttr {
                mq_mem: Some(fits),
                ..Default::default()
            },
        )
        .unwrap();
    kernel.message_queue_delete(&queue).unwrap();
}

#[test]
fn producer_and_consumer() {
    let kernel = running_ucos3();
    let queue = kernel
        .message_queue_try_new(4, MSG_SIZE, MessageQueueAttr::default())
        .unwrap();

    let (k, q) = (kernel.clone(), queue.clone());
    let (tx, rx) = mpsc::channel();
    let consumer = kernel
        .thread_try_new(
            move || {
                let received: Vec<usize> = (0..100)
                    .map(|_| k.message_queue_get(&q, WAIT_FOREVER).unwrap())
                    .collect();
                tx.send(received).unwrap();
            },
            ThreadAttr::joinable("consumer"),
        )
        .unwrap();

    for msg in 0..100 {
        kernel.message_queue_put(&queue, msg, 0, WAIT_FOREVER).unwrap();
    }
    assert_eq!(rx.recv().unwrap(), (0..100).collect::<Vec<_>>());
    kernel.thread_join(&consumer).unwrap();
    assert_eq!(kernel.message_queue_space(&queue), 4);
}

#[test]
fn interrupt_context_allows_only_non_blocking_calls() {
    let kernel = running_ucos3();
    let sem = kernel.semaphore_try_new(1, 1, SemaphoreAttr::default()).unwrap();
    let mutex = kernel.mutex_try_new(MutexAttr::default()).unwrap();
    let flags = kernel.event_flags_try_new(EventFlagsAttr::default()).unwrap();
    let queue = kernel
        .message_queue_try_new(2, MSG_SIZE, MessageQueueAttr::default())
        .unwrap();
    let timer = kernel
        .timer_try_new(|| {}, TimerType::Once, TimerAttr::default())
        .unwrap();

    let isr = kernel.native().enter_isr();
    assert_eq!(kernel.semaphore_acquire(&sem, 10), Err(Error::Isr));
    assert_eq!(kernel.semaphore_acquire(&sem, 0), Ok(()));
    assert_eq!(kernel.semaphore_release(&sem), Ok(()));
    assert_eq!(kernel.mutex_acquire(&mutex, 0), Err(Error::Isr));
    assert_eq!(kernel.mutex_release(&mutex), Err(Error::Isr));
    assert_eq!(
        kernel.event_flags_wait(&flags, 1, FlagsOptions::empty(), WAIT_FOREVER),
        Err(Error::Isr)
    );
    assert_eq!(kernel.event_flags_set(&flags, 1), Ok(1));
    assert_eq!(kernel.message_queue_put(&queue, 7, 0, 0), Ok(()));
    assert_eq!(kernel.message_queue_put(&queue, 8, 0, 10), Err(Error::Isr));
    assert_eq!(kernel.message_queue_get(&queue, 0), Ok(7));
    assert_eq!(kernel.message_queue_reset(&queue), Err(Error::Isr));
    assert_eq!(kernel.timer_start(&timer, 10), Err(Error::Isr));
    assert_eq!(kernel.semaphore_delete(&sem), Err(Error::Isr));
    assert!(kernel.semaphore_new(1, 0, SemaphoreAttr::default()).is_none());
    drop(isr);

    kernel.semaphore_delete(&sem).unwrap();
}

#[test]
fn objects_of_the_wrong_kind_are_rejected() {
    let kernel = running_ucos3();
    let sem = kernel.semaphore_try_new(1, 1, SemaphoreAttr::default()).unwrap();
    let queue = kernel
        .message_queue_try_new(1, MSG_SIZE, MessageQueueAttr::default())
        .unwrap();

    assert_eq!(kernel.mutex_acquire(&sem, 0), Err(Error::Parameter));
    assert_eq!(kernel.mutex_owner(&sem), None);
    assert_eq!(kernel.event_flags_set(&sem, 1), Err(Error::Parameter));
    assert_eq!(kernel.timer_stop(&sem), Err(Error::Parameter));
    assert!(!kernel.timer_is_running(&sem));
    assert_eq!(kernel.message_queue_get(&sem, 0), Err(Error::Parameter));
    assert_eq!(kernel.message_queue_capacity(&sem), 0);
    assert_eq!(kernel.semaphore_acquire(&queue, 0), Err(Error::Parameter));
    assert_eq!(kernel.semaphore_count(&queue), 0);
    assert_eq!(kernel.semaphore_name(&queue), None);
}

#[test]
fn one_shot_timer_fires_once() {
    let kernel = running_ucos3();
    let fired = Arc::new(AtomicUsize::new(0));

    let f = fired.clone();
    let timer = kernel
        .timer_try_new(
            move || {
                f.fetch_add(1, Ordering::SeqCst);
            },
            TimerType::Once,
            TimerAttr {
                name: Some("once"),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(kernel.timer_name(&timer), Some("once"));
    assert!(!kernel.timer_is_running(&timer));
    assert_eq!(kernel.timer_stop(&timer), Err(Error::Resource));

    kernel.timer_start(&timer, 10).unwrap();
    assert!(kernel.timer_is_running(&timer));
    assert!(wait_until(|| fired.load(Ordering::SeqCst) == 1));

    thread::sleep(Duration::from_millis(50));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(!kernel.timer_is_running(&timer));
    assert_eq!(kernel.timer_stop(&timer), Err(Error::Resource));

    kernel.timer_delete(&timer).unwrap();
    assert_eq!(kernel.timer_start(&timer, 10), Err(Error::Parameter));
    assert!(!kernel.timer_is_running(&timer));
}

#[test]
fn periodic_timer_repeats_until_stopped() {
    let kernel = running_ucos3();
    let fired = Arc::new(AtomicUsize::new(0));

    let f = fired.clone();
    let timer = kernel
        .timer_try_new(
            move || {
                f.fetch_add(1, Ordering::SeqCst);
            },
            TimerType::Periodic,
            TimerAttr::default(),
        )
        .unwrap();

    assert_eq!(kernel.timer_start(&timer, 0), Err(Error::Parameter));
    kernel.timer_start(&timer, 5).unwrap();
    assert!(wait_until(|| fired.load(Ordering::SeqCst) >= 3));

    kernel.timer_stop(&timer).unwrap();
    assert!(!kernel.timer_is_running(&timer));
    assert_eq!(kernel.timer_stop(&timer), Err(Error::Resource));

    let stopped_at = fired.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(30));
    assert!(fired.load(Ordering::SeqCst) <= stopped_at + 1);

    // Restarting rearms it.
    kernel.timer_start(&timer, 5).unwrap();
    assert!(wait_until(|| fired.load(Ordering::SeqCst) > stopped_at + 1));
    kernel.timer_delete(&timer).unwrap();
}
