use rtos2::{API_VERSION, Error, Kernel, KernelState, Profile, ProfileError};
use rtos2_native::NativeKernel;
use rtos2_sim::SimKernel;

mod common;

use common::*;

#[test]
fn run_states() {
    init_logger();
    let kernel = Kernel::new(SimKernel::ucos3(), Profile::ucos3(64).unwrap()).unwrap();
    assert_eq!(kernel.state(), KernelState::Inactive);
    assert_eq!(kernel.start(), Err(Error::Unknown));

    kernel.initialize().unwrap();
    assert_eq!(kernel.state(), KernelState::Ready);
    assert_eq!(kernel.initialize(), Err(Error::Unknown));

    kernel.start().unwrap();
    assert_eq!(kernel.state(), KernelState::Running);
    assert_eq!(kernel.start(), Err(Error::Unknown));
}

#[test]
fn scheduler_lock_nesting() {
    let kernel = running_ucos3();

    assert_eq!(kernel.unlock(), Ok(false));
    assert_eq!(kernel.lock(), Ok(false));
    assert_eq!(kernel.state(), KernelState::Locked);
    assert_eq!(kernel.lock(), Ok(true));
    assert_eq!(kernel.native().sched_lock_nesting(), 2);

    assert_eq!(kernel.unlock(), Ok(true));
    assert_eq!(kernel.state(), KernelState::Locked);
    assert_eq!(kernel.restore_lock(false), Ok(false));
    assert_eq!(kernel.state(), KernelState::Running);
    assert_eq!(kernel.restore_lock(true), Ok(true));
    assert_eq!(kernel.restore_lock(false), Ok(false));
}

#[test]
fn lock_needs_a_running_kernel() {
    let kernel = ucos3();
    assert_eq!(kernel.lock(), Err(Error::Unknown));
    assert_eq!(kernel.unlock(), Err(Error::Unknown));
    assert_eq!(kernel.delay(1), Err(Error::Unknown));
}

#[test]
fn info_per_profile() {
    let ucos3 = ucos3().info();
    assert_eq!(ucos3.api_version, API_VERSION);
    assert_eq!(ucos3.kernel_version, 30804 << 16);
    assert_eq!(ucos3.id, "uC/OS-III CMSIS-RTOS2");

    let ucos2 = ucos2().info();
    assert_eq!(ucos2.kernel_version, 29300 << 8);
    assert_eq!(ucos2.id, "uC/OS-II CMSIS-RTOS2");

    let mut buf = [0u8; 8];
    assert_eq!(ucos2.copy_id(&mut buf), 8);
    assert_eq!(&buf, b"uC/OS-II");
}

#[test]
fn profile_must_match_the_native_kernel() {
    init_logger();
    let result = Kernel::new(SimKernel::ucos3(), Profile::ucos2(62).unwrap());
    assert_eq!(
        result.err(),
        Some(ProfileError::Mismatch {
            expected: 62,
            actual: 63
        })
    );
}

#[test]
fn ticks_and_delays() {
    let kernel = running_ucos3();
    assert_eq!(kernel.tick_freq(), 1000);
    assert_eq!(kernel.sys_timer_freq(), 1000);

    let before = kernel.tick_count();
    kernel.delay(20).unwrap();
    assert!(kernel.tick_count().wrapping_sub(before) >= 20);

    kernel.delay(0).unwrap();
    assert_eq!(kernel.delay_until(0), Err(Error::Parameter));

    let target = kernel.tick_count() + 10;
    kernel.delay_until(target).unwrap();
    assert!(kernel.tick_count() >= target);
}

#[test]
fn interrupt_context_is_rejected() {
    init_logger();
    let kernel = Kernel::new(SimKernel::ucos3(), Profile::ucos3(64).unwrap()).unwrap();
    let isr = kernel.native().enter_isr();
    assert_eq!(kernel.initialize(), Err(Error::Isr));
    drop(isr);

    kernel.initialize().unwrap();
    kernel.start().unwrap();
    kernel.native().run_in_isr(|| {
        assert_eq!(kernel.delay(1), Err(Error::Isr));
        assert_eq!(kernel.lock(), Err(Error::Isr));
        assert_eq!(kernel.thread_yield(), Err(Error::Isr));
    });
}
