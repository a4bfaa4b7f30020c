#![allow(dead_code)]

use std::{
    thread,
    time::{Duration, Instant},
};

use rtos2::{Kernel, Profile};
use rtos2_sim::SimKernel;

pub type Rtos = Kernel<SimKernel>;

pub fn init_logger() {
    let _ = env_logger::try_init();
}

/// An initialized, not yet started uC/OS-III layer.
pub fn ucos3() -> Rtos {
    init_logger();
    let kernel = Kernel::new(SimKernel::ucos3(), Profile::ucos3(64).unwrap()).unwrap();
    kernel.initialize().unwrap();
    kernel
}

/// An initialized, not yet started uC/OS-II layer.
pub fn ucos2() -> Rtos {
    init_logger();
    let kernel = Kernel::new(SimKernel::ucos2(), Profile::ucos2(63).unwrap()).unwrap();
    kernel.initialize().unwrap();
    kernel
}

pub fn running_ucos3() -> Rtos {
    let kernel = ucos3();
    kernel.start().unwrap();
    kernel
}

pub fn running_ucos2() -> Rtos {
    let kernel = ucos2();
    kernel.start().unwrap();
    kernel
}

/// Polls `cond` until it holds, for at most five seconds.
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}
