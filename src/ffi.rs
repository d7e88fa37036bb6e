//! C entry points called by generated code.
//!
//! Generated functions call `add(a, b, out, height, width)` for every `add`
//! node. The call dispatches onto a per-thread kernel, created on first use
//! as a [`HardwareKernel`] over a fresh [`ScalarAdder`]. Hosts that want a
//! different model or the software reference install their own kernel with
//! [`install_entry_kernel`].

use std::cell::RefCell;
use std::os::raw::c_int;

use crate::kernel::{HardwareKernel, Kernel};
use crate::models::ScalarAdder;
use crate::op::Operator;

thread_local! {
    static ENTRY_KERNEL: RefCell<Option<Box<dyn Kernel>>> = RefCell::new(None);
}

/// Replaces the calling thread's entry kernel, returning the previous one.
pub fn install_entry_kernel(kernel: Box<dyn Kernel>) -> Option<Box<dyn Kernel>> {
    ENTRY_KERNEL.with(|cell| cell.borrow_mut().replace(kernel))
}

/// Removes the calling thread's entry kernel.
pub fn take_entry_kernel() -> Option<Box<dyn Kernel>> {
    ENTRY_KERNEL.with(|cell| cell.borrow_mut().take())
}

fn with_entry_kernel<R>(f: impl FnOnce(&mut dyn Kernel) -> R) -> R {
    ENTRY_KERNEL.with(|cell| {
        let mut slot = cell.borrow_mut();
        let kernel = slot.get_or_insert_with(|| {
            Box::new(HardwareKernel::new(ScalarAdder::new())) as Box<dyn Kernel>
        });
        f(kernel.as_mut())
    })
}

/// Elementwise addition over row-major `height x width` buffers.
///
/// Returns 0 on success and -1 on null pointers, negative dimensions or a
/// kernel failure.
///
/// # Safety
///
/// `a` and `b` must be valid for `height * width` reads and `out` for
/// `height * width` writes. `out` must not overlap `a` or `b`.
#[no_mangle]
pub unsafe extern "C" fn add(
    a: *const c_int,
    b: *const c_int,
    out: *mut c_int,
    height: c_int,
    width: c_int,
) -> c_int {
    if a.is_null() || b.is_null() || out.is_null() || height < 0 || width < 0 {
        tracing::error!(height, width, "invalid arguments to add");
        return -1;
    }
    let shape = [height as usize, width as usize];
    let len = shape[0] * shape[1];
    let a = std::slice::from_raw_parts(a, len);
    let b = std::slice::from_raw_parts(b, len);
    let out = std::slice::from_raw_parts_mut(out, len);

    let result = with_entry_kernel(|kernel| {
        crate::kernel::execute_op(kernel, Operator::Add, &[a, b], out, &shape)
    });
    match result {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "add failed");
            -1
        }
    }
}
