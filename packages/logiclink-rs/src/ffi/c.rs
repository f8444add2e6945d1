//! C ABI. Consumed by the cffi based Python package and anything else
//! that can load a shared object.

use std::os::raw::c_int;

use crate::capture::DemoCapture;

/// Connectivity self check for binding smoke tests.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn getMeaning(n: c_int) -> c_int {
    n.wrapping_add(42)
}

#[no_mangle]
pub extern "C" fn logiclink_demo_new(channels: usize, sample_rate: u32) -> *mut DemoCapture {
    match DemoCapture::new(channels, sample_rate) {
        Ok(capture) => Box::into_raw(Box::new(capture)),
        Err(_) => std::ptr::null_mut(),
    }
}

/// # Safety
/// `ptr` must come from [`logiclink_demo_new`] and not be freed yet.
#[no_mangle]
pub unsafe extern "C" fn logiclink_demo_free(ptr: *mut DemoCapture) {
    if !ptr.is_null() {
        drop(Box::from_raw(ptr));
    }
}

/// Runs a capture until at least `bytes` raw bytes arrived. Returns 0 on
/// success, -1 on failure.
///
/// # Safety
/// `ptr` must come from [`logiclink_demo_new`] and not be freed yet.
#[no_mangle]
pub unsafe extern "C" fn logiclink_demo_run(ptr: *mut DemoCapture, bytes: usize) -> c_int {
    let Some(capture) = ptr.as_mut() else {
        return -1;
    };

    match capture.run(bytes) {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// # Safety
/// `ptr` must come from [`logiclink_demo_new`] and not be freed yet.
#[no_mangle]
pub unsafe extern "C" fn logiclink_demo_channels(ptr: *const DemoCapture) -> usize {
    ptr.as_ref().map_or(0, DemoCapture::channels)
}

/// Channel length in samples.
///
/// # Safety
/// `ptr` must come from [`logiclink_demo_new`] and not be freed yet.
#[no_mangle]
pub unsafe extern "C" fn logiclink_demo_channel_len(ptr: *const DemoCapture) -> u64 {
    ptr.as_ref().map_or(0, DemoCapture::channel_len)
}

/// Copies `length` samples of `channel` starting at `begin` into `out`
/// (packed, MSB first). Returns the number of bytes written, or -1 when
/// the arguments are out of range.
///
/// # Safety
/// `ptr` must come from [`logiclink_demo_new`]; `out` must point at
/// `out_cap` writable bytes.
#[no_mangle]
pub unsafe extern "C" fn logiclink_demo_read(
    ptr: *const DemoCapture,
    channel: usize,
    begin: u64,
    length: u64,
    out: *mut u8,
    out_cap: usize,
) -> i64 {
    let Some(capture) = ptr.as_ref() else {
        return -1;
    };

    if out.is_null() || channel >= capture.channels() {
        return -1;
    }

    let bytes = capture.read_channel(channel, begin, length);
    if bytes.len() > out_cap {
        return -1;
    }

    std::ptr::copy_nonoverlapping(bytes.as_ptr(), out, bytes.len());
    bytes.len() as i64
}
