use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

pub(crate) fn set_last_error(message: impl Into<String>) {
    LAST_ERROR.with(|cell| {
        *cell.borrow_mut() = Some(message.into());
    });
}

fn take_last_error() -> Option<String> {
    LAST_ERROR.with(|cell| cell.borrow_mut().take())
}

pub(crate) fn cstr_to_string(value: *const c_char) -> Option<String> {
    if value.is_null() {
        return None;
    }
    unsafe { Some(CStr::from_ptr(value).to_string_lossy().to_string()) }
}

pub(crate) fn string_to_c(value: &str) -> *mut c_char {
    match CString::new(value) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn meme_ext_free_string(value: *mut c_char) {
    if value.is_null() {
        return;
    }
    unsafe {
        let _ = CString::from_raw(value);
    }
}

/// Message of the last failed call on this thread, or null. Free with
/// `meme_ext_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn meme_ext_last_error_message() -> *mut c_char {
    match take_last_error() {
        Some(message) => string_to_c(&message),
        None => ptr::null_mut(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_error_is_taken_once() {
        set_last_error("boom");
        let message = meme_ext_last_error_message();
        assert_eq!(cstr_to_string(message).as_deref(), Some("boom"));
        meme_ext_free_string(message);
        assert!(meme_ext_last_error_message().is_null());
    }
}
