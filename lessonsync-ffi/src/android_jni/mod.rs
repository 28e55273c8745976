//! JNI bridge for Android. Maps the Kotlin `NativeBridge` external functions
//! to the `extern "C"` FFI exports.
//!
//! Functions are named `Java_com_example_justlearnitappp_sync_NativeBridge_<methodName>`.
//! Calls that return JSON hand back `{"error_code":N}` when the export fails.

mod core;
mod credentials;
mod sync;

use crate::LessonSyncError;
use jni::JNIEnv;
use jni::objects::JString;
use jni::sys::{jboolean, jstring, JNI_FALSE, JNI_TRUE};
use std::ffi::{CStr, CString, c_char};

/// A Kotlin string argument as a C string. `None` when null or unreadable.
pub(crate) fn c_arg(env: &mut JNIEnv, input: &JString) -> Option<CString> {
    if input.is_null() {
        return None;
    }
    let value: String = env.get_string(input).ok()?.into();
    CString::new(value).ok()
}

/// New Java string, or null if the JVM could not allocate one.
pub(crate) fn java_string(env: &mut JNIEnv, value: &str) -> jstring {
    env.new_string(value)
        .map(|s| s.into_raw())
        .unwrap_or(std::ptr::null_mut())
}

/// The payload of a JSON-returning export, or its error code as JSON.
/// Always releases `out`.
///
/// # Safety
/// `out` must be null or a string allocated by this library.
pub(crate) unsafe fn json_reply(env: &mut JNIEnv, code: LessonSyncError, out: *mut c_char) -> jstring {
    if out.is_null() {
        return java_string(env, &format!(r#"{{"error_code":{}}}"#, code as i32));
    }
    let json = unsafe { CStr::from_ptr(out) }.to_string_lossy().into_owned();
    unsafe { crate::lessonsync_free_string(out) };
    if code != LessonSyncError::Ok {
        return java_string(env, &format!(r#"{{"error_code":{}}}"#, code as i32));
    }
    java_string(env, &json)
}

/// A boolean out-param export as a `jboolean`; false when the call failed.
pub(crate) fn flag_reply(code: LessonSyncError, flag: bool) -> jboolean {
    if code == LessonSyncError::Ok && flag { JNI_TRUE } else { JNI_FALSE }
}
