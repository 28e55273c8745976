//! JNI wrappers for service lifecycle.

use jni::JNIEnv;
use jni::objects::{JClass, JString};
use jni::sys::{jint, jstring};

use super::{c_arg, java_string};
use std::ffi::CStr;

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_example_justlearnitappp_sync_NativeBridge_init(
    mut env: JNIEnv,
    _class: JClass,
    config_json: JString,
) -> jint {
    let c_json = match c_arg(&mut env, &config_json) {
        Some(s) => s,
        None => return crate::LessonSyncError::NullPointer as jint,
    };
    // SAFETY: c_json is a valid null-terminated string.
    unsafe { crate::lessonsync_init(c_json.as_ptr()) as jint }
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_example_justlearnitappp_sync_NativeBridge_shutdown(
    _env: JNIEnv,
    _class: JClass,
) {
    crate::lessonsync_shutdown();
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_example_justlearnitappp_sync_NativeBridge_version(
    mut env: JNIEnv,
    _class: JClass,
) -> jstring {
    // SAFETY: the version string is static and null-terminated.
    let version = unsafe { CStr::from_ptr(crate::lessonsync_version()) };
    java_string(&mut env, &version.to_string_lossy())
}
