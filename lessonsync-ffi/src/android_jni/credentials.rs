//! JNI wrappers for credential provisioning.

use jni::JNIEnv;
use jni::objects::{JClass, JString};
use jni::sys::{jboolean, jint};

use super::{c_arg, flag_reply};

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_example_justlearnitappp_sync_NativeBridge_provisionCredentials(
    mut env: JNIEnv,
    _class: JClass,
    path: JString,
) -> jint {
    let c_path = match c_arg(&mut env, &path) {
        Some(s) => s,
        None => return crate::LessonSyncError::NullPointer as jint,
    };
    // SAFETY: c_path is a valid null-terminated string.
    unsafe { crate::lessonsync_provision_credentials(c_path.as_ptr()) as jint }
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_example_justlearnitappp_sync_NativeBridge_hasCredentials(
    _env: JNIEnv,
    _class: JClass,
) -> jboolean {
    let mut exists = false;
    let code = unsafe { crate::lessonsync_has_credentials(&mut exists) };
    flag_reply(code, exists)
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_example_justlearnitappp_sync_NativeBridge_deleteCredentials(
    _env: JNIEnv,
    _class: JClass,
) -> jint {
    crate::lessonsync_delete_credentials() as jint
}
