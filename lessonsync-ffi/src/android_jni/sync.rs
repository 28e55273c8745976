//! JNI wrappers for folder sync.

use jni::JNIEnv;
use jni::objects::JClass;
use jni::sys::{jboolean, jint, jstring};

use super::{flag_reply, json_reply};

/// Outcome array of a blocking run.
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_example_justlearnitappp_sync_NativeBridge_syncAll(
    mut env: JNIEnv,
    _class: JClass,
) -> jstring {
    let mut out = std::ptr::null_mut();
    let code = unsafe { crate::lessonsync_sync_all(&mut out) };
    unsafe { json_reply(&mut env, code, out) }
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_example_justlearnitappp_sync_NativeBridge_syncStart(
    _env: JNIEnv,
    _class: JClass,
) -> jint {
    crate::lessonsync_sync_start() as jint
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_example_justlearnitappp_sync_NativeBridge_syncCancel(
    _env: JNIEnv,
    _class: JClass,
) -> jint {
    crate::lessonsync_sync_cancel() as jint
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_example_justlearnitappp_sync_NativeBridge_syncIsRunning(
    _env: JNIEnv,
    _class: JClass,
) -> jboolean {
    let mut running = false;
    let code = unsafe { crate::lessonsync_sync_is_running(&mut running) };
    flag_reply(code, running)
}

/// Pending `SyncEvent`s as a JSON array.
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_example_justlearnitappp_sync_NativeBridge_pollEvents(
    mut env: JNIEnv,
    _class: JClass,
) -> jstring {
    let mut out = std::ptr::null_mut();
    let code = unsafe { crate::lessonsync_poll_events(&mut out) };
    unsafe { json_reply(&mut env, code, out) }
}
