//! FFI bindings for the OSS mixer library.
//!
//! This crate exposes mixer sessions through a C ABI. A session is an opaque
//! handle; mixer state is returned as JSON. All functions use
//! panic::catch_unwind to prevent Rust panics from unwinding across the FFI
//! boundary.

use mixer_rs::{Channel, ErrorKind, Mixer, MixerEnumerator, MixerError, MixerSnapshot};
use mixer_rs::{MuteAction, RecSrcAction};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::ffi::{c_char, c_void, CStr, CString};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::Once;
use tracing::debug;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Error Handling
// ============================================================================

/// Error codes returned by FFI functions.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Success = 0,
    InvalidHandle = -1,
    InvalidArgument = -2,
    OutOfRange = -3,
    NotFound = -4,
    NoSuchFeature = -5,
    DeviceError = -6,
    ResourceExhausted = -7,
    JsonError = -8,
    Panic = -99,
}

impl From<ErrorKind> for ErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::InvalidArgument => ErrorCode::InvalidArgument,
            ErrorKind::OutOfRange => ErrorCode::OutOfRange,
            ErrorKind::NotFound => ErrorCode::NotFound,
            ErrorKind::NoSuchFeature => ErrorCode::NoSuchFeature,
            ErrorKind::DeviceError => ErrorCode::DeviceError,
            ErrorKind::ResourceExhausted => ErrorCode::ResourceExhausted,
        }
    }
}

/// Thread-local storage for the last error.
thread_local! {
    static LAST_ERROR: RefCell<Option<(ErrorCode, String)>> = const { RefCell::new(None) };
}

fn set_last_error(code: ErrorCode, message: impl Into<String>) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = Some((code, message.into()));
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// An error on its way out through the C ABI.
#[derive(Debug)]
struct Failure {
    code: ErrorCode,
    message: String,
}

impl Failure {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<MixerError> for Failure {
    fn from(err: MixerError) -> Self {
        Self::new(err.kind().into(), err.to_string())
    }
}

impl From<serde_json::Error> for Failure {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorCode::JsonError, err.to_string())
    }
}

// ============================================================================
// Data Types for JSON Serialization
// ============================================================================

/// A mixer channel with its cached state.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChannelDto {
    pub index: usize,
    pub name: String,
    pub left: f32,
    pub right: f32,
    pub pan: f32,
    pub is_playback: bool,
    pub is_recording: bool,
    pub is_recsrc: bool,
    pub is_muted: bool,
}

impl From<&Channel> for ChannelDto {
    fn from(channel: &Channel) -> Self {
        Self {
            index: channel.index,
            name: channel.name.to_string(),
            left: channel.volume.left,
            right: channel.volume.right,
            pan: channel.pan(),
            is_playback: channel.is_playback,
            is_recording: channel.is_recording,
            is_recsrc: channel.is_recsrc,
            is_muted: channel.is_muted,
        }
    }
}

/// A mixer and its channels.
#[derive(Debug, Serialize, Deserialize)]
pub struct MixerDto {
    pub unit: u32,
    pub path: String,
    pub mixer_name: String,
    pub card_long_name: String,
    pub card_hw_info: String,
    pub is_default_unit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<String>,
    pub recording_sources: Vec<String>,
    pub channels: Vec<ChannelDto>,
}

impl From<&MixerSnapshot> for MixerDto {
    fn from(mixer: &MixerSnapshot) -> Self {
        Self {
            unit: mixer.unit,
            path: mixer.path.clone(),
            mixer_name: mixer.identity.mixer_name.clone(),
            card_long_name: mixer.identity.card_long_name.clone(),
            card_hw_info: mixer.identity.card_hw_info.clone(),
            is_default_unit: mixer.is_default_unit,
            selected: mixer
                .selected
                .and_then(|pos| mixer.channels.get(pos))
                .map(|c| c.name.to_string()),
            recording_sources: mixer
                .recording_sources()
                .map(|c| c.name.to_string())
                .collect(),
            channels: mixer.channels.iter().map(Into::into).collect(),
        }
    }
}

/// Response containing every mixer in the system.
#[derive(Debug, Serialize, Deserialize)]
pub struct MixerListResponse {
    pub mixers: Vec<MixerDto>,
}

// ============================================================================
// Mixer Handle Type
// ============================================================================

/// Opaque handle to an open mixer. Actually points to a boxed `Mixer`.
pub type MixerHandle = *mut c_void;

static LOG_INIT: Once = Once::new();

/// Install a stderr subscriber honouring `RUST_LOG`, once per process.
fn init_logging() {
    LOG_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_writer(std::io::stderr)
            .try_init();
    });
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Allocate a C string from a Rust string. Caller must free with mixer_ffi_free_string.
fn alloc_c_string(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cs) => cs.into_raw(),
        // String contained a null byte, replace with empty
        Err(_) => CString::default().into_raw(),
    }
}

/// Parse a C string to a Rust string slice.
unsafe fn parse_c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

/// Borrow the mixer behind a handle.
unsafe fn session<'a>(handle: MixerHandle) -> Result<&'a mut Mixer, Failure> {
    (handle as *mut Mixer)
        .as_mut()
        .ok_or_else(|| Failure::new(ErrorCode::InvalidHandle, "Null mixer handle"))
}

fn to_i32(value: u32) -> Result<i32, Failure> {
    i32::try_from(value).map_err(|_| Failure::new(ErrorCode::OutOfRange, "Value exceeds i32"))
}

/// Run `f` for a function returning a status or a non-negative value.
fn status_call(what: &str, f: impl FnOnce() -> Result<i32, Failure>) -> i32 {
    clear_last_error();

    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => value,
        Ok(Err(failure)) => {
            set_last_error(failure.code, failure.message);
            failure.code as i32
        }
        Err(_) => {
            set_last_error(ErrorCode::Panic, format!("Panic during {what}"));
            ErrorCode::Panic as i32
        }
    }
}

/// Run `f` for a function returning JSON. Null on failure.
fn json_call<T: Serialize>(what: &str, f: impl FnOnce() -> Result<T, Failure>) -> *mut c_char {
    clear_last_error();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let value = f()?;
        Ok::<_, Failure>(serde_json::to_string(&value)?)
    }));

    match result {
        Ok(Ok(json)) => alloc_c_string(&json),
        Ok(Err(failure)) => {
            set_last_error(failure.code, failure.message);
            ptr::null_mut()
        }
        Err(_) => {
            set_last_error(ErrorCode::Panic, format!("Panic during {what}"));
            ptr::null_mut()
        }
    }
}

// ============================================================================
// FFI Functions - Lifecycle
// ============================================================================

/// Open a mixer.
///
/// # Arguments
/// * `name` - Device node such as "/dev/mixer1". Null or "/dev/mixer" opens the default unit.
///
/// # Returns
/// Handle to the mixer, or null on failure. Check mixer_ffi_last_error_code() on failure.
///
/// # Safety
/// The returned handle must be released with mixer_ffi_close().
#[no_mangle]
pub extern "C" fn mixer_ffi_open(name: *const c_char) -> MixerHandle {
    clear_last_error();
    init_logging();

    let result = panic::catch_unwind(|| {
        let name = if name.is_null() {
            None
        } else {
            match unsafe { parse_c_str(name) } {
                Some(s) => Some(s),
                None => {
                    return Err(Failure::new(ErrorCode::InvalidArgument, "Invalid device name"));
                }
            }
        };
        let mixer = Mixer::open(name)?;
        debug!(path = mixer.path(), "opened mixer handle");
        Ok(Box::into_raw(Box::new(mixer)) as MixerHandle)
    });

    match result {
        Ok(Ok(handle)) => handle,
        Ok(Err(failure)) => {
            set_last_error(failure.code, failure.message);
            ptr::null_mut()
        }
        Err(_) => {
            set_last_error(ErrorCode::Panic, "Panic during mixer open");
            ptr::null_mut()
        }
    }
}

/// Close a mixer.
///
/// # Returns
/// 0 on success, negative error code if closing the device failed. The handle
/// is released either way.
///
/// # Safety
/// The handle must have been created by mixer_ffi_open() and must not be used after this call.
#[no_mangle]
pub extern "C" fn mixer_ffi_close(handle: MixerHandle) -> i32 {
    if handle.is_null() {
        return ErrorCode::Success as i32;
    }

    status_call("mixer close", || {
        let mixer = unsafe { Box::from_raw(handle as *mut Mixer) };
        mixer.close()?;
        Ok(ErrorCode::Success as i32)
    })
}

// ============================================================================
// FFI Functions - Channel Operations
// ============================================================================

/// Select the channel named `name` (e.g. "vol", "pcm", "mic").
///
/// # Returns
/// The channel's kernel index, or a negative error code.
#[no_mangle]
pub extern "C" fn mixer_ffi_select_by_name(handle: MixerHandle, name: *const c_char) -> i32 {
    status_call("select by name", || {
        let mixer = unsafe { session(handle)? };
        let name = unsafe { parse_c_str(name) }
            .ok_or_else(|| Failure::new(ErrorCode::InvalidArgument, "Invalid channel name"))?;
        let channel = mixer.select_by_name(name)?;
        to_i32(channel.index as u32)
    })
}

/// Select the channel with kernel index `index`.
///
/// # Returns
/// 0 on success, negative error code on failure.
#[no_mangle]
pub extern "C" fn mixer_ffi_select_by_index(handle: MixerHandle, index: i32) -> i32 {
    status_call("select by index", || {
        let mixer = unsafe { session(handle)? };
        let index =
            usize::try_from(index).map_err(|_| MixerError::IndexOutOfRange(i64::from(index)))?;
        mixer.select_by_index(index)?;
        Ok(ErrorCode::Success as i32)
    })
}

/// Set the selected channel's volume.
///
/// # Arguments
/// * `left`, `right` - Levels in 0.0 to 1.0
///
/// # Returns
/// 0 on success, negative error code on failure.
#[no_mangle]
pub extern "C" fn mixer_ffi_set_volume(handle: MixerHandle, left: f32, right: f32) -> i32 {
    status_call("set volume", || {
        let mixer = unsafe { session(handle)? };
        mixer.set_volume(left, right)?;
        Ok(ErrorCode::Success as i32)
    })
}

/// Rebalance the selected channel.
///
/// # Arguments
/// * `pan` - -1.0 (left) to 1.0 (right)
///
/// # Returns
/// 0 on success, negative error code on failure.
#[no_mangle]
pub extern "C" fn mixer_ffi_set_pan(handle: MixerHandle, pan: f32) -> i32 {
    status_call("set pan", || {
        let mixer = unsafe { session(handle)? };
        mixer.set_pan(pan)?;
        Ok(ErrorCode::Success as i32)
    })
}

/// Change the selected channel's mute state.
///
/// # Arguments
/// * `action` - 1 = mute, 2 = unmute, 4 = toggle
///
/// # Returns
/// 1 if muted afterwards, 0 if not, negative error code on failure.
#[no_mangle]
pub extern "C" fn mixer_ffi_set_mute(handle: MixerHandle, action: i32) -> i32 {
    status_call("set mute", || {
        let mixer = unsafe { session(handle)? };
        let action = MuteAction::try_from(action)?;
        Ok(i32::from(mixer.set_mute(action)?))
    })
}

/// Change the recording-source mask around the selected channel.
///
/// # Arguments
/// * `action` - 1 = add, 2 = remove, 4 = set as only source, 8 = toggle
///
/// # Returns
/// 1 if the channel is a recording source afterwards, 0 if not, negative
/// error code on failure.
#[no_mangle]
pub extern "C" fn mixer_ffi_modify_recsrc(handle: MixerHandle, action: i32) -> i32 {
    status_call("modify recording source", || {
        let mixer = unsafe { session(handle)? };
        let action = RecSrcAction::try_from(action)?;
        Ok(i32::from(mixer.modify_recording_source(action)?))
    })
}

// ============================================================================
// FFI Functions - System
// ============================================================================

/// Get the system default unit.
///
/// # Returns
/// The unit number, or a negative error code.
#[no_mangle]
pub extern "C" fn mixer_ffi_get_default_unit() -> i32 {
    status_call("get default unit", || {
        to_i32(MixerEnumerator::new().default_unit()?)
    })
}

/// Make `unit` the system default and update the mixer's default flag.
///
/// # Returns
/// 0 on success, negative error code on failure.
#[no_mangle]
pub extern "C" fn mixer_ffi_set_default_unit(handle: MixerHandle, unit: i32) -> i32 {
    status_call("set default unit", || {
        let mixer = unsafe { session(handle)? };
        let unit = u32::try_from(unit).map_err(|_| {
            Failure::new(ErrorCode::InvalidArgument, format!("Invalid unit: {unit}"))
        })?;
        mixer.set_default_unit(unit)?;
        Ok(ErrorCode::Success as i32)
    })
}

/// Get the number of mixers in the system.
///
/// # Returns
/// The mixer count, or a negative error code.
#[no_mangle]
pub extern "C" fn mixer_ffi_count_mixers() -> i32 {
    status_call("count mixers", || to_i32(Mixer::count_mixers()?))
}

/// Describe an open mixer.
///
/// # Returns
/// JSON string with the mixer and its channels. Caller must free with mixer_ffi_free_string().
/// Returns null on failure.
#[no_mangle]
pub extern "C" fn mixer_ffi_describe(handle: MixerHandle) -> *mut c_char {
    json_call("describe", || {
        let mixer = unsafe { session(handle)? };
        Ok(MixerDto::from(&mixer.snapshot()))
    })
}

/// Describe every mixer in the system.
///
/// # Returns
/// JSON string containing the mixer list. Caller must free with mixer_ffi_free_string().
/// Returns null on failure.
#[no_mangle]
pub extern "C" fn mixer_ffi_list_mixers() -> *mut c_char {
    init_logging();
    json_call("mixer enumeration", || {
        let mixers = MixerEnumerator::new().get_mixers()?;
        Ok(MixerListResponse {
            mixers: mixers.iter().map(Into::into).collect(),
        })
    })
}

// ============================================================================
// FFI Functions - Memory Management
// ============================================================================

/// Free a string allocated by this library.
///
/// # Safety
/// The pointer must have been returned by one of the mixer_ffi_* functions.
/// Do not call this on strings from other sources.
#[no_mangle]
pub extern "C" fn mixer_ffi_free_string(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }

    let _ = panic::catch_unwind(|| unsafe {
        let _ = CString::from_raw(ptr);
    });
}

// ============================================================================
// FFI Functions - Error Handling
// ============================================================================

/// Get the last error code.
///
/// # Returns
/// The error code from the last failed operation, or 0 if no error.
#[no_mangle]
pub extern "C" fn mixer_ffi_last_error_code() -> i32 {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|(code, _)| *code as i32)
            .unwrap_or(0)
    })
}

/// Get the last error message.
///
/// # Returns
/// Error message string. Caller must free with mixer_ffi_free_string().
/// Returns null if no error.
#[no_mangle]
pub extern "C" fn mixer_ffi_last_error_message() -> *mut c_char {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|(_, msg)| alloc_c_string(msg))
            .unwrap_or(ptr::null_mut())
    })
}

// ============================================================================
// FFI Functions - Utility
// ============================================================================

/// Get the library version.
///
/// # Returns
/// Version string. Caller must free with mixer_ffi_free_string().
#[no_mangle]
pub extern "C" fn mixer_ffi_version() -> *mut c_char {
    alloc_c_string(env!("CARGO_PKG_VERSION"))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use mixer_rs::audio::{CapabilityMasks, MixerIdentity};
    use mixer_rs::Volume;

    fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string();
        mixer_ffi_free_string(ptr);
        s
    }

    #[test]
    fn test_error_code_conversion() {
        assert_eq!(
            ErrorCode::from(MixerError::NoChannels.kind()),
            ErrorCode::NotFound
        );
        assert_eq!(
            ErrorCode::from(MixerError::PanOutOfRange(2.0).kind()),
            ErrorCode::OutOfRange
        );
        let failure = Failure::from(MixerError::NoSuchFeature("pcm".to_string()));
        assert_eq!(failure.code, ErrorCode::NoSuchFeature);
        assert!(failure.message.contains("pcm"));
    }

    #[test]
    fn test_null_handle() {
        assert_eq!(mixer_ffi_set_volume(ptr::null_mut(), 0.5, 0.5), ErrorCode::InvalidHandle as i32);
        assert_eq!(mixer_ffi_last_error_code(), ErrorCode::InvalidHandle as i32);
        assert!(!take_string(mixer_ffi_last_error_message()).is_empty());

        assert!(mixer_ffi_describe(ptr::null_mut()).is_null());
        assert_eq!(mixer_ffi_close(ptr::null_mut()), 0);
    }

    #[test]
    fn test_open_rejects_bad_names() {
        let name = CString::new("/dev/dsp0").unwrap();
        assert!(mixer_ffi_open(name.as_ptr()).is_null());
        assert_eq!(mixer_ffi_last_error_code(), ErrorCode::InvalidArgument as i32);

        let name = CString::new("/dev/mixer4096").unwrap();
        assert!(mixer_ffi_open(name.as_ptr()).is_null());
        assert_eq!(mixer_ffi_last_error_code(), ErrorCode::DeviceError as i32);
    }

    #[test]
    fn test_success_clears_last_error() {
        mixer_ffi_set_pan(ptr::null_mut(), 0.0);
        assert_eq!(mixer_ffi_last_error_code(), ErrorCode::InvalidHandle as i32);

        assert!(mixer_ffi_get_default_unit() >= 0);
        assert_eq!(mixer_ffi_last_error_code(), 0);
        assert!(mixer_ffi_last_error_message().is_null());
    }

    #[test]
    fn test_mixer_dto() {
        let masks = CapabilityMasks {
            devices: 1,
            recording: 1 << 7,
            recsrc: 1 << 7,
            muted: 0,
        };
        let snapshot = MixerSnapshot {
            unit: 1,
            path: "/dev/mixer1".to_string(),
            identity: MixerIdentity {
                mixer_name: "pcm1:mixer".to_string(),
                card_long_name: "USB Audio".to_string(),
                card_hw_info: "at uaudio0".to_string(),
            },
            is_default_unit: true,
            masks,
            channels: vec![
                Channel::new(0, "vol", Volume::new(0.5, 0.7).unwrap(), &masks),
                Channel::new(7, "mic", Volume::new(0.3, 0.3).unwrap(), &masks),
            ],
            selected: Some(1),
        };

        let dto = MixerDto::from(&snapshot);
        assert_eq!(dto.selected.as_deref(), Some("mic"));
        assert_eq!(dto.recording_sources, ["mic"]);
        assert!(dto.channels[0].is_playback);
        assert!(dto.channels[1].is_recsrc);

        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["path"], "/dev/mixer1");
        assert_eq!(json["channels"][1]["name"], "mic");
        assert_eq!(json["is_default_unit"], true);
    }

    #[test]
    fn test_version() {
        let version = take_string(mixer_ffi_version());
        assert!(!version.is_empty());
    }
}
