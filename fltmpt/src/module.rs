//! Owned libopenmpt module handle.

use std::{
    ffi::{CStr, CString, c_char, c_int, c_void},
    ptr::{self, NonNull},
};

use openmpt_sys as sys;
use tracing::debug;

use crate::error::ModuleError;

// Render parameter ids from libopenmpt.h; openmpt-sys 0.1 does not export them.
const OPENMPT_MODULE_RENDER_STEREOSEPARATION_PERCENT: c_int = 2;
const OPENMPT_MODULE_RENDER_INTERPOLATIONFILTER_LENGTH: c_int = 3;
const OPENMPT_MODULE_RENDER_VOLUMERAMPING_STRENGTH: c_int = 4;

/// Render parameters the decoder sets before playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderParam {
    StereoSeparationPercent,
    InterpolationFilterLength,
    VolumeRampingStrength,
}

impl RenderParam {
    fn raw(self) -> c_int {
        match self {
            RenderParam::StereoSeparationPercent => {
                OPENMPT_MODULE_RENDER_STEREOSEPARATION_PERCENT as c_int
            }
            RenderParam::InterpolationFilterLength => {
                OPENMPT_MODULE_RENDER_INTERPOLATIONFILTER_LENGTH as c_int
            }
            RenderParam::VolumeRampingStrength => {
                OPENMPT_MODULE_RENDER_VOLUMERAMPING_STRENGTH as c_int
            }
        }
    }
}

/// A loaded module and the file data it was read from.
pub struct Module {
    ptr: NonNull<sys::openmpt_module>,
    // libopenmpt may keep referring to the loaded bytes.
    _data: Vec<u8>,
}

impl Module {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, ModuleError> {
        let ptr = unsafe {
            sys::openmpt_module_create_from_memory(
                data.as_ptr() as *const c_void,
                data.len(),
                Some(log_message),
                ptr::null_mut(),
                ptr::null(),
            )
        };
        let ptr = NonNull::new(ptr).ok_or(ModuleError::Load)?;
        Ok(Self { ptr, _data: data })
    }

    /// Returns false if libopenmpt rejects the value.
    pub fn set_render_param(&mut self, param: RenderParam, value: i32) -> bool {
        unsafe { sys::openmpt_module_set_render_param(self.ptr.as_ptr(), param.raw(), value) != 0 }
    }

    /// Extra passes through the song: 0 plays it once.
    pub fn set_repeat_count(&mut self, count: i32) -> bool {
        unsafe { sys::openmpt_module_set_repeat_count(self.ptr.as_ptr(), count) != 0 }
    }

    /// Length of one pass through the song.
    pub fn duration_seconds(&self) -> f64 {
        unsafe { sys::openmpt_module_get_duration_seconds(self.ptr.as_ptr()) }
    }

    /// Pattern channels of the module, not output channels.
    pub fn num_channels(&self) -> u32 {
        let channels = unsafe { sys::openmpt_module_get_num_channels(self.ptr.as_ptr()) };
        u32::try_from(channels).unwrap_or(0)
    }

    /// A metadata value, `None` when absent or empty.
    pub fn metadata(&self, key: &str) -> Option<String> {
        let key = CString::new(key).ok()?;
        unsafe {
            let value = sys::openmpt_module_get_metadata(self.ptr.as_ptr(), key.as_ptr());
            if value.is_null() {
                return None;
            }
            let text = CStr::from_ptr(value).to_string_lossy().into_owned();
            sys::openmpt_free_string(value);
            Some(text).filter(|text| !text.is_empty())
        }
    }

    /// Renders interleaved stereo into `out` and returns the frames written.
    /// 0 means the song has ended.
    pub fn read_float_stereo(&mut self, sample_rate: u32, out: &mut [f32]) -> usize {
        let rate = i32::try_from(sample_rate).unwrap_or(i32::MAX);
        unsafe {
            sys::openmpt_module_read_interleaved_float_stereo(
                self.ptr.as_ptr(),
                rate,
                out.len() / 2,
                out.as_mut_ptr(),
            )
        }
    }
}

impl Drop for Module {
    fn drop(&mut self) {
        unsafe { sys::openmpt_module_destroy(self.ptr.as_ptr()) }
    }
}

/// Packed `major << 24 | minor << 16 | patch` of the linked libopenmpt.
pub fn library_version() -> u32 {
    unsafe { sys::openmpt_get_library_version() }
}

unsafe extern "C" fn log_message(message: *const c_char, _user: *mut c_void) {
    if message.is_null() {
        return;
    }
    let text = unsafe { CStr::from_ptr(message) }.to_string_lossy();
    debug!(target: "libopenmpt", "{text}");
}
