pub(crate) mod capture;
pub(crate) mod session;
mod store;
mod synthetic;

pub(crate) use session::{CaptureJob, CaptureReport, CaptureRun, run_capture};

pub use {
    capture::{
        CaptureChunk, CaptureSource, CaptureStream, CpalCaptureSource, InputDevice,
        list_input_devices,
    },
    store::{RecordingStore, SettingsStore, WavStore, duration_seconds},
    synthetic::SyntheticCaptureSource,
};
