//! rslogger-audio Core Library
//!
//! Remote-controlled audio recording over a publish/subscribe bus. Each
//! [`RecorderModule`] owns one input device and answers commands on its own
//! topics; a [`Controller`] tracks the fleet from status messages and issues
//! commands with request/response correlation.
//!
//! # Example
//!
//! ```no_run
//! use rslogger_audio_core::{
//!     AudioSettings, Controller, ControllerOptions, CoreResult, LocalBus, ModuleId,
//!     RecorderModule, SyntheticCaptureSource,
//! };
//!
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> CoreResult<()> {
//!     let bus = LocalBus::new();
//!     let options = ControllerOptions::default();
//!
//!     let module = Arc::new(
//!         RecorderModule::new(
//!             ModuleId::new("mic1")?,
//!             &options.scheme,
//!             Arc::new(bus.connect("mic1")),
//!             AudioSettings::default(),
//!         )
//!         .with_capture(Arc::new(SyntheticCaptureSource::new())),
//!     );
//!     tokio::spawn(Arc::clone(&module).run());
//!
//!     let controller = Controller::connect(Arc::new(bus.connect("controller")), options).await?;
//!     let response = controller
//!         .start_recording(module.module_id(), Some(2.0), None)
//!         .await?;
//!
//!     println!("{}", response.message);
//!     Ok(())
//! }
//! ```

mod audio;
pub mod bus;
mod controller;
mod error;
mod module;
mod protocol;

pub use {
    audio::{
        CaptureChunk, CaptureSource, CaptureStream, CpalCaptureSource, InputDevice,
        RecordingStore, SettingsStore, SyntheticCaptureSource, WavStore, duration_seconds,
        list_input_devices,
    },
    bus::{
        BusMessage, DEFAULT_MQTT_PORT, LocalBus, LocalConnection, MessageBus, MqttBusOptions,
        MqttConnection,
    },
    controller::{
        Controller, ControllerEvent, ControllerOptions, Correlator, DEFAULT_OFFLINE_AFTER,
        DEFAULT_REQUEST_TIMEOUT, FleetOutcome, FleetReport, ModuleRecord, ModuleRegistry,
        ModuleSummary,
    },
    error::{RecorderError, Result as CoreResult},
    module::{
        DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_STOP_FLUSH_WAIT, Heartbeat, ModuleLifecycle,
        ModuleOptions, RecorderModule, SHUTDOWN_FLUSH_WAIT, StatusBeacon,
    },
    protocol::{
        AudioSettings, AudioSettingsPatch, COMMAND_KINDS, Command, CommandEnvelope,
        CommandResponse, DEFAULT_BASE_TOPIC, DEFAULT_CHANNELS, DEFAULT_SAMPLERATE, DataEvent,
        MessageKind, ModuleId, ModuleState, ModuleTopics, RECORDING_ID_FORMAT, StatusMessage,
        SUPPORTED_DTYPE, TopicScheme, generate_recording_id,
    },
};
