#![allow(clippy::unwrap_used)]

use crate::{
    AudioSettings, CaptureChunk, CaptureSource, CaptureStream, CoreResult, LocalBus,
    LocalConnection, MessageBus, ModuleId, ModuleOptions, ModuleState, RecorderError,
    RecorderModule, RecordingStore, SettingsStore, SyntheticCaptureSource, TopicScheme,
    bus::BusMessage, duration_seconds,
};

use std::{
    collections::VecDeque,
    future::Future,
    panic::Location,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use error_location::ErrorLocation;
use serde_json::Value;
use tokio::task::JoinHandle;

pub(crate) const WAIT: Duration = Duration::from_secs(5);

/// Small sample rate so real-time synthetic captures stay cheap.
pub(crate) fn test_settings() -> AudioSettings {
    AudioSettings {
        samplerate: 8_000,
        ..AudioSettings::default()
    }
}

pub(crate) fn module_id(id: &str) -> ModuleId {
    ModuleId::new(id).unwrap()
}

/// Records every save instead of touching the filesystem.
#[derive(Default)]
pub(crate) struct MemoryStore {
    pub(crate) saved: Mutex<Vec<(PathBuf, usize)>>,
}

impl MemoryStore {
    pub(crate) fn saves(&self) -> Vec<(PathBuf, usize)> {
        self.saved.lock().unwrap().clone()
    }
}

impl RecordingStore for MemoryStore {
    fn save(&self, samples: &[f32], settings: &AudioSettings, path: &Path) -> CoreResult<f64> {
        self.saved
            .lock()
            .unwrap()
            .push((path.to_path_buf(), samples.len()));
        Ok(duration_seconds(samples.len(), settings))
    }
}

/// Remembers every settings snapshot it was asked to persist.
#[derive(Default)]
pub(crate) struct MemorySettingsStore {
    pub(crate) saved: Mutex<Vec<AudioSettings>>,
}

impl SettingsStore for MemorySettingsStore {
    fn save(&self, settings: &AudioSettings) -> CoreResult<()> {
        self.saved.lock().unwrap().push(settings.clone());
        Ok(())
    }
}

/// A source whose device can never be opened.
pub(crate) struct FailingCaptureSource;

impl CaptureSource for FailingCaptureSource {
    fn open(&self, _settings: &AudioSettings) -> CoreResult<Box<dyn CaptureStream>> {
        Err(RecorderError::NoMicrophoneFound {
            location: ErrorLocation::from(Location::caller()),
        })
    }
}

/// Replays a fixed list of chunks, then reports the stream as ended.
pub(crate) struct ScriptedSource {
    script: Mutex<Option<Vec<CoreResult<CaptureChunk>>>>,
}

impl ScriptedSource {
    pub(crate) fn new(script: Vec<CoreResult<CaptureChunk>>) -> Self {
        Self {
            script: Mutex::new(Some(script)),
        }
    }
}

impl CaptureSource for ScriptedSource {
    fn open(&self, _settings: &AudioSettings) -> CoreResult<Box<dyn CaptureStream>> {
        let script = self.script.lock().unwrap().take().unwrap_or_default();
        Ok(Box::new(ScriptedStream {
            chunks: script.into(),
        }))
    }
}

struct ScriptedStream {
    chunks: VecDeque<CoreResult<CaptureChunk>>,
}

impl CaptureStream for ScriptedStream {
    fn next_chunk(&mut self, _timeout: Duration) -> CoreResult<CaptureChunk> {
        self.chunks.pop_front().unwrap_or(Ok(CaptureChunk::Ended))
    }
}

pub(crate) fn quiet_options() -> ModuleOptions {
    ModuleOptions {
        heartbeat_interval: None,
        ..ModuleOptions::default()
    }
}

/// Build a module with a synthetic source and memory store, start it, and
/// wait until it has attached.
pub(crate) async fn spawn_module(
    bus: &LocalBus,
    scheme: &TopicScheme,
    id: &str,
    capture: Arc<dyn CaptureSource>,
) -> (Arc<RecorderModule>, Arc<MemoryStore>, JoinHandle<CoreResult<()>>) {
    let store = Arc::new(MemoryStore::default());
    let module = Arc::new(
        RecorderModule::new(
            module_id(id),
            scheme,
            Arc::new(bus.connect(id)),
            test_settings(),
        )
        .with_capture(capture)
        .with_store(Arc::clone(&store) as Arc<dyn RecordingStore>)
        .with_options(quiet_options()),
    );

    let handle = tokio::spawn(Arc::clone(&module).run());
    wait_for_state(&module, ModuleState::Idle).await;

    (module, store, handle)
}

pub(crate) async fn spawn_synthetic(
    bus: &LocalBus,
    scheme: &TopicScheme,
    id: &str,
) -> (Arc<RecorderModule>, Arc<MemoryStore>, JoinHandle<CoreResult<()>>) {
    spawn_module(bus, scheme, id, Arc::new(SyntheticCaptureSource::new())).await
}

pub(crate) async fn wait_for_state(module: &RecorderModule, state: ModuleState) {
    eventually(move || async move { module.state().await == state }).await;
}

/// Poll `check` until it holds or the test deadline passes.
pub(crate) async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let polled = tokio::time::timeout(WAIT, async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    assert!(polled.is_ok(), "condition not reached within {:?}", WAIT);
}

/// Client that watches `patterns` and publishes raw commands.
pub(crate) async fn observer(bus: &LocalBus, patterns: &[String]) -> LocalConnection {
    let connection = bus.connect("observer");
    for pattern in patterns {
        connection.subscribe(pattern).await.unwrap();
    }
    connection
}

pub(crate) async fn publish_json(connection: &LocalConnection, topic: &str, value: Value) {
    connection
        .publish(topic, serde_json::to_vec(&value).unwrap())
        .await
        .unwrap();
}

pub(crate) async fn next_message(connection: &LocalConnection) -> BusMessage {
    tokio::time::timeout(WAIT, connection.next_message())
        .await
        .unwrap()
        .unwrap()
}

/// Next message on `topic`, skipping anything else the observer sees.
pub(crate) async fn next_on(connection: &LocalConnection, topic: &str) -> Value {
    loop {
        let message = next_message(connection).await;
        if message.topic == topic {
            return serde_json::from_slice(&message.payload).unwrap();
        }
    }
}

/// Next status on `topic` whose state is `state`.
pub(crate) async fn next_status_in(
    connection: &LocalConnection,
    topic: &str,
    state: ModuleState,
) -> Value {
    loop {
        let status = next_on(connection, topic).await;
        if status["state"] == state.as_str() {
            return status;
        }
    }
}
