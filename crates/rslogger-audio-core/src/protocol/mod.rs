mod command;
mod event;
mod response;
mod settings;
mod status;
mod topic;

pub use {
    command::{
        COMMAND_KINDS, Command, CommandEnvelope, RECORDING_ID_FORMAT, generate_recording_id,
    },
    event::DataEvent,
    response::CommandResponse,
    settings::{
        AudioSettings, AudioSettingsPatch, DEFAULT_CHANNELS, DEFAULT_SAMPLERATE, SUPPORTED_DTYPE,
    },
    status::{ModuleState, StatusMessage},
    topic::{DEFAULT_BASE_TOPIC, MessageKind, ModuleId, ModuleTopics, TopicScheme},
};
