use crate::{
    AppError, AppResult, FileSettingsStore,
    config::Config,
    console_command::{ConsoleCommand, HELP},
};

use std::{collections::BTreeSet, path::PathBuf, sync::Arc};

use rslogger_audio_core::{
    CommandResponse, Controller, ControllerEvent, CoreResult, FleetReport, LocalBus, MessageBus,
    MessageKind, ModuleId, MqttConnection, RecorderModule, SettingsStore, StatusMessage,
    SyntheticCaptureSource,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast,
    task::JoinHandle,
};
use tracing::{error, info, instrument, warn};

/// A recording module running on the in-process bus.
struct RunningModule {
    module: Arc<RecorderModule>,
    task: JoinHandle<CoreResult<()>>,
}

/// Entry points for the three ways of running: a whole fleet on one
/// in-process bus, or a single module or controller on an MQTT broker.
pub(crate) struct App {
    pub(crate) config: Config,
    pub(crate) config_path: PathBuf,
    pub(crate) module_ids: Vec<ModuleId>,
    pub(crate) synthetic: bool,
}

impl App {
    /// Validate and collect the module ids named on the command line.
    #[track_caller]
    pub(crate) fn parse_module_ids(names: &[String]) -> AppResult<Vec<ModuleId>> {
        let mut seen = BTreeSet::new();
        let mut ids = Vec::with_capacity(names.len());

        for name in names {
            let id = ModuleId::new(name.as_str())?;
            if !seen.insert(id.clone()) {
                return Err(AppError::config(format!("Module '{id}' named twice")));
            }
            ids.push(id);
        }

        Ok(ids)
    }

    /// MQTT client id of a module process.
    pub(crate) fn module_client_id(module_id: &ModuleId) -> String {
        format!("rslogger-audio-{module_id}")
    }

    /// MQTT client id of a controller process; unique per process so several
    /// consoles can watch one fleet.
    pub(crate) fn controller_client_id() -> String {
        format!("rslogger-audio-controller-{}", std::process::id())
    }

    fn build_module(
        &self,
        module_id: ModuleId,
        bus: Arc<dyn MessageBus>,
        settings_store: Arc<dyn SettingsStore>,
    ) -> RecorderModule {
        let module = RecorderModule::new(
            module_id,
            &self.config.scheme(),
            bus,
            self.config.audio.clone(),
        )
        .with_settings_store(settings_store)
        .with_options(self.config.module_options());

        if self.synthetic {
            module.with_capture(Arc::new(SyntheticCaptureSource::new()))
        } else {
            module
        }
    }

    /// Run the fleet until `quit`, end of input, or ctrl-c.
    #[instrument(skip(self), fields(modules = self.module_ids.len(), synthetic = self.synthetic))]
    pub(crate) async fn run_fleet(self) -> AppResult<()> {
        info!("rslogger-audio fleet starting");

        let bus = LocalBus::new();
        let scheme = self.config.scheme();

        // Controller first so it sees every module's initial status.
        let controller = Controller::connect(
            Arc::new(bus.connect("controller")),
            self.config.controller_options(),
        )
        .await?;
        let mut events = controller.subscribe_events();

        let settings_store: Arc<dyn SettingsStore> =
            Arc::new(FileSettingsStore::new(self.config_path.clone()));
        let modules: Vec<RunningModule> = self
            .module_ids
            .iter()
            .map(|id| {
                let module = Arc::new(self.build_module(
                    id.clone(),
                    Arc::new(bus.connect(id.as_str())),
                    Arc::clone(&settings_store),
                ));
                let task = tokio::spawn(Arc::clone(&module).run());
                RunningModule { module, task }
            })
            .collect();

        println!("{} module(s) on {}/+; type 'help' for commands", modules.len(), scheme.base());

        let console = run_console(&controller, &mut events).await;

        info!("Shutting down fleet");
        for running in &modules {
            running.module.shutdown();
        }
        for running in modules {
            let module_id = running.module.module_id().clone();
            match running.task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(module_id = %module_id, error = ?e, "Module failed"),
                Err(e) => error!(module_id = %module_id, error = ?e, "Module task panicked"),
            }
        }
        controller.shutdown().await;

        info!("rslogger-audio fleet stopped");

        console
    }

    /// Serve one module on the MQTT broker until ctrl-c or a `shutdown`
    /// command.
    #[instrument(skip(self), fields(synthetic = self.synthetic))]
    pub(crate) async fn run_module(self) -> AppResult<()> {
        let [module_id] = self.module_ids.as_slice() else {
            return Err(AppError::config("The module command runs exactly one module"));
        };
        let module_id = module_id.clone();

        let will = StatusMessage::disconnected(&module_id, self.config.audio.clone()).encode()?;
        let options = self
            .config
            .bus
            .mqtt_options(Self::module_client_id(&module_id))
            .with_last_will(self.config.scheme().topic(&module_id, MessageKind::Status), will);
        let connection = Arc::new(MqttConnection::connect(options).await?);

        let settings_store: Arc<dyn SettingsStore> =
            Arc::new(FileSettingsStore::new(self.config_path.clone()));
        let module = Arc::new(self.build_module(
            module_id.clone(),
            Arc::clone(&connection) as Arc<dyn MessageBus>,
            settings_store,
        ));
        let mut task = tokio::spawn(Arc::clone(&module).run());

        println!(
            "Module {module_id} on {}:{} under {}; ctrl-c to stop",
            self.config.bus.host,
            self.config.bus.port,
            self.config.scheme().base()
        );

        let finished = tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "Signal handler failed, shutting down");
                }
                info!("Interrupt received");
                module.shutdown();
                None
            }
            result = &mut task => Some(result),
        };

        let result = match finished {
            Some(result) => result,
            None => task.await,
        };

        connection.disconnect().await;
        info!(module_id = %module_id, "Module process stopped");

        match result {
            Ok(outcome) => outcome.map_err(AppError::from),
            Err(e) => {
                error!(module_id = %module_id, error = ?e, "Module task panicked");
                Err(AppError::config(format!("Module {module_id} stopped abnormally: {e}")))
            }
        }
    }

    /// Controller console on the MQTT broker until `quit`, end of input, or
    /// ctrl-c.
    #[instrument(skip(self))]
    pub(crate) async fn run_controller(self) -> AppResult<()> {
        let options = self.config.bus.mqtt_options(Self::controller_client_id());
        let connection = Arc::new(MqttConnection::connect(options).await?);

        let controller = Controller::connect(
            Arc::clone(&connection) as Arc<dyn MessageBus>,
            self.config.controller_options(),
        )
        .await?;
        let mut events = controller.subscribe_events();

        println!(
            "Controller on {}:{} watching {}/+; type 'help' for commands",
            self.config.bus.host,
            self.config.bus.port,
            self.config.scheme().base()
        );

        let console = run_console(&controller, &mut events).await;

        controller.shutdown().await;
        connection.disconnect().await;
        info!("Controller stopped");

        console
    }
}

async fn run_console(
    controller: &Controller,
    events: &mut broadcast::Receiver<ControllerEvent>,
) -> AppResult<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            biased;

            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Interrupt received");
                return Ok(());
            }

            event = events.recv() => match event {
                Ok(event) => print_event(&event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Console fell behind controller events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    warn!("Controller event stream closed");
                    return Ok(());
                }
            },

            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("Console input closed");
                    return Ok(());
                };

                match ConsoleCommand::parse(&line) {
                    Ok(Some(ConsoleCommand::Quit)) => return Ok(()),
                    Ok(Some(command)) => execute(controller, command).await,
                    Ok(None) => {}
                    Err(e) => println!("{e}"),
                }
            }
        }
    }
}

async fn execute(controller: &Controller, command: ConsoleCommand) {
    match command {
        ConsoleCommand::Status => {
            let modules = controller.modules().await;
            if modules.is_empty() {
                println!("No modules discovered yet");
            }
            for summary in modules {
                println!(
                    "{:<12} {:<12} {:<8} seen {:>5.1}s ago{}{}",
                    summary.module_id.as_str(),
                    summary.state.to_string(),
                    if summary.online { "online" } else { "offline" },
                    summary.last_seen_secs,
                    summary
                        .recording_id
                        .map(|id| format!("  recording {id}"))
                        .unwrap_or_default(),
                    summary
                        .error
                        .map(|e| format!("  error: {e}"))
                        .unwrap_or_default(),
                );
            }
        }
        ConsoleCommand::StartAll { duration } => {
            print_report("start-all", &controller.start_all(duration).await);
        }
        ConsoleCommand::StopAll => {
            print_report("stop-all", &controller.stop_all().await);
        }
        ConsoleCommand::Start {
            module_id,
            duration,
        } => {
            let result = controller.start_recording(&module_id, duration, None).await;
            print_response(&module_id, result);
        }
        ConsoleCommand::Stop { module_id } => {
            let result = controller.stop_recording(&module_id).await;
            print_response(&module_id, result);
        }
        ConsoleCommand::Config {
            module_id,
            patch,
            save,
        } => {
            let result = controller.update_config(&module_id, patch, save).await;
            print_response(&module_id, result);
        }
        ConsoleCommand::Ping { module_id } => {
            let result = controller.request_status(&module_id).await;
            print_response(&module_id, result);
        }
        ConsoleCommand::Shutdown { module_id } => {
            let result = controller.shutdown_module(&module_id).await;
            print_response(&module_id, result);
        }
        ConsoleCommand::Help => println!("{HELP}"),
        ConsoleCommand::Quit => {}
    }
}

fn print_response(module_id: &ModuleId, result: CoreResult<CommandResponse>) {
    match result {
        Ok(response) => {
            let verdict = if response.success { "ok" } else { "rejected" };
            match response.data {
                Some(data) => println!("{module_id}: {verdict}: {} {data}", response.message),
                None => println!("{module_id}: {verdict}: {}", response.message),
            }
        }
        Err(e) => println!("{module_id}: unreachable: {e}"),
    }
}

fn print_report(operation: &str, report: &FleetReport) {
    if report.is_empty() {
        println!("{operation}: no eligible modules");
        return;
    }

    match &report.recording_id {
        Some(recording_id) => println!(
            "{operation} ({recording_id}): {}/{} accepted",
            report.accepted_count(),
            report.outcomes.len()
        ),
        None => println!(
            "{operation}: {}/{} accepted",
            report.accepted_count(),
            report.outcomes.len()
        ),
    }
    for (module_id, outcome) in &report.outcomes {
        let verdict = if outcome.is_success() { "ok" } else { "failed" };
        println!("  {module_id}: {verdict}: {}", outcome.message());
    }
}

fn print_event(event: &ControllerEvent) {
    match event {
        ControllerEvent::ModuleDiscovered { module_id } => {
            println!("module {module_id} discovered");
        }
        ControllerEvent::RecordingComplete {
            module_id,
            recording_id,
            filename,
            duration_seconds,
        } => match duration_seconds {
            Some(secs) => println!(
                "module {module_id} finished {recording_id}: {filename} ({secs:.1}s)"
            ),
            None => println!("module {module_id} finished {recording_id}: {filename}"),
        },
    }
}
