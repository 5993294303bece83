// Prevent console window in addition to Slint window in Windows release builds when, e.g., starting the app via file manager. Ignored on other platforms.
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

slint::include_modules!();

use std::rc::Rc;
use std::sync::Arc;

use thermolink_common::{
    ActionQueue, ClientConfig, DisplaySink, HistoryWindow, LedInputMode, PollMode, Reading,
    SensorController, ValueStore,
};

/// The display sink of the desktop app.
///
/// The controller calls it from background threads, so it only parks the
/// values in [`ValueStore`]s. The UI timer picks them up on the UI thread.
#[derive(Clone, Default)]
struct UiSink {
    history: ValueStore<HistoryWindow>,
    status: ValueStore<(bool, String)>,
    led_ack: ValueStore<String>,
}

impl DisplaySink for UiSink {
    fn on_reading_update(&self, history: &HistoryWindow) {
        self.history.set(history.clone());
    }

    fn on_status_change(&self, connected: bool, message: &str) {
        self.status.set((connected, message.to_string()));
    }

    fn on_led_ack(&self, message: &str) {
        self.led_ack.set(message.to_string());
    }
}

/// Our App struct that holds the UI, the sensor controller and the timer
/// moving values from the sink into the UI.
struct App {
    ui: AppWindow,
    controller: Arc<SensorController>,
    sink: UiSink,
    timer: slint::Timer,
    records: Rc<slint::VecModel<SampleRecord>>,
    ticks: Rc<slint::VecModel<ChartTick>>,
}

impl App {
    const TIMER_INTERVAL: std::time::Duration = std::time::Duration::from_millis(100);

    /// Create a new App struct.
    ///
    /// Sets up the controller from `config`, prefills the address fields and
    /// wires the UI callbacks to the controller.
    fn new(config: ClientConfig) -> anyhow::Result<Self> {
        let ui = AppWindow::new()?;

        let sink = UiSink::default();
        let connector = Box::new(config.tcp_connector());
        let controller = Arc::new(SensorController::new(
            config,
            connector,
            Arc::new(sink.clone()),
        )?);

        // The controller blocks on network I/O, so actions run on a worker thread.
        let worker = ActionQueue::spawn(controller.clone())?;

        let records: Rc<slint::VecModel<SampleRecord>> = Rc::default();
        let ticks: Rc<slint::VecModel<ChartTick>> = Rc::default();

        let model = ViewModel::get(&ui);
        model.set_records(slint::ModelRc::from(records.clone()));
        model.set_ticks(slint::ModelRc::from(ticks.clone()));

        let config = controller.config();
        model.set_host(config.host.as_str().into());
        model.set_port(config.port.to_string().into());
        model.set_toggle_mode(config.poll_mode == PollMode::Toggle);
        model.set_slider_input(config.led_input == LedInputMode::Slider);

        model.on_connect({
            let worker = worker.clone();
            move |host, port| {
                let (host, port) = (host.to_string(), port.to_string());
                worker.run(move |controller| {
                    if let Err(e) = controller.connect(&host, &port) {
                        log::debug!("Connect failed: {e}");
                    }
                });
            }
        });
        model.on_disconnect({
            let worker = worker.clone();
            move || worker.run(SensorController::disconnect)
        });
        model.on_start_auto({
            let worker = worker.clone();
            move || {
                worker.run(|controller| {
                    if let Err(e) = controller.start_auto() {
                        log::debug!("Automatic reading not started: {e}");
                    }
                })
            }
        });
        model.on_stop_auto({
            let worker = worker.clone();
            move || worker.run(SensorController::stop_auto)
        });
        model.on_read_now({
            let worker = worker.clone();
            move || {
                worker.run(|controller| {
                    controller.read_now();
                })
            }
        });
        model.on_send_led_level({
            let worker = worker.clone();
            move |level| {
                // The outcome reaches the UI through the sink.
                worker.run(move |controller| {
                    let _ = controller.set_led(level.into());
                })
            }
        });
        model.on_send_led_text(move |text| {
            let text = text.to_string();
            worker.run(move |controller| {
                let _ = controller.set_led_text(&text);
            })
        });

        Ok(Self {
            ui,
            controller,
            sink,
            timer: slint::Timer::default(),
            records,
            ticks,
        })
    }

    /// Run the App: start the timer that refreshes the UI and run the event loop.
    fn run(&mut self) -> anyhow::Result<()> {
        let ui_handle = self.ui.as_weak();
        let controller = self.controller.clone();
        let sink = self.sink.clone();
        let records = self.records.clone();
        let ticks = self.ticks.clone();

        self.timer.start(
            slint::TimerMode::Repeated,
            Self::TIMER_INTERVAL,
            move || {
                let Some(ui) = ui_handle.upgrade() else {
                    return;
                };
                let model = ViewModel::get(&ui);

                if let Some(history) = sink.history.take() {
                    records.set_vec(history.iter().map(SampleRecord::from).collect::<Vec<_>>());
                    ticks.set_vec(chart_ticks(&history));
                    model.set_temperature_path(polyline(&history.temperatures(), 50.0).into());
                    model.set_humidity_path(polyline(&history.humidities(), 100.0).into());

                    if let Some(latest) = history.latest() {
                        model.set_temperature_text(slint::format!(
                            "Temperature: {:.2} °C",
                            latest.temperature_celsius()
                        ));
                        model.set_humidity_text(slint::format!(
                            "Humidity: {:.2} %",
                            latest.humidity_percent()
                        ));
                    }
                }

                if let Some((connected, message)) = sink.status.take() {
                    model.set_connected(connected);
                    model.set_status(message.into());
                }

                if let Some(ack) = sink.led_ack.take() {
                    model.set_led_ack(slint::format!("LED response: {ack}"));
                }

                model.set_auto_reading(controller.is_auto_running());
            },
        );

        // Run the UI (and map an error to an anyhow::Error).
        self.ui.run().map_err(|e| e.into())
    }
}

/// Path commands for a line through `values` in a 100x100 viewbox, oldest
/// reading on the left edge, a full window spanning the whole width.
fn polyline(values: &[f32], full_scale: f32) -> String {
    let step = 100.0 / (HistoryWindow::CAPACITY - 1) as f32;
    values
        .iter()
        .enumerate()
        .map(|(i, value)| {
            let y = 100.0 - (value / full_scale).clamp(0.0, 1.0) * 100.0;
            let command = if i == 0 { 'M' } else { 'L' };
            format!("{command} {:.2} {:.2}", i as f32 * step, y)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Time axis labels: every fourth reading, starting with the oldest.
fn chart_ticks(history: &HistoryWindow) -> Vec<ChartTick> {
    let last = (HistoryWindow::CAPACITY - 1) as f32;
    history
        .time_labels()
        .into_iter()
        .enumerate()
        .step_by(4)
        .map(|(i, label)| ChartTick {
            label: label.into(),
            position: i as f32 / last,
        })
        .collect()
}

/// Convert a reading into a record for the chart and the list.
impl From<&Reading> for SampleRecord {
    fn from(reading: &Reading) -> Self {
        Self {
            temperature_celsius: reading.temperature_celsius(),
            humidity_percent: reading.humidity_percent(),
            timestamp: reading.time_label().into(),
            label: slint::format!(
                "{}   {:.2} °C   {:.2} %",
                reading.time_label(),
                reading.temperature_celsius(),
                reading.humidity_percent()
            ),
        }
    }
}

/// A minimal main function that reads the configuration and runs the App.
fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = ClientConfig::from_env()?;
    let mut app = App::new(config)?;

    app.run()
}
