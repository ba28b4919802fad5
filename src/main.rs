#[cfg(feature = "gui")]
use eframe::egui;

#[cfg(feature = "gui")]
use beatbox::{
    midi_note_name, AudioOutput, Command, Config, MidiMessage, MidiOutputDevice, PlaybackEngine,
    PlaybackEvent, Sequencer,
};

#[cfg(feature = "gui")]
const NUM_STEPS: usize = beatbox::sequencer::NUM_STEPS;

#[cfg(feature = "gui")]
fn main() -> Result<(), eframe::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::load();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([760.0, 520.0])
            .with_title("BeatBox"),
        ..Default::default()
    };

    eframe::run_native(
        "BeatBox",
        options,
        Box::new(|_cc| Ok(Box::new(BeatBoxApp::new(config)))),
    )
}

#[cfg(not(feature = "gui"))]
fn main() {
    eprintln!("This binary requires the 'gui' feature to be enabled");
    std::process::exit(1);
}

#[cfg(feature = "gui")]
struct BeatBoxApp {
    sequencer: Sequencer<PlaybackEngine>,
    audio_output: AudioOutput,
    midi_output: MidiOutputDevice,
    config: Config,

    // UI state
    available_midi_ports: Vec<String>,
    selected_port: Option<usize>,
    current_visual_step: Option<usize>,
}

#[cfg(feature = "gui")]
impl BeatBoxApp {
    fn new(config: Config) -> Self {
        let available_midi_ports = MidiOutputDevice::available_ports();
        let mut midi_output = MidiOutputDevice::new();

        let selected_port = config.midi.port.as_deref().and_then(|name| {
            midi_output
                .connect_by_name(name)
                .map_err(|e| tracing::warn!("{}", e))
                .ok()
        });

        let audio_output = if config.audio.preview {
            AudioOutput::default()
        } else {
            AudioOutput::silent()
        };

        Self {
            sequencer: Sequencer::new(PlaybackEngine::new(), &config.playback),
            audio_output,
            midi_output,
            config,
            available_midi_ports,
            selected_port,
            current_visual_step: None,
        }
    }

    fn handle_playback_events(&mut self) {
        let events = self.sequencer.device().poll_events();

        for event in events {
            match event {
                PlaybackEvent::StepAdvanced(step) => {
                    self.current_visual_step = Some(step);
                }
                PlaybackEvent::Message(message) => self.route(message),
                PlaybackEvent::Stopped => {
                    self.current_visual_step = None;
                }
            }
        }
    }

    fn route(&mut self, message: MidiMessage) {
        if self.midi_output.is_connected() {
            if let Err(e) = self.midi_output.send(&message) {
                tracing::warn!("{}", e);
            }
        } else if let MidiMessage::NoteOn { note, velocity, .. } = message {
            self.audio_output.trigger_note(note, velocity);
        }
    }

    fn select_port(&mut self, port_idx: usize) {
        match self.midi_output.connect(port_idx) {
            Ok(()) => {
                self.selected_port = Some(port_idx);
                self.config.midi.port = self.midi_output.port_name().map(str::to_owned);
                if let Err(e) = self.config.save() {
                    tracing::warn!("Failed to save config: {}", e);
                }
            }
            Err(e) => tracing::error!("{}", e),
        }
    }

    fn buttons(&self, ui: &mut egui::Ui, commands: &mut Vec<Command>) {
        let size = egui::vec2(110.0, 28.0);

        if ui.add(egui::Button::new("Start").min_size(size)).clicked() {
            commands.push(Command::Start);
        }
        if ui.add(egui::Button::new("Stop").min_size(size)).clicked() {
            commands.push(Command::Stop);
        }
        if ui.add(egui::Button::new("Tempo Up").min_size(size)).clicked() {
            commands.push(Command::TempoUp);
        }
        if ui.add(egui::Button::new("Tempo Down").min_size(size)).clicked() {
            commands.push(Command::TempoDown);
        }
        if ui.add(egui::Button::new("Clear").min_size(size)).clicked() {
            commands.push(Command::ClearAll);
        }
        if ui.add(egui::Button::new("Save Beat").min_size(size)).clicked() {
            if let Some(path) = rfd::FileDialog::new()
                .set_directory(".")
                .set_title("Save Beat")
                .add_filter("Beat", &["json"])
                .save_file()
            {
                commands.push(Command::Save(path));
            }
        }
        if ui.add(egui::Button::new("Load Beat").min_size(size)).clicked() {
            if let Some(path) = rfd::FileDialog::new()
                .set_directory(".")
                .set_title("Load Beat")
                .add_filter("Beat", &["json"])
                .pick_file()
            {
                commands.push(Command::Load(path));
            }
        }
    }

    fn grid(&self, ui: &mut egui::Ui, commands: &mut Vec<Command>) {
        let current = if self.sequencer.playback().is_playing() {
            self.current_visual_step
        } else {
            None
        };

        egui::Grid::new("beat_grid")
            .spacing([2.0, 1.0])
            .show(ui, |ui| {
                ui.label("");
                for step in 0..NUM_STEPS {
                    let marker = if current == Some(step) { "●" } else { "" };
                    ui.colored_label(egui::Color32::from_rgb(100, 200, 100), marker);
                }
                ui.end_row();

                for (row, instrument) in self.sequencer.instruments().iter().enumerate() {
                    ui.label(instrument.name)
                        .on_hover_text(format!("Note {} ({})", instrument.note, midi_note_name(instrument.note)));

                    for step in 0..NUM_STEPS {
                        let mut checked = self.sequencer.is_set(row, step);
                        if ui.checkbox(&mut checked, "").changed() {
                            commands.push(Command::Toggle { instrument: row, step });
                        }
                    }
                    ui.end_row();
                }
            });
    }
}

#[cfg(feature = "gui")]
impl eframe::App for BeatBoxApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint();

        self.handle_playback_events();

        let mut commands = Vec::new();

        egui::SidePanel::right("transport").show(ctx, |ui| {
            ui.add_space(10.0);
            self.buttons(ui, &mut commands);
        });

        let mut selected_port_changed = None;
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label("MIDI Output:");
                if self.available_midi_ports.is_empty() {
                    ui.label("No MIDI ports available");
                } else {
                    egui::ComboBox::from_id_source("midi_port")
                        .selected_text(
                            self.selected_port
                                .and_then(|i| self.available_midi_ports.get(i))
                                .map(String::as_str)
                                .unwrap_or("Select port..."),
                        )
                        .show_ui(ui, |ui| {
                            for (i, port_name) in self.available_midi_ports.iter().enumerate() {
                                if ui
                                    .selectable_label(self.selected_port == Some(i), port_name)
                                    .clicked()
                                {
                                    selected_port_changed = Some(i);
                                }
                            }
                        });
                }

                ui.add_space(20.0);
                let playback = self.sequencer.playback();
                ui.label(format!(
                    "{:.1} BPM (x{:.3})",
                    playback.effective_bpm(),
                    playback.tempo_factor()
                ));
            });

            if !self.midi_output.is_connected() {
                let text = if self.audio_output.is_active() {
                    "⚠ No MIDI output connected - audio preview only"
                } else {
                    "⚠ No MIDI output connected"
                };
                ui.colored_label(egui::Color32::YELLOW, text);
            }
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.grid(ui, &mut commands);
        });

        if let Some(port_idx) = selected_port_changed {
            self.select_port(port_idx);
        }

        for command in commands {
            self.sequencer.handle(command);
        }
    }
}
