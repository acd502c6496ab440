// src/gui.rs
use eframe::egui;
use egui::{Color32, RichText};
use egui_plot::{Line, Plot, PlotBounds, PlotPoints};
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender};
use std::time::Duration;
use crate::engine::PipelineHandle;
use crate::settings::Settings;
use crate::types::*;

const WINDOW_TITLE: &str = "DigitShowBasic Mini";
// 没有新帧时也要定期唤醒，去取显示循环推来的数据
const POLL_INTERVAL: Duration = Duration::from_millis(20);
const PLOT_TITLES: [&str; CHANNEL_COUNT] = ["Load Cell (g)", "Pore Water \n Pressure Gauge (kPa)"];
const PLOT_COLORS: [Color32; CHANNEL_COUNT] = [Color32::from_rgb(0, 255, 255), Color32::YELLOW];

pub struct DigitShowApp {
    // 输入框原文，改动即发给显示循环，由 ConfigState 校验
    gain_text: [String; CHANNEL_COUNT],
    intercept_text: [String; CHANNEL_COUNT],
    axis_max_text: [String; CHANNEL_COUNT],
    axis_min_text: [String; CHANNEL_COUNT],
    sampling_rate_text: String,
    display_rate_text: String,
    display_points_text: String,

    // 记录与监视
    save_path: Option<PathBuf>,
    is_saving: bool,
    is_monitoring: bool,

    // 最近一帧
    frame: PlotFrame,

    // 关闭流程
    shutting_down: bool,
    ready_to_close: bool,

    // 通讯管道
    tx_event: Sender<UiEvent>,
    rx_frame: Receiver<DisplayUpdate>,
    pipeline: Option<PipelineHandle>,
}

impl DigitShowApp {
    pub fn new(
        settings: &Settings,
        tx_event: Sender<UiEvent>,
        rx_frame: Receiver<DisplayUpdate>,
        pipeline: PipelineHandle,
    ) -> Self {
        let channels = settings.channels;
        Self {
            gain_text: channels.map(|c| c.gain.to_string()),
            intercept_text: channels.map(|c| c.intercept.to_string()),
            axis_max_text: channels.map(|c| c.axis_max.to_string()),
            axis_min_text: channels.map(|c| c.axis_min.to_string()),
            sampling_rate_text: settings.sampling_rate_hz.to_string(),
            display_rate_text: settings.display_rate_hz.to_string(),
            display_points_text: settings.display_points.to_string(),
            save_path: None,
            is_saving: false,
            is_monitoring: true,
            frame: PlotFrame::default(),
            shutting_down: false,
            ready_to_close: false,
            tx_event,
            rx_frame,
            pipeline: Some(pipeline),
        }
    }

    fn send(&self, event: ConfigEvent) {
        if self.tx_event.send(UiEvent::Config(event)).is_err() {
            log::warn!("display loop is gone, change dropped");
        }
    }

    // 请求关闭：先取消窗口关闭，等流水线全部收尾后再真正关闭
    fn handle_close(&mut self, ctx: &egui::Context) {
        if ctx.input(|i| i.viewport().close_requested()) && !self.ready_to_close {
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            if !self.shutting_down {
                self.shutting_down = true;
                self.tx_event.send(UiEvent::Close).ok();
            }
        }
        if !self.shutting_down {
            return;
        }
        let finished = self.pipeline.as_ref().map_or(true, |p| p.is_finished());
        if finished {
            if let Some(pipeline) = self.pipeline.take() {
                pipeline.join();
            }
            self.ready_to_close = true;
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }

    fn gain_frame(&mut self, ui: &mut egui::Ui) {
        ui.label(RichText::new("Gain").strong());
        egui::Grid::new("gain_grid").num_columns(3).show(ui, |ui| {
            ui.label("");
            ui.label("Slope");
            ui.label("Intercept");
            ui.end_row();
            for ch in ChannelId::ALL {
                let i = ch.index();
                ui.label(ch.label());
                if text_box(ui, &mut self.gain_text[i]) {
                    self.send(ConfigEvent::Gain(ch, self.gain_text[i].clone()));
                }
                if text_box(ui, &mut self.intercept_text[i]) {
                    self.send(ConfigEvent::Intercept(ch, self.intercept_text[i].clone()));
                }
                ui.end_row();
            }
        });
    }

    fn adc_frame(&mut self, ui: &mut egui::Ui) {
        ui.label(RichText::new("ADC").strong());
        ui.horizontal(|ui| {
            ui.label("Sampling rate (Hz)");
            if text_box(ui, &mut self.sampling_rate_text) {
                self.send(ConfigEvent::SamplingRate(self.sampling_rate_text.clone()));
            }
        });
    }

    fn graph_frame(&mut self, ui: &mut egui::Ui) {
        ui.label(RichText::new("Graph Control").strong());
        egui::Grid::new("axis_grid").num_columns(3).show(ui, |ui| {
            ui.label("");
            ui.label("Max");
            ui.label("Min");
            ui.end_row();
            for ch in ChannelId::ALL {
                let i = ch.index();
                ui.label(ch.label());
                if text_box(ui, &mut self.axis_max_text[i]) {
                    self.send(ConfigEvent::AxisMax(ch, self.axis_max_text[i].clone()));
                }
                if text_box(ui, &mut self.axis_min_text[i]) {
                    self.send(ConfigEvent::AxisMin(ch, self.axis_min_text[i].clone()));
                }
                ui.end_row();
            }
        });
        ui.horizontal(|ui| {
            ui.label("Displayed points");
            if text_box(ui, &mut self.display_points_text) {
                self.send(ConfigEvent::DisplayPoints(self.display_points_text.clone()));
            }
        });
        ui.horizontal(|ui| {
            ui.label("Display rate (Hz)");
            if text_box(ui, &mut self.display_rate_text) {
                self.send(ConfigEvent::DisplayRate(self.display_rate_text.clone()));
            }
        });
    }

    fn record_frame(&mut self, ui: &mut egui::Ui) {
        ui.label(RichText::new("Record & Monitor").strong());
        ui.horizontal(|ui| {
            if ui.button("Start saving").clicked() {
                let picked = rfd::FileDialog::new()
                    .add_filter("csv", &["csv"])
                    .set_file_name("digitshow.csv")
                    .save_file();
                // 取消对话框不改变当前状态；是否真的在保存由显示循环回报
                if let Some(path) = picked {
                    self.send(ConfigEvent::StartSaving(path.clone()));
                    self.save_path = Some(path);
                }
            }
            if ui.add_enabled(self.is_saving, egui::Button::new("Stop saving")).clicked() {
                self.send(ConfigEvent::StopSaving);
            }
        });
        match (&self.save_path, self.is_saving) {
            (Some(path), true) => {
                ui.label(RichText::new(format!("Saving to {}", path.display())).color(Color32::RED).small());
            }
            _ => {
                ui.label(RichText::new("Not saving").small());
            }
        }
        ui.add_space(6.0);
        let monitor_txt = if self.is_monitoring { "Stop monitoring" } else { "Start monitoring" };
        if ui.button(monitor_txt).clicked() {
            if self.is_monitoring {
                self.send(ConfigEvent::StopMonitoring);
            } else {
                self.send(ConfigEvent::StartMonitoring);
            }
            self.is_monitoring = !self.is_monitoring;
        }
    }

    fn apply_update(&mut self, update: DisplayUpdate) {
        match update {
            DisplayUpdate::Frame(frame) => self.frame = frame,
            DisplayUpdate::RecordingStatus(active) => self.is_saving = active,
        }
    }

    fn draw_plot(&self, ui: &mut egui::Ui, ch: ChannelId, height: f32) {
        let i = ch.index();
        let title = PLOT_TITLES[i];
        let (x0, x1) = ordered_span(self.frame.x_range);
        let (y0, y1) = ordered_span(self.frame.y_ranges[i]);
        Plot::new(ch.label())
            .height(height)
            .x_axis_label("Time (sec)")
            .y_axis_label(title)
            .allow_drag(false)
            .allow_zoom(false)
            .allow_scroll(false)
            .allow_boxed_zoom(false)
            .show(ui, |plot_ui| {
                plot_ui.set_plot_bounds(PlotBounds::from_min_max([x0, y0], [x1, y1]));
                let points = PlotPoints::new(self.frame.series[i].clone());
                plot_ui.line(Line::new(points).name(title).color(PLOT_COLORS[i]));
            });
    }
}

fn text_box(ui: &mut egui::Ui, text: &mut String) -> bool {
    ui.add(egui::TextEdit::singleline(text).desired_width(80.0)).changed()
}

/// Plot bounds need `min < max`; swaps reversed input and widens a zero span.
fn ordered_span((a, b): (f64, f64)) -> (f64, f64) {
    if a < b {
        (a, b)
    } else if a > b {
        (b, a)
    } else {
        (a, a + 1.0)
    }
}

impl eframe::App for DigitShowApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // 1. 关闭流程
        self.handle_close(ctx);

        // 2. 只保留最新一帧和最新的保存状态
        while let Ok(update) = self.rx_frame.try_recv() {
            self.apply_update(update);
        }
        ctx.request_repaint_after(POLL_INTERVAL);

        // 3. UI 绘制
        egui::SidePanel::left("controls").min_width(280.0).show(ctx, |ui| {
            ui.add_space(10.0);
            ui.heading(WINDOW_TITLE);
            ui.separator();
            ui.add_enabled_ui(!self.shutting_down, |ui| {
                self.gain_frame(ui);
                ui.separator();
                self.adc_frame(ui);
                ui.separator();
                self.graph_frame(ui);
                ui.separator();
                self.record_frame(ui);
            });
            if self.shutting_down {
                ui.add_space(10.0);
                ui.label(RichText::new("Stopping acquisition...").color(Color32::YELLOW));
            }
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let height = (ui.available_height() / 2.0 - 8.0).max(120.0);
            for ch in ChannelId::ALL {
                self.draw_plot(ui, ch, height);
            }
        });
    }
}

impl Drop for DigitShowApp {
    // 窗口被直接销毁时兜底：通知显示循环并等待收尾
    fn drop(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            self.tx_event.send(UiEvent::Close).ok();
            pipeline.join();
        }
    }
}
