// src/main.rs
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]
mod drivers;
mod engine;
mod gui;
mod recorder;
mod settings;
mod types;
use std::sync::mpsc;
use anyhow::anyhow;
use eframe::egui;
use crate::settings::Settings;
// 窗口来不及取走的帧直接丢弃
const FRAME_QUEUE: usize = 4;
// 入口函数
fn main() -> anyhow::Result<()> {
    env_logger::init();
    let settings = Settings::load()?;
    let (tx_event, rx_event) = mpsc::channel();
    let (tx_frame, rx_frame) = mpsc::sync_channel(FRAME_QUEUE);
    // 传感器初始化失败直接退出，不打开窗口
    let pipeline = engine::start(&settings, rx_event, tx_frame).map_err(|e| {
        log::error!("startup failed: {e:#}");
        e
    })?;
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1280.0, 800.0])
        .with_min_inner_size([960.0, 600.0])
        .with_title("DigitShowBasic Mini");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native(
        "DigitShow Mini",
        options,
        Box::new(move |_cc| {
            Box::new(gui::DigitShowApp::new(&settings, tx_event, rx_frame, pipeline))
        }),
    )
    .map_err(|e| anyhow!("window failed: {e}"))
}
