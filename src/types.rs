// src/types.rs
use std::path::PathBuf;

pub const CHANNEL_COUNT: usize = 2;

// 传感器通道
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum ChannelId {
    LoadCell,
    Pressure,
}

impl ChannelId {
    pub const ALL: [ChannelId; CHANNEL_COUNT] = [ChannelId::LoadCell, ChannelId::Pressure];

    pub fn index(self) -> usize {
        match self {
            ChannelId::LoadCell => 0,
            ChannelId::Pressure => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ChannelId::LoadCell => "CH0",
            ChannelId::Pressure => "CH1",
        }
    }
}

/// One aggregator tick: mean of every raw sample each channel produced in it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AggregateRecord {
    /// Seconds since the pipeline started.
    pub elapsed: f64,
    pub means: [f64; CHANNEL_COUNT],
}

// GUI 发给显示循环的配置修改，数值字段保留原始文本，由 ConfigState 校验
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigEvent {
    Gain(ChannelId, String),
    Intercept(ChannelId, String),
    AxisMax(ChannelId, String),
    AxisMin(ChannelId, String),
    SamplingRate(String),
    DisplayRate(String),
    DisplayPoints(String),
    StartSaving(PathBuf),
    StopSaving,
    StartMonitoring,
    StopMonitoring,
}

#[derive(Clone, Debug, PartialEq)]
pub enum UiEvent {
    Config(ConfigEvent),
    // 窗口关闭或取消
    Close,
}

// 显示循环发回窗口的消息
#[derive(Clone, Debug, PartialEq)]
pub enum DisplayUpdate {
    Frame(PlotFrame),
    // 保存是否真的在进行（打开失败或写入失败后会变回 false）
    RecordingStatus(bool),
}

/// Everything the plot needs for one frame, already scaled.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlotFrame {
    pub series: [Vec<[f64; 2]>; CHANNEL_COUNT],
    pub x_range: (f64, f64),
    pub y_ranges: [(f64, f64); CHANNEL_COUNT],
}
