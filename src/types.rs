// src/types.rs

// 标签页
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum Tab {
    WideSweep,
    WideResidual,
    ShortSweep,
    ShortResidual,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::WideSweep, Tab::WideResidual, Tab::ShortSweep, Tab::ShortResidual];

    pub fn title(self) -> &'static str {
        match self {
            Tab::WideSweep => "Wide sweep",
            Tab::WideResidual => "Wide residual",
            Tab::ShortSweep => "Short sweep",
            Tab::ShortResidual => "Short residual",
        }
    }
}

// 按钮触发的操作，一帧内收集，帧末统一执行
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum Action {
    OpenWide,
    FitWide,
    OpenShort,
    Refresh,
    SlopeX,
    OffsetX,
    OffsetY,
    YTail,
    FitResonance,
    ExportPng,
}
