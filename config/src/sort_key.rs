use serde::{
    Deserialize,
    Serialize,
};
use strum::{
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
};

/// Field the profiler statistics are ordered by, both on the server and in the rendered report.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    CumTime,
    TotalTime,
    NumCalls,
    CumTimePerCall,
    TotalTimePerCall,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}
