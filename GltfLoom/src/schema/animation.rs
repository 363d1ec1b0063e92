//! Animation clips. Parsed and validated only; nothing is played back.

use serde::Deserialize;
use serde_json::Value;

use super::Extensions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetPath {
    Translation,
    Rotation,
    Scale,
    Weights,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Interpolation {
    #[default]
    Linear,
    Step,
    Cubicspline,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelTarget {
    pub node: Option<usize>,
    pub path: TargetPath,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Channel {
    pub sampler: usize,
    pub target: ChannelTarget,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnimationSampler {
    /// Accessor of keyframe times.
    pub input: usize,
    #[serde(default)]
    pub interpolation: Interpolation,
    /// Accessor of keyframe values.
    pub output: usize,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Animation {
    pub name: Option<String>,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub samplers: Vec<AnimationSampler>,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,
}
