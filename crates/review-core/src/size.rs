// SPDX-License-Identifier: MIT OR Apache-2.0
//! Size presets: named (width, height) pairs controlling the render
//! viewport and output dimensions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named (width, height) pair. See `spec.md` §4.4 for the exact values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizePreset {
    /// 1080×1080
    Square,
    /// 1080×1350
    Portrait,
    /// 1080×1920
    Story,
    /// 1200×630
    Landscape,
}

impl SizePreset {
    /// All four presets, for iteration (e.g. `/api/sizes`).
    pub const ALL: [SizePreset; 4] = [
        SizePreset::Square,
        SizePreset::Portrait,
        SizePreset::Story,
        SizePreset::Landscape,
    ];

    /// (width, height) in pixels for this preset.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Square => (1080, 1080),
            Self::Portrait => (1080, 1350),
            Self::Story => (1080, 1920),
            Self::Landscape => (1200, 630),
        }
    }

    /// Parse a preset name (the same spelling used in [`fmt::Display`]).
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "square" => Some(Self::Square),
            "portrait" => Some(Self::Portrait),
            "story" => Some(Self::Story),
            "landscape" => Some(Self::Landscape),
            _ => None,
        }
    }
}

impl Default for SizePreset {
    fn default() -> Self {
        Self::Square
    }
}

impl fmt::Display for SizePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Square => "square",
            Self::Portrait => "portrait",
            Self::Story => "story",
            Self::Landscape => "landscape",
        };
        f.write_str(s)
    }
}
