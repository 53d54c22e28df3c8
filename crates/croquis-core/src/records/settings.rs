use std::{fmt, str::FromStr};

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// Where an overlay (timer, today's count) sits in the viewer window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverlayPosition {
    TopLeft,
    TopCenter,
    TopRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FontSize {
    Small,
    Medium,
    Large,
}

/// Keyboard bindings for the practice viewer, stored as key names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Shortcuts {
    pub next_image: String,
    pub previous_image: String,
    pub toggle_pause: String,
    pub stop_croquis: String,
}

impl Default for Shortcuts {
    fn default() -> Self {
        Self {
            next_image: "Space".to_string(),
            previous_image: "Left".to_string(),
            toggle_pause: "P".to_string(),
            stop_croquis: "Escape".to_string(),
        }
    }
}

/// User preferences. Singleton per OS user. Loading is field by field: a missing
/// or unreadable field takes its default and the rest are kept.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Settings {
    pub image_folder: String,
    pub image_width: u32,
    pub image_height: u32,
    pub grayscale: bool,
    pub flip_horizontal: bool,
    pub timer_position: OverlayPosition,
    pub timer_font_size: FontSize,
    /// Seconds per image in timed mode. Ignored in study mode, which counts up.
    pub time_seconds: u32,
    pub language: String,
    pub dark_mode: bool,
    pub study_mode: bool,
    pub today_count_position: OverlayPosition,
    pub today_count_font_size: FontSize,
    pub shortcuts: Shortcuts,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            image_folder: String::new(),
            image_width: 400,
            image_height: 700,
            grayscale: false,
            flip_horizontal: false,
            timer_position: OverlayPosition::BottomRight,
            timer_font_size: FontSize::Large,
            time_seconds: 5,
            language: "ko".to_string(),
            dark_mode: false,
            study_mode: false,
            today_count_position: OverlayPosition::TopRight,
            today_count_font_size: FontSize::Medium,
            shortcuts: Shortcuts::default(),
        }
    }
}

/// Rejected `Settings::apply` input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingError {
    #[error("unknown setting: {0}")]
    UnknownKey(String),
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

impl<'de> Deserialize<'de> for Settings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let fields = Map::<String, Value>::deserialize(deserializer)?;
        let mut settings = Settings::default();
        for (key, value) in fields {
            settings.merge_stored(&key, value);
        }
        Ok(settings)
    }
}

fn keep_if_valid<T: DeserializeOwned>(slot: &mut T, key: &str, value: Value) {
    match serde_json::from_value(value) {
        Ok(parsed) => *slot = parsed,
        Err(err) => warn!(field = key, %err, "stored setting unreadable, keeping default"),
    }
}

pub const LANGUAGES: &[&str] = &["ko", "en", "ja"];

impl Settings {
    /// Names accepted by [`Settings::apply`], in display order.
    pub const KEYS: &'static [&'static str] = &[
        "image_folder",
        "image_width",
        "image_height",
        "grayscale",
        "flip_horizontal",
        "timer_position",
        "timer_font_size",
        "time_seconds",
        "language",
        "dark_mode",
        "study_mode",
        "today_count_position",
        "today_count_font_size",
        "shortcuts.next_image",
        "shortcuts.previous_image",
        "shortcuts.toggle_pause",
        "shortcuts.stop_croquis",
    ];

    fn merge_stored(&mut self, key: &str, value: Value) {
        match key {
            "image_folder" => keep_if_valid(&mut self.image_folder, key, value),
            "image_width" => keep_if_valid(&mut self.image_width, key, value),
            "image_height" => keep_if_valid(&mut self.image_height, key, value),
            "grayscale" => keep_if_valid(&mut self.grayscale, key, value),
            "flip_horizontal" => keep_if_valid(&mut self.flip_horizontal, key, value),
            "timer_position" => keep_if_valid(&mut self.timer_position, key, value),
            "timer_font_size" => keep_if_valid(&mut self.timer_font_size, key, value),
            "time_seconds" => keep_if_valid(&mut self.time_seconds, key, value),
            "language" => keep_if_valid(&mut self.language, key, value),
            "dark_mode" => keep_if_valid(&mut self.dark_mode, key, value),
            "study_mode" => keep_if_valid(&mut self.study_mode, key, value),
            "today_count_position" | "today_croquis_count_position" => {
                keep_if_valid(&mut self.today_count_position, key, value)
            }
            "today_count_font_size" | "today_croquis_count_font_size" => {
                keep_if_valid(&mut self.today_count_font_size, key, value)
            }
            "shortcuts" => keep_if_valid(&mut self.shortcuts, key, value),
            other => debug!(field = other, "ignoring unknown stored setting"),
        }
    }

    /// Parse `value` and assign it to the field named `key`.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), SettingError> {
        match key {
            "image_folder" => self.image_folder = value.to_string(),
            "image_width" => self.image_width = parse_positive(key, value)?,
            "image_height" => self.image_height = parse_positive(key, value)?,
            "grayscale" => self.grayscale = parse_value(key, value)?,
            "flip_horizontal" => self.flip_horizontal = parse_value(key, value)?,
            "timer_position" => self.timer_position = parse_value(key, value)?,
            "timer_font_size" => self.timer_font_size = parse_value(key, value)?,
            "time_seconds" => self.time_seconds = parse_positive(key, value)?,
            "language" => {
                if !LANGUAGES.contains(&value) {
                    return Err(invalid(
                        key,
                        value,
                        format!("expected one of {}", LANGUAGES.join(", ")),
                    ));
                }
                self.language = value.to_string();
            }
            "dark_mode" => self.dark_mode = parse_value(key, value)?,
            "study_mode" => self.study_mode = parse_value(key, value)?,
            "today_count_position" => self.today_count_position = parse_value(key, value)?,
            "today_count_font_size" => self.today_count_font_size = parse_value(key, value)?,
            "shortcuts.next_image" => self.shortcuts.next_image = parse_binding(key, value)?,
            "shortcuts.previous_image" => {
                self.shortcuts.previous_image = parse_binding(key, value)?
            }
            "shortcuts.toggle_pause" => self.shortcuts.toggle_pause = parse_binding(key, value)?,
            "shortcuts.stop_croquis" => self.shortcuts.stop_croquis = parse_binding(key, value)?,
            other => return Err(SettingError::UnknownKey(other.to_string())),
        }
        Ok(())
    }
}

fn invalid(key: &str, value: &str, reason: impl Into<String>) -> SettingError {
    SettingError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, SettingError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|err: T::Err| invalid(key, value, err.to_string()))
}

fn parse_positive(key: &str, value: &str) -> Result<u32, SettingError> {
    match parse_value::<u32>(key, value)? {
        0 => Err(invalid(key, value, "must be greater than zero")),
        n => Ok(n),
    }
}

fn parse_binding(key: &str, value: &str) -> Result<String, SettingError> {
    let binding = value.trim();
    if binding.is_empty() {
        return Err(invalid(key, value, "binding cannot be empty"));
    }
    Ok(binding.to_string())
}

impl FromStr for OverlayPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('-', "_").as_str() {
            "top_left" => Ok(OverlayPosition::TopLeft),
            "top_center" => Ok(OverlayPosition::TopCenter),
            "top_right" => Ok(OverlayPosition::TopRight),
            "bottom_left" => Ok(OverlayPosition::BottomLeft),
            "bottom_center" => Ok(OverlayPosition::BottomCenter),
            "bottom_right" => Ok(OverlayPosition::BottomRight),
            _ => Err(
                "expected one of top_left, top_center, top_right, bottom_left, bottom_center, bottom_right"
                    .to_string(),
            ),
        }
    }
}

impl fmt::Display for OverlayPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OverlayPosition::TopLeft => "top_left",
            OverlayPosition::TopCenter => "top_center",
            OverlayPosition::TopRight => "top_right",
            OverlayPosition::BottomLeft => "bottom_left",
            OverlayPosition::BottomCenter => "bottom_center",
            OverlayPosition::BottomRight => "bottom_right",
        })
    }
}

impl FromStr for FontSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "small" => Ok(FontSize::Small),
            "medium" => Ok(FontSize::Medium),
            "large" => Ok(FontSize::Large),
            _ => Err("expected small, medium or large".to_string()),
        }
    }
}

impl fmt::Display for FontSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FontSize::Small => "small",
            FontSize::Medium => "medium",
            FontSize::Large => "large",
        })
    }
}
