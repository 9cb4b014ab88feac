use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Fixed backend endpoint; established once per client lifetime.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Input device name; empty means the host default.
    #[serde(default)]
    pub mic_device: String,
}

impl Settings {
    /// The microphone to capture from, `None` for the host default.
    pub fn mic_device(&self) -> Option<&str> {
        if self.mic_device.is_empty() {
            None
        } else {
            Some(self.mic_device.as_str())
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            mic_device: String::new(),
        }
    }
}

fn default_server_url() -> String {
    "ws://localhost:5173/ws/voice".into()
}

pub fn settings_path() -> Result<PathBuf, String> {
    if let Some(dir) = dirs::data_local_dir() {
        return Ok(dir.join("VoiceChat").join("settings.json"));
    }
    if let Some(home) = dirs::home_dir() {
        return Ok(home.join(".voicechat").join("settings.json"));
    }
    Err("Failed to resolve data directory".into())
}

pub fn load() -> Settings {
    let path = match settings_path() {
        Ok(p) => p,
        Err(_) => return Settings::default(),
    };
    match fs::read_to_string(&path) {
        Ok(text) => serde_json::from_str(&text).unwrap_or_default(),
        Err(_) => Settings::default(),
    }
}

pub fn save(settings: &Settings) -> Result<(), String> {
    let path = settings_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create settings dir: {}", e))?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {}", e))?;
    fs::write(&path, json).map_err(|e| format!("Failed to write settings: {}", e))?;
    Ok(())
}
