use std::path::Path;

use engine_logging::{engine_info, engine_warn};
use relay_engine::{AtomicFileWriter, RelaySettings};

const SETTINGS_FILENAME: &str = "relay_settings.ron";

/// Saved settings, or defaults when the file is missing or unreadable.
pub(crate) fn load_settings(config_dir: &Path) -> RelaySettings {
    let store = AtomicFileWriter::new(config_dir.to_path_buf());
    let path = store.path_of(SETTINGS_FILENAME);
    let content = match store.read(SETTINGS_FILENAME) {
        Ok(Some(text)) => text,
        Ok(None) => return RelaySettings::default(),
        Err(err) => {
            engine_warn!("Failed to read settings from {:?}: {}", path, err);
            return RelaySettings::default();
        }
    };

    match ron::from_str(&content) {
        Ok(settings) => {
            engine_info!("Loaded settings from {:?}", path);
            settings
        }
        Err(err) => {
            engine_warn!("Failed to parse settings from {:?}: {}", path, err);
            RelaySettings::default()
        }
    }
}

pub(crate) fn save_settings(config_dir: &Path, settings: &RelaySettings) -> anyhow::Result<()> {
    let pretty = ron::ser::PrettyConfig::new();
    let content = ron::ser::to_string_pretty(settings, pretty)?;
    let store = AtomicFileWriter::new(config_dir.to_path_buf());
    let path = store.write(SETTINGS_FILENAME, &content)?;
    engine_info!("Saved settings to {:?}", path);
    Ok(())
}
