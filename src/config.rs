//! Options store and settings
//!
//! A flat `key = value` options file plus the typed settings read from it.

use chrono::Local;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::{PopupError, Result};
use crate::params::Location;

/// Options file looked up when none is given
pub const DEFAULT_OPTIONS_FILE: &str = "popups.txt";

/// Prefix of option keys that map onto [`Settings`]
pub const SETTINGS_PREFIX: &str = "Settings.";

/// Per-user directory searched last for relative option file names
pub fn store_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("timed-popups")
}

#[derive(Debug, Default)]
struct StoreState {
    values: BTreeMap<String, String>,
    file: Option<PathBuf>,
}

/// String key/value options with typed accessors. Shared between threads;
/// reads and writes go through one lock.
#[derive(Debug, Default)]
pub struct ConfigStore {
    state: RwLock<StoreState>,
}

impl ConfigStore {
    /// An empty store with no backing file
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Parse options text into a store with no backing file
    pub fn from_text(text: &str) -> Self {
        Self {
            state: RwLock::new(StoreState {
                values: parse(text),
                file: None,
            }),
        }
    }

    /// Load an options file.
    ///
    /// A relative name is searched in the home directory, the working
    /// directory, then [`store_dir`]. When nothing is found the store starts
    /// empty and `save` creates the file in [`store_dir`]. An absolute path
    /// that does not exist also starts empty and is created on save.
    pub fn load(name: impl AsRef<Path>) -> Self {
        let name = name.as_ref();
        let (file, found) = locate(name);

        let values = match &found {
            Some(path) => match std::fs::read_to_string(path) {
                Ok(text) => {
                    let values = parse(&text);
                    info!("Loaded {} option(s) from {:?}", values.len(), path);
                    values
                }
                Err(e) => {
                    error!("Failed to read options {:?}: {}", path, e);
                    BTreeMap::new()
                }
            },
            None => {
                debug!("No options file {:?}, starting empty", name);
                BTreeMap::new()
            }
        };

        Self {
            state: RwLock::new(StoreState {
                values,
                file: Some(file),
            }),
        }
    }

    /// File used by [`save`](Self::save)
    pub fn file(&self) -> Option<PathBuf> {
        self.state.read().file.clone()
    }

    fn raw(&self, key: &str) -> Option<String> {
        self.state
            .read()
            .values
            .get(key)
            .filter(|v| !v.is_empty())
            .cloned()
    }

    /// Value of `key`, or `default` when absent or empty
    pub fn get(&self, key: &str, default: &str) -> String {
        self.raw(key).unwrap_or_else(|| default.to_string())
    }

    /// Integer value; accepts decimal, `0x`/`#` hexadecimal and a sign
    pub fn integer(&self, key: &str, default: i64) -> i64 {
        self.typed(key, default, decode_integer)
    }

    pub fn decimal(&self, key: &str, default: f64) -> f64 {
        self.typed(key, default, |raw| raw.trim().parse().ok())
    }

    /// `yes`, `true` or `on` anywhere in the value (any case) is true
    pub fn boolean(&self, key: &str, default: bool) -> bool {
        match self.raw(key) {
            Some(raw) => parse_flag(&raw),
            None => default,
        }
    }

    /// `"x,y"` value
    pub fn location(&self, key: &str, default: Location) -> Location {
        self.typed(key, default, Location::parse)
    }

    fn typed<T, F>(&self, key: &str, default: T, decode: F) -> T
    where
        F: FnOnce(&str) -> Option<T>,
    {
        let Some(raw) = self.raw(key) else {
            return default;
        };
        match decode(&raw) {
            Some(value) => value,
            None => {
                warn!("Option {} has unusable value {:?}, using default", key, raw);
                default
            }
        }
    }

    /// Set `key`, returning the previous value
    pub fn set(&self, key: &str, value: impl Into<String>) -> Option<String> {
        self.state
            .write()
            .values
            .insert(key.to_string(), value.into())
    }

    pub fn set_integer(&self, key: &str, value: i64) -> Option<String> {
        self.set(key, value.to_string())
    }

    pub fn set_decimal(&self, key: &str, value: f64) -> Option<String> {
        self.set(key, value.to_string())
    }

    pub fn set_boolean(&self, key: &str, value: bool) -> Option<String> {
        self.set(key, if value { "true" } else { "false" })
    }

    pub fn set_location(&self, key: &str, value: Location) -> Option<String> {
        self.set(key, value.to_string())
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.state.write().values.remove(key)
    }

    pub fn has_options(&self) -> bool {
        !self.state.read().values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.state.read().values.len()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_options()
    }

    /// Snapshot of every pair
    pub fn options(&self) -> BTreeMap<String, String> {
        self.state.read().values.clone()
    }

    /// Log every pair at info level
    pub fn dump(&self) {
        let state = self.state.read();
        info!(
            "Options from {:?} ({} entries)",
            state.file,
            state.values.len()
        );
        for (key, value) in &state.values {
            info!("  {} = {}", key, value);
        }
    }

    /// Write to the file the store was loaded from
    pub fn save(&self) -> Result<()> {
        let file = self.file().ok_or(PopupError::NoOptionsFile)?;
        self.save_to(&file)
    }

    /// Write to `path` and make it the store's file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = render(&self.options());
        std::fs::write(path, content)?;
        self.state.write().file = Some(path.to_path_buf());

        info!("Saved options to {:?}", path);
        Ok(())
    }

    /// Save when there is anything to save. Returns whether a file was written.
    pub fn close(&self) -> bool {
        if !self.has_options() {
            return false;
        }
        match self.save() {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to save options: {}", e);
                false
            }
        }
    }
}

/// Resolve `name` to the file it should be saved to, plus the existing file
/// to read from, if any.
fn locate(name: &Path) -> (PathBuf, Option<PathBuf>) {
    if name.is_absolute() {
        let found = name.is_file().then(|| name.to_path_buf());
        return (name.to_path_buf(), found);
    }

    let mut candidates = Vec::new();
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(name));
    }
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join(name));
    }
    let fallback = store_dir().join(name);
    candidates.push(fallback.clone());

    match candidates.into_iter().find(|p| p.is_file()) {
        Some(found) => (found.clone(), Some(found)),
        None => (fallback, None),
    }
}

fn parse(text: &str) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let (key, value) = match line.find(['=', ':']) {
            Some(at) => (&line[..at], &line[at + 1..]),
            None => (line, ""),
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        values.insert(key.to_string(), value.trim().to_string());
    }
    values
}

fn render(values: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# timed-popups options");
    let _ = writeln!(out, "# {}", Local::now().to_rfc2822());
    for (key, value) in values {
        let _ = writeln!(out, "{} = {}", key, value);
    }
    out
}

/// Decimal, `0x`/`0X`/`#` hexadecimal, with one optional leading sign
pub fn decode_integer(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };

    let (radix, body) = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .or_else(|| digits.strip_prefix('#'))
    {
        Some(hex) => (16, hex),
        None => (10, digits),
    };
    // from_str_radix takes its own sign, which would allow "--5" or "0x-5"
    if body.starts_with(['+', '-']) {
        return None;
    }

    let magnitude = i128::from_str_radix(body, radix).ok()?;
    i64::try_from(if negative { -magnitude } else { magnitude }).ok()
}

pub fn parse_flag(raw: &str) -> bool {
    let raw = raw.to_ascii_lowercase();
    ["yes", "true", "on"].iter().any(|word| raw.contains(word))
}

/// Typed settings that shape every dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Default dialog title
    pub app_name: String,
    /// Title of an input dialog that was given none
    pub input_title: String,
    /// Dialogs never time out
    pub hold_mode: bool,
    /// Frame interval of the modal loop
    pub poll_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "Timed Popups".to_string(),
            input_title: "Input request".to_string(),
            hold_mode: false,
            poll_interval_ms: 16,
        }
    }
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

type Setter = Box<dyn Fn(&mut Settings, &str) -> Result<()> + Send + Sync>;

/// Maps `Settings.*` option keys to typed setters
pub struct SettingsRegistry {
    setters: BTreeMap<&'static str, Setter>,
}

impl SettingsRegistry {
    pub fn standard() -> Self {
        let mut setters: BTreeMap<&'static str, Setter> = BTreeMap::new();
        setters.insert(
            "AppName",
            Box::new(|s, v| {
                s.app_name = v.to_string();
                Ok(())
            }),
        );
        setters.insert(
            "InputTitle",
            Box::new(|s, v| {
                s.input_title = v.to_string();
                Ok(())
            }),
        );
        setters.insert(
            "HoldMode",
            Box::new(|s, v| {
                s.hold_mode = parse_flag(v);
                Ok(())
            }),
        );
        setters.insert(
            "PollInterval",
            Box::new(|s, v| match decode_integer(v) {
                Some(ms) if ms > 0 => {
                    s.poll_interval_ms = ms as u64;
                    Ok(())
                }
                _ => Err(PopupError::InvalidSetting {
                    key: "Settings.PollInterval".to_string(),
                    value: v.to_string(),
                }),
            }),
        );
        Self { setters }
    }

    /// Full option keys this registry understands
    pub fn keys(&self) -> impl Iterator<Item = String> + '_ {
        self.setters
            .keys()
            .map(|name| format!("{}{}", SETTINGS_PREFIX, name))
    }

    /// Apply every `Settings.*` option in `store`. Returns the keys that
    /// were applied; unknown keys and bad values are logged and skipped.
    pub fn apply(&self, settings: &mut Settings, store: &ConfigStore) -> Vec<String> {
        let mut applied = Vec::new();
        for (key, value) in store.options() {
            let Some(name) = key.strip_prefix(SETTINGS_PREFIX) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            match self.setters.get(name) {
                Some(setter) => match setter(settings, &value) {
                    Ok(()) => {
                        debug!("{} = {}", key, value);
                        applied.push(key);
                    }
                    Err(e) => warn!("Skipping option: {}", e),
                },
                None => warn!("Unknown setting {}", key),
            }
        }
        applied
    }
}

/// Options plus the settings resolved from them, built once at start-up
#[derive(Debug, Clone)]
pub struct PopupContext {
    pub config: Arc<ConfigStore>,
    pub settings: Settings,
}

impl Default for PopupContext {
    fn default() -> Self {
        Self::from_store(ConfigStore::in_memory())
    }
}

impl PopupContext {
    /// Load `path`, or [`DEFAULT_OPTIONS_FILE`] when none is given
    pub fn load(path: Option<&Path>) -> Self {
        let store = ConfigStore::load(path.unwrap_or_else(|| Path::new(DEFAULT_OPTIONS_FILE)));
        Self::from_store(store)
    }

    pub fn from_store(store: ConfigStore) -> Self {
        let mut settings = Settings::default();
        SettingsRegistry::standard().apply(&mut settings, &store);
        Self {
            config: Arc::new(store),
            settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = "\
# comment
! another comment
Dialog.Anchor = 100, 200
Retries: 0x1F
Scale=1.5
Verbose = Yes please
Empty =
Settings.AppName = Deploy Bot
Settings.HoldMode = on
Settings.PollInterval = 40
Settings.Bogus = 1
";

    #[test]
    fn test_parse_formats() {
        let store = ConfigStore::from_text(SAMPLE);
        assert_eq!(store.len(), 9);
        assert_eq!(store.get("Settings.AppName", "x"), "Deploy Bot");
        assert_eq!(store.integer("Retries", 0), 31);
        assert_eq!(store.decimal("Scale", 1.0), 1.5);
        assert!(store.boolean("Verbose", false));
        assert_eq!(store.location("Dialog.Anchor", Location::default()), Location::new(100, 200));
    }

    #[test]
    fn test_empty_and_absent_use_default() {
        let store = ConfigStore::from_text(SAMPLE);
        assert_eq!(store.get("Empty", "fallback"), "fallback");
        assert_eq!(store.get("Missing", "fallback"), "fallback");
        assert!(store.boolean("Missing", true));
        assert_eq!(store.integer("Empty", 9), 9);
        // Reading a default never inserts the key
        assert_eq!(store.len(), 9);
    }

    #[test]
    fn test_unparsable_value_uses_default() {
        let store = ConfigStore::from_text("Count = many\nPos = left");
        assert_eq!(store.integer("Count", 3), 3);
        assert_eq!(store.location("Pos", Location::new(1, 2)), Location::new(1, 2));
    }

    #[test]
    fn test_decode_integer() {
        assert_eq!(decode_integer("42"), Some(42));
        assert_eq!(decode_integer("-42"), Some(-42));
        assert_eq!(decode_integer("+7"), Some(7));
        assert_eq!(decode_integer("0xff"), Some(255));
        assert_eq!(decode_integer("#10"), Some(16));
        assert_eq!(decode_integer("-0X10"), Some(-16));
        assert_eq!(decode_integer("ten"), None);
        assert_eq!(decode_integer("-9223372036854775808"), Some(i64::MIN));
        assert_eq!(decode_integer("9223372036854775808"), None);
    }

    #[test]
    fn test_decode_integer_rejects_stacked_signs() {
        for raw in ["0x-5", "--5", "+-5", "-+5", "#+1", "0X+10", "++1"] {
            assert_eq!(decode_integer(raw), None, "{}", raw);
        }
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("TRUE"));
        assert!(parse_flag("on"));
        assert!(parse_flag("yes"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("0"));
    }

    #[test]
    fn test_setters() {
        let store = ConfigStore::in_memory();
        assert!(!store.has_options());
        store.set_integer("A", -5);
        store.set_boolean("B", true);
        store.set_decimal("C", 0.25);
        assert_eq!(store.set("A", "6"), Some("-5".to_string()));
        assert_eq!(store.integer("A", 0), 6);
        assert!(store.boolean("B", false));
        assert_eq!(store.decimal("C", 0.0), 0.25);
        assert_eq!(store.remove("C"), Some("0.25".to_string()));
        assert_eq!(store.len(), 2);
        assert!(store.has_options());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("popups.txt");

        let store = ConfigStore::load(&path);
        assert!(!store.has_options());
        assert_eq!(store.file(), Some(path.clone()));

        store.set("Settings.InputTitle", "Who are you?");
        store.set_location("Dialog.Anchor", Location::new(10, 20));
        store.save().unwrap();

        let reloaded = ConfigStore::load(&path);
        assert_eq!(reloaded.options(), store.options());
        assert_eq!(
            reloaded.location("Dialog.Anchor", Location::default()),
            Location::new(10, 20)
        );
    }

    #[test]
    fn test_close_saves_only_with_options() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.txt");

        let empty = ConfigStore::load(&path);
        assert!(!empty.close());
        assert!(!path.exists());

        empty.set("Key", "value");
        assert!(empty.close());
        assert!(path.exists());
    }

    #[test]
    fn test_save_without_file_fails() {
        let store = ConfigStore::from_text("A = 1");
        assert!(matches!(store.save(), Err(PopupError::NoOptionsFile)));
        assert!(!store.close());
    }

    #[test]
    fn test_settings_registry_applies_known_keys() {
        let store = ConfigStore::from_text(SAMPLE);
        let mut settings = Settings::default();
        let applied = SettingsRegistry::standard().apply(&mut settings, &store);

        assert_eq!(applied.len(), 3);
        assert_eq!(settings.app_name, "Deploy Bot");
        assert!(settings.hold_mode);
        assert_eq!(settings.poll_interval_ms, 40);
        assert_eq!(settings.input_title, "Input request");
    }

    #[test]
    fn test_invalid_setting_is_skipped() {
        let store = ConfigStore::from_text("Settings.PollInterval = -3");
        let context = PopupContext::from_store(store);
        assert_eq!(context.settings.poll_interval_ms, 16);
    }

    #[test]
    fn test_registry_keys() {
        let keys: Vec<String> = SettingsRegistry::standard().keys().collect();
        assert!(keys.contains(&"Settings.HoldMode".to_string()));
        assert_eq!(keys.len(), 4);
    }
}
