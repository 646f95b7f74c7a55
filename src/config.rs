//! Emulator configuration read through the setting resolver.
//!
//! Every known key has a compile-time entry describing its kind. Every key
//! also has a bundled default that stands in for it when the store is
//! silent, the same way each native setting carries its own default.
use crate::converters::parse_settings_object;
use crate::settings::{SettingKind, SettingResolver, SettingValue};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use phf::phf_map;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettingSpec {
    pub kind: SettingKind,
    pub scale: f32,
}

impl SettingSpec {
    const fn plain(kind: SettingKind) -> Self {
        SettingSpec { kind, scale: 1.0 }
    }

    const fn scaled(scale: f32) -> Self {
        SettingSpec {
            kind: SettingKind::ScaledFloat,
            scale,
        }
    }
}

const BOOL: SettingSpec = SettingSpec::plain(SettingKind::Boolean);
const INT: SettingSpec = SettingSpec::plain(SettingKind::Integer);
const STR: SettingSpec = SettingSpec::plain(SettingKind::String);

// Compile-time key registry (zero allocation)
pub static KNOWN_SETTINGS: phf::Map<&'static str, SettingSpec> = phf_map! {
    "use_artic_base_controller" => BOOL,
    "use_cpu_jit" => BOOL,
    "cpu_clock_percentage" => INT,
    "use_gles" => BOOL,
    "shaders_accurate_mul" => BOOL,
    "graphics_api" => INT,
    "async_presentation" => BOOL,
    "async_shader_compilation" => BOOL,
    "spirv_shader_gen" => BOOL,
    "use_hw_shader" => BOOL,
    "use_shader_jit" => BOOL,
    "resolution_factor" => INT,
    "use_disk_shader_cache" => BOOL,
    "use_vsync_new" => BOOL,
    "texture_filter" => INT,
    "texture_sampling" => INT,
    "use_frame_limit" => BOOL,
    "frame_limit" => INT,
    "render_3d" => INT,
    "factor_3d" => INT,
    "filter_mode" => BOOL,
    "bg_red" => INT,
    "bg_green" => INT,
    "bg_blue" => INT,
    "delay_game_render_thread_us" => INT,
    "disable_right_eye_render" => BOOL,
    "layout_option" => INT,
    "small_screen_position" => INT,
    "portrait_layout_option" => INT,
    "dump_textures" => BOOL,
    "custom_textures" => BOOL,
    "preload_textures" => BOOL,
    "async_custom_loading" => BOOL,
    "audio_emulation" => INT,
    "enable_audio_stretching" => BOOL,
    "enable_realtime_audio" => BOOL,
    "volume" => SettingSpec::scaled(100.0),
    "output_type" => INT,
    "output_device" => STR,
    "input_type" => INT,
    "input_device" => STR,
    "use_virtual_sd" => BOOL,
    "is_new_3ds" => BOOL,
    "lle_applets" => BOOL,
    "region_value" => INT,
    "init_clock" => INT,
    "init_time" => STR,
    "plugin_loader_enabled" => BOOL,
    "allow_plugin_loader" => BOOL,
    "steps_per_hour" => INT,
    "log_filter" => STR,
    "log_regex_filter" => STR,
    "record_frame_times" => BOOL,
    "renderer_debug" => BOOL,
    "use_gdbstub" => BOOL,
    "gdbstub_port" => INT,
    "instant_debug_log" => BOOL,
    "web_api_url" => STR,
    "citra_username" => STR,
    "citra_token" => STR,
};

/// Bundled defaults, parsed on first use.
pub static DEFAULT_SETTINGS: Lazy<IndexMap<String, serde_json::Value>> = Lazy::new(|| {
    parse_settings_object(include_str!("default_settings.json")).unwrap_or_else(|e| {
        log::error!("Bundled default settings are unreadable: {e}");
        IndexMap::new()
    })
});

/// Divisor applied to scaled-float reads of `key`; 1.0 for unregistered keys.
pub fn scale_for(key: &str) -> f32 {
    KNOWN_SETTINGS
        .get(key)
        .map(|spec| spec.scale)
        .filter(|scale| *scale != 0.0)
        .unwrap_or(1.0)
}

pub const LAYOUT_LARGE_SCREEN: i32 = 2;
const LAYOUT_MAX: i32 = 5;
const DEFAULT_INIT_TIME: u64 = 946_681_277;

const STEREO_ANAGLYPH: i32 = 2;
const STEREO_INTERLACED: i32 = 3;

/// Snapshot of the settings the emulator core consumes at boot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmulatorConfig {
    pub use_cpu_jit: bool,
    pub cpu_clock_percentage: i32,
    pub use_gles: bool,
    pub shaders_accurate_mul: bool,
    pub graphics_api: i32,
    pub use_hw_shader: bool,
    pub resolution_factor: i32,
    pub use_disk_shader_cache: bool,
    pub use_vsync: bool,
    pub frame_limit: i32,
    pub render_3d: i32,
    pub factor_3d: i32,
    pub pp_shader_name: String,
    pub layout_option: i32,
    pub volume: f32,
    pub enable_audio_stretching: bool,
    pub output_device: String,
    pub is_new_3ds: bool,
    pub region_value: i32,
    pub init_time: u64,
    pub log_filter: String,
    pub gdbstub_port: i32,
    pub web_api_url: String,
    pub citra_username: String,
    pub citra_token: String,
}

/// Typed reads with caller-supplied placeholders.
pub struct ConfigReader<'a> {
    settings: &'a SettingResolver,
}

impl<'a> ConfigReader<'a> {
    pub fn new(settings: &'a SettingResolver) -> Self {
        ConfigReader { settings }
    }

    pub fn boolean_or(&self, key: &str, placeholder: bool) -> bool {
        self.settings
            .lookup(key, SettingKind::Boolean)
            .and_then(|v| v.as_bool())
            .unwrap_or(placeholder)
    }

    pub fn integer_or(&self, key: &str, placeholder: i32) -> i32 {
        self.settings
            .lookup(key, SettingKind::Integer)
            .and_then(|v| v.as_int())
            .unwrap_or(placeholder)
    }

    /// Only scaled floats are stored natively; plain float reads always
    /// yield the placeholder.
    pub fn float_or(&self, key: &str, scaled: bool, placeholder: f32) -> f32 {
        if !scaled {
            return placeholder;
        }
        self.settings
            .lookup(key, SettingKind::ScaledFloat)
            .and_then(|v| v.as_float())
            .unwrap_or(placeholder)
    }

    pub fn string_or(&self, key: &str, placeholder: &str) -> String {
        match self.settings.lookup(key, SettingKind::String) {
            Some(SettingValue::String(s)) => s,
            _ => placeholder.to_string(),
        }
    }

    /// Reads a registered key, falling back to its bundled default.
    fn value(&self, key: &str) -> SettingValue {
        let kind = KNOWN_SETTINGS.get(key).map(|spec| spec.kind).unwrap_or_else(|| {
            log::warn!("ConfigReader: '{key}' is not a registered setting");
            SettingKind::String
        });
        self.settings
            .lookup(key, kind)
            .or_else(|| bundled_default(key, kind))
            .unwrap_or_else(|| SettingValue::zero(kind))
    }

    fn boolean(&self, key: &str) -> bool {
        self.value(key).as_bool().unwrap_or(false)
    }

    fn integer(&self, key: &str) -> i32 {
        self.value(key).as_int().unwrap_or(0)
    }

    fn float(&self, key: &str) -> f32 {
        self.value(key).as_float().unwrap_or(0.0)
    }

    fn string(&self, key: &str) -> String {
        self.value(key).as_str().unwrap_or_default().to_string()
    }

    pub fn read(&self) -> EmulatorConfig {
        // The front-end stores the limiter switch separately from its value.
        let frame_limit = if self.boolean_or("use_frame_limit", true) {
            self.integer("frame_limit")
        } else {
            0
        };

        // Older config files may hold layouts that no longer exist.
        let mut layout_option = self.integer("layout_option");
        if !(0..=LAYOUT_MAX).contains(&layout_option) {
            layout_option = LAYOUT_LARGE_SCREEN;
        }

        let render_3d = self.integer("render_3d");
        let pp_shader_name = match render_3d {
            STEREO_ANAGLYPH => "dubois (builtin)",
            STEREO_INTERLACED => "horizontal (builtin)",
            _ => "none (builtin)",
        }
        .to_string();

        let init_time = self
            .string("init_time")
            .trim()
            .parse::<u64>()
            .unwrap_or(DEFAULT_INIT_TIME);

        let config = EmulatorConfig {
            use_cpu_jit: self.boolean("use_cpu_jit"),
            cpu_clock_percentage: self.integer("cpu_clock_percentage"),
            use_gles: self.boolean_or("use_gles", true),
            shaders_accurate_mul: self.boolean_or("shaders_accurate_mul", false),
            graphics_api: self.integer("graphics_api"),
            use_hw_shader: self.boolean("use_hw_shader"),
            resolution_factor: self.integer("resolution_factor"),
            use_disk_shader_cache: self.boolean("use_disk_shader_cache"),
            use_vsync: self.boolean("use_vsync_new"),
            frame_limit,
            render_3d,
            factor_3d: self.integer("factor_3d"),
            pp_shader_name,
            layout_option,
            volume: self.float("volume"),
            enable_audio_stretching: self.boolean("enable_audio_stretching"),
            output_device: self.string("output_device"),
            is_new_3ds: self.boolean("is_new_3ds"),
            region_value: self.integer("region_value"),
            init_time,
            log_filter: self.string("log_filter"),
            gdbstub_port: self.integer("gdbstub_port"),
            web_api_url: self.string_or("web_api_url", "https://api.citra-emu.org"),
            citra_username: self.string_or("citra_username", "AZAHAR"),
            citra_token: self.string_or("citra_token", ""),
        };
        log::debug!("ConfigReader: read {:?}", config);
        config
    }
}

fn bundled_default(key: &str, kind: SettingKind) -> Option<SettingValue> {
    let raw = DEFAULT_SETTINGS.get(key)?;
    match crate::converters::json_to_setting(raw, kind)? {
        SettingValue::ScaledFloat(f) => Some(SettingValue::ScaledFloat(f / scale_for(key))),
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemorySettingStore;

    fn settings(json: &str) -> SettingResolver {
        SettingResolver::from_store(MemorySettingStore::from_json_str(json).unwrap())
    }

    #[test]
    fn every_bundled_default_is_registered_with_matching_kind() {
        assert_eq!(DEFAULT_SETTINGS.len(), KNOWN_SETTINGS.len());
        for (key, raw) in DEFAULT_SETTINGS.iter() {
            let spec = KNOWN_SETTINGS.get(key.as_str());
            assert!(spec.is_some(), "{key} missing from registry");
            let kind = spec.map(|s| s.kind).unwrap();
            assert!(
                crate::converters::json_to_setting(raw, kind).is_some(),
                "{key} default does not read as {kind:?}"
            );
        }
    }

    #[test]
    fn placeholders_apply_only_when_absent() {
        let settings = settings(r#"{"use_gles": false, "layout_option": 4}"#);
        let reader = ConfigReader::new(&settings);
        assert!(!reader.boolean_or("use_gles", true));
        assert!(reader.boolean_or("missing", true));
        assert_eq!(reader.integer_or("layout_option", 0), 4);
        assert_eq!(reader.integer_or("missing", 7), 7);
        assert_eq!(reader.string_or("missing", "ndk"), "ndk");
    }

    #[test]
    fn unscaled_float_reads_use_placeholder() {
        let settings = settings(r#"{"volume": 80}"#);
        let reader = ConfigReader::new(&settings);
        assert_eq!(reader.float_or("volume", false, 0.3), 0.3);
        assert_eq!(reader.float_or("volume", true, 0.3), 0.8);
    }

    #[test]
    fn empty_store_reads_bundled_defaults() {
        let settings = settings("{}");
        let config = ConfigReader::new(&settings).read();
        assert!(config.use_cpu_jit);
        assert!(config.use_gles);
        assert_eq!(config.frame_limit, 100);
        assert_eq!(config.layout_option, LAYOUT_LARGE_SCREEN);
        assert_eq!(config.volume, 1.0);
        assert_eq!(config.init_time, 946_681_277);
        assert_eq!(config.region_value, -1);
        assert_eq!(config.pp_shader_name, "none (builtin)");
        assert_eq!(config.web_api_url, "https://api.citra-emu.org");
        assert_eq!(config.citra_username, "AZAHAR");
    }

    #[test]
    fn disabled_frame_limiter_zeroes_limit() {
        let settings = settings(r#"{"use_frame_limit": false, "frame_limit": 200}"#);
        assert_eq!(ConfigReader::new(&settings).read().frame_limit, 0);
    }

    #[test]
    fn out_of_range_layout_falls_back_to_large_screen() {
        let settings = settings(r#"{"layout_option": 9}"#);
        assert_eq!(ConfigReader::new(&settings).read().layout_option, LAYOUT_LARGE_SCREEN);
        let settings = self::settings(r#"{"layout_option": -1}"#);
        assert_eq!(ConfigReader::new(&settings).read().layout_option, LAYOUT_LARGE_SCREEN);
    }

    #[test]
    fn unparsable_init_time_keeps_default() {
        let settings = settings(r#"{"init_time": "yesterday"}"#);
        assert_eq!(ConfigReader::new(&settings).read().init_time, 946_681_277);
        let settings = self::settings(r#"{"init_time": "1700000000"}"#);
        assert_eq!(ConfigReader::new(&settings).read().init_time, 1_700_000_000);
    }

    #[test]
    fn stereo_mode_picks_post_processing_shader() {
        let settings = settings(r#"{"render_3d": 2}"#);
        assert_eq!(ConfigReader::new(&settings).read().pp_shader_name, "dubois (builtin)");
        let settings = self::settings(r#"{"render_3d": 3}"#);
        assert_eq!(ConfigReader::new(&settings).read().pp_shader_name, "horizontal (builtin)");
    }

    #[test]
    fn scale_lookup() {
        assert_eq!(scale_for("volume"), 100.0);
        assert_eq!(scale_for("anything_else"), 1.0);
    }
}
