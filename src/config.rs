//! Session configuration
//!
//! Connection, TLS, terminal-type, and screen-size settings, with
//! loading from the environment variables the core consumes:
//! `SESSION_SSL`, `SESSION_SSL_VERIFY`, `ZTI_SECLEVEL`,
//! `SESSION_PS_SIZE`, and `TNZ_COLORS`.

use std::env;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::codec::CodePage;
use crate::network::{default_port, TransportConfig, VerifyMode};

/// Screen-size codes historically used by HOD, plus `RxC` notation
const PS_SIZE_CODES: &[(&str, (u16, u16))] = &[
    ("2", (24, 80)),
    ("3", (32, 80)),
    ("4", (43, 80)),
    ("5", (27, 132)),
    ("6", (24, 132)),
    ("7", (36, 80)),
    ("8", (36, 132)),
    ("9", (48, 80)),
    ("10", (48, 132)),
    ("11", (72, 80)),
    ("12", (72, 132)),
    ("13", (144, 80)),
    ("14", (144, 132)),
    ("15", (25, 80)),
    ("16", (25, 132)),
    ("17", (62, 160)),
    ("18", (26, 80)),
    ("19", (26, 132)),
];

/// Rows reserved for UI chrome by the `MAX`/`MAX255` size policies
const CHROME_ROWS: u16 = 2;

/// Resolve a `SESSION_PS_SIZE` value to rows x cols
///
/// Accepts `RxC` notation and the numeric model codes directly. The
/// `MAX`/`MAX255`/`FULL`/`FULL255` policies resolve against a
/// caller-supplied terminal size: `MAX*` reserves chrome rows, `FULL*`
/// uses the whole terminal, and the suffix raises the column cap from
/// 160 to 255.
pub fn session_ps_size(value: &str, terminal: Option<(u16, u16)>) -> Result<(u16, u16), String> {
    let upper = value.trim().to_ascii_uppercase();

    if let Some(&(_, size)) = PS_SIZE_CODES.iter().find(|(code, _)| *code == upper) {
        return Ok(size);
    }

    let policy = match upper.as_str() {
        "MAX" => Some((CHROME_ROWS, 160)),
        "MAX255" => Some((CHROME_ROWS, 255)),
        "FULL" => Some((0, 160)),
        "FULL255" => Some((0, 255)),
        _ => None,
    };
    if let Some((reserve, col_cap)) = policy {
        let (term_rows, term_cols) =
            terminal.ok_or_else(|| format!("{upper} requires a terminal size"))?;
        let rows = term_rows.saturating_sub(reserve).max(24);
        let cols = term_cols.min(col_cap).max(80);
        return Ok(clamp_14bit(rows, cols));
    }

    let mut parts = upper.splitn(2, 'X');
    let rows = parts.next().and_then(|s| s.parse::<u16>().ok());
    let cols = parts.next().and_then(|s| s.parse::<u16>().ok());
    match (rows, cols) {
        (Some(rows), Some(cols)) if rows > 0 && cols > 0 => Ok((rows, cols)),
        _ => Err(format!("not a SESSION_PS_SIZE value: {value}")),
    }
}

/// Trim a size to the 16383-position limit of 14-bit addressing
pub fn clamp_14bit(rows: u16, cols: u16) -> (u16, u16) {
    let rows = rows.clamp(24, 204); // 16383 / 80
    let cols = cols.clamp(80, 682); // 16383 / 24

    if rows >= 127 && cols >= 129 {
        return (127, 129);
    }
    if rows >= 129 && cols >= 127 {
        return (129, 127);
    }
    if (rows as u32) * (cols as u32) <= 16383 {
        return (rows, cols);
    }
    (16383 / cols, cols)
}

/// Terminal type string for a given alternate screen size
pub fn terminal_type_for(rows: u16, cols: u16) -> String {
    match (rows, cols) {
        (24, 80) => "IBM-3279-2-E".to_string(),
        (32, 80) => "IBM-3279-3-E".to_string(),
        (43, 80) => "IBM-3279-4-E".to_string(),
        (27, 132) => "IBM-3279-5-E".to_string(),
        _ => "IBM-DYNAMIC".to_string(),
    }
}

/// Everything needed to open a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub host: String,
    /// Defaults to 992 (TLS) or 23 (plain) when unset
    pub port: Option<u16>,
    pub use_tls: bool,
    pub verify: VerifyMode,
    pub seclevel: u8,
    pub ca_bundle_path: Option<String>,
    pub terminal_type: String,
    pub use_tn3270e: bool,
    pub codepage: CodePage,
    /// Alternate (EWA) partition size; the default partition is 24x80
    pub alt_rows: u16,
    pub alt_cols: u16,
    /// Color capability hint for the UI (from TNZ_COLORS)
    pub colors: u32,
}

impl SessionConfig {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            port: None,
            use_tls: true,
            verify: VerifyMode::Hostname,
            seclevel: 2,
            ca_bundle_path: None,
            terminal_type: terminal_type_for(24, 80),
            use_tn3270e: true,
            codepage: CodePage::Cp1047,
            alt_rows: 24,
            alt_cols: 80,
            colors: 8,
        }
    }

    /// A config with the environment variables applied
    pub fn from_env(host: &str) -> Self {
        let mut config = Self::new(host);
        config.apply_env();
        config
    }

    /// Apply `SESSION_SSL`, `SESSION_SSL_VERIFY`, `ZTI_SECLEVEL`,
    /// `SESSION_PS_SIZE`, and `TNZ_COLORS`
    pub fn apply_env(&mut self) {
        if let Ok(value) = env::var("SESSION_SSL") {
            self.use_tls = value.trim() != "0";
        }
        if let Ok(value) = env::var("SESSION_SSL_VERIFY") {
            match VerifyMode::from_name(value.trim()) {
                Some(mode) => self.verify = mode,
                None => warn!("SESSION_SSL_VERIFY: unknown mode {value:?}"),
            }
        }
        if let Ok(value) = env::var("ZTI_SECLEVEL") {
            match value.trim().parse::<u8>() {
                Ok(level @ 0..=2) => self.seclevel = level,
                _ => warn!("ZTI_SECLEVEL: expected 0, 1, or 2, got {value:?}"),
            }
        }
        if let Ok(value) = env::var("SESSION_PS_SIZE") {
            match session_ps_size(&value, None) {
                Ok((rows, cols)) => self.set_alternate_size(rows, cols),
                Err(e) => warn!("SESSION_PS_SIZE: {e}"),
            }
        }
        if let Ok(value) = env::var("TNZ_COLORS") {
            let value = value.trim();
            if value.eq_ignore_ascii_case("true") {
                self.colors = 1 << 24;
            } else {
                match value.parse::<u32>() {
                    Ok(n) => self.colors = n,
                    Err(_) => warn!("TNZ_COLORS: not a color count: {value:?}"),
                }
            }
        }
    }

    /// Set the alternate partition size, clamping to the addressing
    /// limit and refreshing the terminal type
    pub fn set_alternate_size(&mut self, rows: u16, cols: u16) {
        let (rows, cols) = clamp_14bit(rows, cols);
        self.alt_rows = rows;
        self.alt_cols = cols;
        self.terminal_type = terminal_type_for(rows, cols);
    }

    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| default_port(self.use_tls))
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            use_tls: self.use_tls,
            verify: self.verify,
            seclevel: self.seclevel,
            ca_bundle_path: self.ca_bundle_path.clone(),
            ..TransportConfig::default()
        }
    }

    /// Sanity checks before connecting
    pub fn validate(&self) -> Result<(), String> {
        if self.host.is_empty() {
            return Err("host must not be empty".to_string());
        }
        if self.seclevel > 2 {
            return Err(format!("seclevel {} out of range", self.seclevel));
        }
        if (self.alt_rows as u32) * (self.alt_cols as u32) > 16383 {
            return Err(format!(
                "alternate size {}x{} exceeds 14-bit addressing",
                self.alt_rows, self.alt_cols
            ));
        }
        let expected = terminal_type_for(self.alt_rows, self.alt_cols);
        if self.terminal_type != expected && self.terminal_type != "IBM-DYNAMIC" {
            return Err(format!(
                "terminal type {} does not match alternate size {}x{}",
                self.terminal_type, self.alt_rows, self.alt_cols
            ));
        }
        Ok(())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ps_size_rxc() {
        assert_eq!(session_ps_size("43x80", None).unwrap(), (43, 80));
        assert_eq!(session_ps_size("27X132", None).unwrap(), (27, 132));
        assert!(session_ps_size("banana", None).is_err());
    }

    #[test]
    fn test_ps_size_model_codes() {
        assert_eq!(session_ps_size("2", None).unwrap(), (24, 80));
        assert_eq!(session_ps_size("5", None).unwrap(), (27, 132));
        assert_eq!(session_ps_size("17", None).unwrap(), (62, 160));
    }

    #[test]
    fn test_ps_size_policies() {
        // MAX reserves chrome rows, FULL does not
        assert_eq!(session_ps_size("MAX", Some((50, 120))).unwrap(), (48, 120));
        assert_eq!(session_ps_size("FULL", Some((50, 120))).unwrap(), (50, 120));
        // column caps
        assert_eq!(session_ps_size("FULL", Some((30, 300))).unwrap(), (30, 160));
        assert_eq!(session_ps_size("FULL255", Some((30, 300))).unwrap(), (30, 255));
        // policies need a terminal size
        assert!(session_ps_size("MAX", None).is_err());
    }

    #[test]
    fn test_clamp_14bit() {
        assert_eq!(clamp_14bit(24, 80), (24, 80));
        assert_eq!(clamp_14bit(62, 160), (62, 160));
        // 72x240 would blow the limit
        let (rows, cols) = clamp_14bit(72, 240);
        assert!((rows as u32) * (cols as u32) <= 16383);
        // very large both ways picks the canonical corner
        assert_eq!(clamp_14bit(200, 300), (127, 129));
    }

    #[test]
    fn test_terminal_types() {
        assert_eq!(terminal_type_for(24, 80), "IBM-3279-2-E");
        assert_eq!(terminal_type_for(43, 80), "IBM-3279-4-E");
        assert_eq!(terminal_type_for(62, 160), "IBM-DYNAMIC");
    }

    #[test]
    fn test_defaults() {
        let config = SessionConfig::new("mvs1.example.com");
        assert!(config.use_tls);
        assert_eq!(config.effective_port(), 992);
        assert_eq!(config.seclevel, 2);
        assert!(config.validate().is_ok());

        let mut plain = config.clone();
        plain.use_tls = false;
        assert_eq!(plain.effective_port(), 23);
    }

    #[test]
    fn test_alternate_size_updates_terminal_type() {
        let mut config = SessionConfig::new("host");
        config.set_alternate_size(43, 80);
        assert_eq!(config.terminal_type, "IBM-3279-4-E");
        config.set_alternate_size(62, 160);
        assert_eq!(config.terminal_type, "IBM-DYNAMIC");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = SessionConfig::new("host");
        config.set_alternate_size(27, 132);
        config.port = Some(2023);
        let json = config.to_json().unwrap();
        let parsed = SessionConfig::from_json(&json).unwrap();
        assert_eq!(parsed.host, "host");
        assert_eq!(parsed.port, Some(2023));
        assert_eq!(parsed.alt_rows, 27);
        assert_eq!(parsed.terminal_type, "IBM-3279-5-E");
    }

    #[test]
    fn test_apply_env() {
        // process-global state: set, apply, then clean up
        env::set_var("SESSION_SSL", "0");
        env::set_var("SESSION_SSL_VERIFY", "cert");
        env::set_var("ZTI_SECLEVEL", "1");
        env::set_var("SESSION_PS_SIZE", "32x80");
        env::set_var("TNZ_COLORS", "256");

        let config = SessionConfig::from_env("host");
        assert!(!config.use_tls);
        assert_eq!(config.verify, crate::network::VerifyMode::Cert);
        assert_eq!(config.seclevel, 1);
        assert_eq!((config.alt_rows, config.alt_cols), (32, 80));
        assert_eq!(config.terminal_type, "IBM-3279-3-E");
        assert_eq!(config.colors, 256);

        for var in [
            "SESSION_SSL",
            "SESSION_SSL_VERIFY",
            "ZTI_SECLEVEL",
            "SESSION_PS_SIZE",
            "TNZ_COLORS",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_validate_rejects_oversize() {
        let mut config = SessionConfig::new("host");
        config.alt_rows = 200;
        config.alt_cols = 200;
        assert!(config.validate().is_err());
    }
}
