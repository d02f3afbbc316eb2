use rollcall_store::YearRule;
use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Directory holding all local state (gallery, ledger, faces, error log).
    pub data_dir: PathBuf,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Euclidean distance tolerance for a positive match; lower = stricter.
    pub tolerance: f32,
    /// Institutional year derivation for new ledger rows.
    pub year_rule: YearRule,
    /// Base URL of the remote attendance database; publishing is disabled
    /// when unset.
    pub remote_url: Option<String>,
    /// Auth token for the remote database.
    pub remote_auth: Option<String>,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("ROLLCALL_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                std::env::var("XDG_DATA_HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| {
                        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                        PathBuf::from(home).join(".local/share")
                    })
                    .join("rollcall")
            });

        let model_dir = std::env::var("ROLLCALL_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| rollcall_core::default_model_dir());

        Self {
            data_dir,
            model_dir,
            tolerance: env_f32("ROLLCALL_TOLERANCE", 0.5),
            year_rule: YearRule {
                base: env_i32("ROLLCALL_YEAR_BASE", 5),
                digit_index: env_usize("ROLLCALL_YEAR_DIGIT", 2),
            },
            remote_url: std::env::var("ROLLCALL_REMOTE_URL").ok(),
            remote_auth: std::env::var("ROLLCALL_REMOTE_AUTH").ok(),
        }
    }

    pub fn gallery_path(&self) -> PathBuf {
        self.data_dir.join("signatures.json")
    }

    pub fn faces_dir(&self) -> PathBuf {
        self.data_dir.join("faces")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("attendance.csv")
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.data_dir.join("error_log.txt")
    }

    /// Path to the SCRFD detection model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join("det_10g.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the ArcFace signature model.
    pub fn extractor_model_path(&self) -> String {
        self.model_dir
            .join("w600k_r50.onnx")
            .to_string_lossy()
            .into_owned()
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_i32(key: &str, default: i32) -> i32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
