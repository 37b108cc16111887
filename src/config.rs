//! Configuration management.
//!
//! All options can be given as command-line arguments or environment
//! variables with the `RASTSERVE_` prefix. The base directory list is
//! ordered: the first root holds the highest resolution rendition and
//! anchors directory existence and timestamps; further roots contribute
//! prescaled variants.

use std::path::PathBuf;

use clap::Parser;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default number of concurrent transform workers.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Default number of admitted-but-waiting transform jobs.
pub const DEFAULT_MAX_QUEUE: usize = 20;

/// Default interpolation quality level (0..=2).
pub const DEFAULT_QUALITY: u8 = 1;

/// Default JPEG encode quality.
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

// =============================================================================
// CLI Arguments
// =============================================================================

/// rastserve - an on-demand image scaling server.
///
/// Serves scaled, cropped and rotated views of images held at multiple
/// pre-rendered resolutions across several base directories.
#[derive(Parser, Debug, Clone)]
#[command(name = "rastserve")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "RASTSERVE_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "RASTSERVE_PORT")]
    pub port: u16,

    // =========================================================================
    // Image Tree Configuration
    // =========================================================================
    /// Base directories in preference order, highest resolution first.
    #[arg(
        long = "base-dir",
        env = "RASTSERVE_BASE_DIRS",
        value_delimiter = ',',
        required = true
    )]
    pub base_dirs: Vec<PathBuf>,

    /// Upper bound for destination width/height in pixels (0 = unlimited).
    #[arg(long, default_value_t = 0, env = "RASTSERVE_MAX_IMAGE_SIZE")]
    pub max_image_size: u32,

    /// Allow sending raw files with mo=file / mo=rawfile.
    #[arg(long, default_value_t = true, env = "RASTSERVE_SENDFILE_ALLOWED")]
    pub sendfile_allowed: bool,

    /// Enlarge crop regions to the full rotated area (experimental).
    #[arg(long, default_value_t = false, env = "RASTSERVE_WHOLE_ROT_AREA")]
    pub whole_rot_area: bool,

    // =========================================================================
    // Worker Configuration
    // =========================================================================
    /// Maximum concurrent pixel transforms.
    #[arg(long, default_value_t = DEFAULT_MAX_WORKERS, env = "RASTSERVE_MAX_WORKERS")]
    pub max_workers: usize,

    /// Maximum admitted transform jobs waiting for a worker.
    #[arg(long, default_value_t = DEFAULT_MAX_QUEUE, env = "RASTSERVE_MAX_QUEUE")]
    pub max_queue: usize,

    // =========================================================================
    // Output Configuration
    // =========================================================================
    /// Default interpolation quality: 0 fast, 1 good, 2 best.
    #[arg(long, default_value_t = DEFAULT_QUALITY, env = "RASTSERVE_QUALITY")]
    pub default_quality: u8,

    /// JPEG encode quality for transformed output (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "RASTSERVE_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    // =========================================================================
    // Authorization Configuration
    // =========================================================================
    /// JSON file with path/address authorization rules.
    ///
    /// When absent, all paths are unrestricted.
    #[arg(long, env = "RASTSERVE_AUTH_RULES")]
    pub auth_rules: Option<PathBuf>,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "RASTSERVE_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_dirs.is_empty() {
            return Err("at least one base directory is required. \
                 Set --base-dir or RASTSERVE_BASE_DIRS"
                .to_string());
        }
        let primary = &self.base_dirs[0];
        if !primary.is_dir() {
            return Err(format!(
                "primary base directory {} does not exist",
                primary.display()
            ));
        }

        if self.max_workers == 0 {
            return Err("max_workers must be greater than 0".to_string());
        }

        if self.default_quality > 2 {
            return Err("default_quality must be between 0 and 2".to_string());
        }

        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Planner switches derived from this configuration.
    pub fn planner_config(&self) -> crate::plan::PlannerConfig {
        crate::plan::PlannerConfig {
            whole_rot_area: self.whole_rot_area,
            send_file_allowed: self.sendfile_allowed,
            default_quality: self.default_quality,
            jpeg_quality: self.jpeg_quality,
            max_image_size: self.max_image_size,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(base: PathBuf) -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 8081,
            base_dirs: vec![base],
            max_image_size: 0,
            sendfile_allowed: true,
            whole_rot_area: false,
            max_workers: 2,
            max_queue: 4,
            default_quality: 1,
            jpeg_quality: 85,
            auth_rules: None,
            cors_origins: None,
            verbose: false,
            no_tracing: false,
        }
    }

    #[test]
    fn test_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path().to_path_buf());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_primary_base_dir() {
        let config = test_config(PathBuf::from("/nonexistent/images"));
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("base directory"));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path().to_path_buf());
        config.max_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_quality_levels() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path().to_path_buf());
        config.default_quality = 3;
        assert!(config.validate().is_err());

        let mut config = test_config(dir.path().to_path_buf());
        config.jpeg_quality = 0;
        assert!(config.validate().is_err());

        let mut config = test_config(dir.path().to_path_buf());
        config.jpeg_quality = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bind_address() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path().to_path_buf());
        assert_eq!(config.bind_address(), "127.0.0.1:8081");
    }

    #[test]
    fn test_planner_config_mirrors_switches() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path().to_path_buf());
        config.whole_rot_area = true;
        config.max_image_size = 2048;
        let planner = config.planner_config();
        assert!(planner.whole_rot_area);
        assert_eq!(planner.max_image_size, 2048);
        assert_eq!(planner.jpeg_quality, 85);
    }
}
