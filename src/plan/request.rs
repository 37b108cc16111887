//! Structured scale request parameters.
//!
//! The core is agnostic to how parameters arrive over the wire; the HTTP
//! layer builds a [`ScaleRequest`] from query parameters and the
//! comma-separated `mo` option list.

/// How the output geometry is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleMode {
    /// Scale the window to fit the requested dw x dh (default)
    #[default]
    Fit,

    /// Crop at original resolution, no scaling
    Clip,

    /// Apply an absolute scale factor to the hires image
    AbsoluteScale,

    /// Absolute scale derived from display DPI over source DPI
    OriginalSize,
}

/// Which resolution variant to prefer during selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionPreference {
    /// Smallest variant that is still big enough, without upscaling
    #[default]
    Auto,

    /// Always the highest resolution
    Hires,

    /// The next smaller prescaled variant, served as-is when possible
    Lores,
}

/// Output encoding selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// JPEG sources stay JPEG, everything else becomes PNG
    #[default]
    Auto,
    Jpeg,
    Png,
}

/// Raw-file delivery modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendMode {
    /// Normal transform pipeline
    #[default]
    Normal,

    /// Send the selected file unchanged with its own mime type
    File,

    /// Send the selected file unchanged as an octet stream
    RawFile,
}

/// All parameters of one scale request.
///
/// The window (`wx`, `wy`, `ww`, `wh`) is relative to the source image in
/// [0, 1] coordinates; `dw`/`dh` of 0 mean "derive from the source aspect
/// ratio"; `ws` is an extra scale factor on top of the destination size.
#[derive(Debug, Clone)]
pub struct ScaleRequest {
    /// Logical path of the directory or file
    pub path: String,

    /// 1-based file number within the directory (ignored when `path`
    /// names a file)
    pub index: usize,

    /// Destination width in pixels (0 = derive from aspect)
    pub dw: u32,

    /// Destination height in pixels (0 = derive from aspect)
    pub dh: u32,

    /// Relative window offset and extent
    pub wx: f64,
    pub wy: f64,
    pub ww: f64,
    pub wh: f64,

    /// Additional scale factor
    pub ws: f64,

    /// Rotation angle in degrees
    pub rotation: f64,

    /// Contrast adjustment exponent (pixel values scale by 2^contrast)
    pub contrast: f32,

    /// Additive brightness adjustment
    pub brightness: f32,

    /// Per-channel RGB multipliers
    pub rgb_multiply: Option<[f32; 3]>,

    /// Per-channel RGB offsets
    pub rgb_add: Option<[f32; 3]>,

    /// Display resolution in DPI, for original-size requests
    pub ddpi_x: f64,
    pub ddpi_y: f64,

    /// Absolute scale factor for `AbsoluteScale`
    pub abs_scale: f64,

    pub mode: ScaleMode,
    pub resolution: ResolutionPreference,
    pub output: OutputFormat,
    pub send: SendMode,

    pub mirror_horizontal: bool,
    pub mirror_vertical: bool,

    /// Interpolation quality override (0..=2)
    pub quality: Option<u8>,
}

impl Default for ScaleRequest {
    fn default() -> Self {
        Self {
            path: String::new(),
            index: 1,
            dw: 0,
            dh: 0,
            wx: 0.0,
            wy: 0.0,
            ww: 1.0,
            wh: 1.0,
            ws: 1.0,
            rotation: 0.0,
            contrast: 0.0,
            brightness: 0.0,
            rgb_multiply: None,
            rgb_add: None,
            ddpi_x: 0.0,
            ddpi_y: 0.0,
            abs_scale: 1.0,
            mode: ScaleMode::default(),
            resolution: ResolutionPreference::default(),
            output: OutputFormat::default(),
            send: SendMode::default(),
            mirror_horizontal: false,
            mirror_vertical: false,
            quality: None,
        }
    }
}

impl ScaleRequest {
    /// A default request for a logical path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Apply one `mo` operation option. Unknown options are ignored; later
    /// options override earlier ones.
    pub fn apply_option(&mut self, option: &str) {
        match option {
            "fit" => self.mode = ScaleMode::Fit,
            "clip" => self.mode = ScaleMode::Clip,
            "ascale" => self.mode = ScaleMode::AbsoluteScale,
            "osize" => self.mode = ScaleMode::OriginalSize,
            "autores" => self.resolution = ResolutionPreference::Auto,
            "hires" => self.resolution = ResolutionPreference::Hires,
            "lores" => self.resolution = ResolutionPreference::Lores,
            "file" => self.send = SendMode::File,
            "rawfile" => self.send = SendMode::RawFile,
            "hmir" => self.mirror_horizontal = true,
            "vmir" => self.mirror_vertical = true,
            "jpg" => self.output = OutputFormat::Jpeg,
            "png" => self.output = OutputFormat::Png,
            "q0" => self.quality = Some(0),
            "q1" => self.quality = Some(1),
            "q2" => self.quality = Some(2),
            _ => {}
        }
    }

    /// Apply a comma-separated `mo` option list.
    pub fn apply_options(&mut self, options: &str) {
        for option in options.split(',') {
            self.apply_option(option.trim());
        }
    }
}
