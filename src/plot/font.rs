// src/plot/font.rs
use once_cell::sync::OnceCell;
use plotters::style::{register_font, FontStyle};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Family name every plot text element asks for.
pub const FAMILY: &str = "sans-serif";

static SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

static REGISTERED: OnceCell<bool> = OnceCell::new();

/// Register a TrueType font under [`FAMILY`] once per process.
///
/// `preferred` is tried before the common system locations. Returns whether text can be
/// drawn; the first call decides, later calls only read the cached outcome.
pub fn ensure_registered(preferred: Option<&Path>) -> bool {
    *REGISTERED.get_or_init(|| {
        let candidates = preferred
            .map(Path::to_path_buf)
            .into_iter()
            .chain(SYSTEM_FONTS.iter().map(PathBuf::from));

        for path in candidates {
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
            match register_font(FAMILY, FontStyle::Normal, bytes) {
                Ok(()) => {
                    info!(path = %path.display(), "registered plot font");
                    return true;
                }
                Err(_) => warn!(path = %path.display(), "not a usable TrueType font"),
            }
        }

        warn!("no plot font found; plots will be drawn without text");
        false
    })
}
