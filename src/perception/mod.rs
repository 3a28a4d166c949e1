pub mod detector;
pub mod types;

pub use detector::{ElementDetector, OmniDetector, ParsedScreen};
pub use types::{ScreenElement, ScreenInfo};
