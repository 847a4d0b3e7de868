pub mod charset;
pub mod config;
pub mod geometry;
pub mod spec;

pub use charset::{AllowedChars, CharsetError};
pub use config::{ConfigError, ExtractionSettings, Layout, DEFAULT_MAX_ATTEMPTS};
pub use geometry::{BoundingBox, GeometryError, PixelRect, DEFAULT_GROWTH_FACTOR};
pub use spec::{validate_date_format, FieldSpec, FieldSpecMap, ValidationError};
