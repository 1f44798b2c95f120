pub mod decode;
pub mod loader;
pub mod resample;

pub use decode::AudioBuffer;
pub use loader::{HttpLoader, Loader};
pub use resample::resample;
