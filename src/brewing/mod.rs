pub mod format;
pub mod progress;
pub mod stages;
pub mod states;

pub use format::*;
pub use progress::*;
pub use stages::*;
pub use states::*;
