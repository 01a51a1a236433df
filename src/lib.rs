pub mod components;
pub mod enums;
pub mod level;
pub mod mask;
pub mod plugins;

pub use components::*;
pub use enums::*;
pub use level::LevelData;
pub use mask::{MaskData, MaskDefinitions, MaskId};
