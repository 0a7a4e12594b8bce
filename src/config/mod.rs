mod layout;

pub use layout::{Layout, LayoutCreationError};
