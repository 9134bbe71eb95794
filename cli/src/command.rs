mod crud;
mod down;
mod info;
mod migrate;
mod reset;
mod status;
mod up;

pub use crud::*;
pub use down::*;
pub use info::*;
pub use migrate::*;
pub use reset::*;
pub use status::*;
pub use up::*;
