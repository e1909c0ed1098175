pub mod control;
pub mod server;

pub use control::PulseControl;
pub use server::SoundServer;
