pub mod config;
pub mod controller;
pub mod fingerprint;
pub mod loop_worker;
pub mod policy;
pub mod providers;
pub mod state;
pub mod target;
pub mod text;

pub use config::WatchConfig;
pub use controller::WatchController;
pub use loop_worker::WatchStatus;
pub use providers::{DoneNotifier, FrameSource, Providers, TextRecognizer};
pub use state::WatchPhase;
pub use target::CaptureTarget;
