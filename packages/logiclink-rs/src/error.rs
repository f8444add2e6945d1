use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("device {vid:04x}:{pid:04x} not found")]
    DeviceNotFound { vid: u16, pid: u16 },

    #[error("unknown device \"{0}\"")]
    UnknownDevice(String),

    #[error("short payload: wanted {wanted} bytes, got {got}")]
    Truncated { wanted: usize, got: usize },

    #[error("unknown wire value {value} for {what}")]
    UnknownWireValue { what: &'static str, value: u8 },

    #[error("block channel lengths differ")]
    BlockSizeMismatch,

    #[error("channel count mismatch")]
    ChannelMismatch,

    #[error("no such channel group {0}")]
    NoSuchGroup(usize),

    #[error("unsupported channel count {0}")]
    UnsupportedChannels(usize),

    #[error("acquisition already running")]
    AlreadyRunning,

    #[error("usb transfer sizes must be non-zero")]
    ZeroTransfer,

    #[error("worker thread failed: {0}")]
    Worker(String),

    #[cfg(feature = "usb")]
    #[error("usb: {0}")]
    Usb(#[from] rusb::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
