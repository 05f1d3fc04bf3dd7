/// Errors that can occur while encoding or streaming frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the supported maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A frame is already mid-transmission; a new one cannot start until
    /// the previous frame's last word has been accepted downstream.
    #[error("packetizer busy (frame in flight)")]
    PacketizerBusy,
}

pub type Result<T> = std::result::Result<T, FrameError>;
