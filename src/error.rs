use ash::{prelude::VkResult, vk};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load the Vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    /// A platform query itself failed. An empty answer is not an error.
    #[error("{what} failed: {result}")]
    Query {
        what: &'static str,
        result: vk::Result,
    },

    #[error("no suitable device found among {candidates} candidate(s)")]
    NoSuitableDevice { candidates: usize },

    #[error("device `{device}` has no complete graphics/present queue family pair")]
    IncompleteQueueFamilies { device: String },

    #[error(
        "device `{device}` reports {formats} surface format(s) and {present_modes} present mode(s)"
    )]
    EmptySwapchainCapability {
        device: String,
        formats: usize,
        present_modes: usize,
    },

    #[error("validation layer `{layer}` is not available")]
    MissingValidationLayer { layer: String },

    #[error("name contains an interior nul byte: {0}")]
    Nul(#[from] std::ffi::NulError),

    #[error("unsupported window handle: {0}")]
    UnsupportedWindowHandle(&'static str),

    #[error(transparent)]
    WindowHandle(#[from] raw_window_handle::HandleError),
}

pub(crate) trait QueryExt<T> {
    fn query(self, what: &'static str) -> Result<T>;
}

impl<T> QueryExt<T> for VkResult<T> {
    fn query(self, what: &'static str) -> Result<T> {
        self.map_err(|result| Error::Query { what, result })
    }
}
