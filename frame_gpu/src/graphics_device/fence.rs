/// Fence trait - monotonically increasing timeline value

use std::any::Any;
use crate::error::Result;

/// GPU → CPU timeline fence
///
/// Values are only signaled by queues (`GraphicsDevice::signal`). The CPU
/// observes them through `completed_value` or blocks through `wait`.
pub trait Fence: Send + Sync {
    /// Last value the GPU has reached
    fn completed_value(&self) -> u64;

    /// Block until `completed_value() >= value`
    ///
    /// # Errors
    ///
    /// `DeviceLost` when the wait fails. There is no timeout.
    fn wait(&self, value: u64) -> Result<()>;

    /// Downcast support for backends
    fn as_any(&self) -> &dyn Any;
}
