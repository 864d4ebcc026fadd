//! Reverse-order release of everything the bootstrap created.
//!
//! Every successful creation pushes a [`Resource`] guard. Unwinding pops the
//! guards last-in first-out, so children are always released before the
//! objects they were created from. The same path runs after a clean exit and
//! after a failure partway through initialization.

use tracing::{debug, error, info};

use triangle_rhi::{Driver, Resource};

/// Release guards in creation order.
#[derive(Debug, Default)]
pub struct TeardownStack {
    entries: Vec<Resource>,
}

impl TeardownStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a freshly created object.
    pub fn push(&mut self, resource: Resource) {
        debug!("Tracking {}", resource);
        self.entries.push(resource);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, resource: &Resource) -> bool {
        self.entries.contains(resource)
    }

    /// Guards in creation order.
    pub fn entries(&self) -> &[Resource] {
        &self.entries
    }

    /// Releases every tracked object in reverse creation order.
    ///
    /// Waits for the device to go idle first when one exists. A failed wait
    /// is logged and release continues.
    pub fn unwind<D: Driver>(&mut self, driver: &mut D) {
        if self.entries.is_empty() {
            return;
        }

        if self.entries.contains(&Resource::Device)
            && let Err(e) = driver.wait_idle()
        {
            error!("Failed to wait for device idle before teardown: {}", e);
        }

        let count = self.entries.len();
        while let Some(resource) = self.entries.pop() {
            debug!("Releasing {}", resource);
            driver.destroy(resource);
        }

        info!("Released {} objects", count);
    }
}
