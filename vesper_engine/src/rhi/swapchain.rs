/// Swap chain - presentation surface front-end
///
/// Owns one command list per back-buffer image and the presentation state
/// machine; the backend half performs the native acquire/present. On any
/// construction failure the object is left uninitialized
/// (`is_initialized() == false`) rather than erroring — callers must check.

use std::any::Any;
use std::sync::Arc;
use winit::window::Window;

use crate::error::Result;
use crate::rhi::{CommandList, ImageLayout, RhiDevice, Texture, TextureFormat};

use bitflags::bitflags;

bitflags! {
    /// Presentation behavior flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PresentFlags: u32 {
        /// Present without waiting for vertical blank
        const IMMEDIATE    = 1 << 0;
        /// Discard the back buffer after present (flip-discard)
        const FLIP_DISCARD = 1 << 1;
    }
}

/// Descriptor for creating a swap chain
#[derive(Debug, Clone)]
pub struct SwapChainDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub buffer_count: u32,
    pub flags: PresentFlags,
}

/// Backend half of the swap chain: native image chain plus acquire/present.
pub trait SwapChainBackend: Send {
    /// Block until the backend hands back a usable image index
    fn acquire_next_image(&mut self) -> Result<u32>;

    /// Present the given image
    fn present(&mut self, image_index: u32) -> Result<()>;

    /// Re-create the image chain at a new size
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    /// Reset the command pool backing the per-image command lists
    fn reset_command_pool(&mut self) -> Result<()>;

    /// The backing image for the given index
    fn backbuffer(&self, image_index: u32) -> Arc<dyn Texture>;

    /// Sync object signaled by the most recent acquire; rendering submits
    /// that target the back buffer must wait on it
    fn acquired_sync(&self) -> Option<Arc<dyn Any + Send + Sync>>;
}

pub struct SwapChain {
    initialized: bool,
    width: u32,
    height: u32,
    format: TextureFormat,
    buffer_count: u32,
    flags: PresentFlags,

    image_index: u32,
    image_acquired: bool,
    acquire_count: u64,
    /// Cleared while the target has zero area (minimized window)
    present_enabled: bool,
    layout: ImageLayout,

    /// One command list per back-buffer image. Slots are `None` while a
    /// frame has the list checked out via `take_cmd_list`.
    cmd_lists: Vec<Option<CommandList>>,
    backend: Option<Box<dyn SwapChainBackend>>,
}

impl SwapChain {
    /// Create a swap chain over `window`.
    ///
    /// Resolution and window are validated before the backend is touched;
    /// any failure leaves the swap chain uninitialized.
    pub fn new(
        device: &Arc<dyn RhiDevice>,
        window: Option<&Window>,
        desc: &SwapChainDesc,
    ) -> Self {
        let uninitialized = Self {
            initialized: false,
            width: desc.width,
            height: desc.height,
            format: desc.format,
            buffer_count: desc.buffer_count,
            flags: desc.flags,
            image_index: 0,
            image_acquired: false,
            acquire_count: 0,
            present_enabled: true,
            layout: ImageLayout::Undefined,
            cmd_lists: Vec::new(),
            backend: None,
        };

        if !device.validate_resolution(desc.width, desc.height) {
            crate::engine_error!(
                "vesper::SwapChain",
                "{}x{} is an invalid resolution",
                desc.width,
                desc.height
            );
            return uninitialized;
        }

        if desc.buffer_count == 0 {
            crate::engine_error!("vesper::SwapChain", "Buffer count must be at least 1");
            return uninitialized;
        }

        let backend = match device.create_swapchain_backend(window, desc) {
            Ok(backend) => backend,
            Err(err) => {
                crate::engine_error!("vesper::SwapChain", "Failed to create swap chain: {}", err);
                return uninitialized;
            }
        };

        // One command list per back-buffer image
        let mut cmd_lists = Vec::with_capacity(desc.buffer_count as usize);
        for _ in 0..desc.buffer_count {
            match CommandList::new(device.as_ref()) {
                Ok(cmd) => cmd_lists.push(Some(cmd)),
                Err(err) => {
                    crate::engine_error!("vesper::SwapChain", "Failed to create command list: {}", err);
                    return uninitialized;
                }
            }
        }

        crate::engine_info!(
            "vesper::SwapChain",
            "Created ({}x{}, {} buffers)",
            desc.width,
            desc.height,
            desc.buffer_count
        );

        Self {
            initialized: true,
            cmd_lists,
            backend: Some(backend),
            ..uninitialized
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn buffer_count(&self) -> u32 {
        self.buffer_count
    }

    pub fn flags(&self) -> PresentFlags {
        self.flags
    }

    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    /// True while presentation is suspended by a zero-area resize
    pub fn is_suspended(&self) -> bool {
        !self.present_enabled
    }

    /// Check out the command list for the current back buffer. The caller
    /// records and submits the frame through it and must hand it back with
    /// `return_cmd_list` before the next acquire.
    pub fn take_cmd_list(&mut self) -> Option<CommandList> {
        self.cmd_lists.get_mut(self.image_index as usize)?.take()
    }

    /// Return a previously checked-out command list to its slot
    pub fn return_cmd_list(&mut self, cmd: CommandList) {
        let index = self.image_index as usize;
        if index < self.cmd_lists.len() {
            self.cmd_lists[index] = Some(cmd);
        }
    }

    /// The back buffer texture for the current image index
    pub fn backbuffer(&self) -> Option<Arc<dyn Texture>> {
        self.backend.as_ref().map(|backend| backend.backbuffer(self.image_index))
    }

    /// Resize the image chain.
    ///
    /// A resize to the current dimensions is a no-op. A zero-area target
    /// (minimized window) suspends presentation and reports success without
    /// creating backend resources. Any real resize drains the device first.
    pub fn resize(&mut self, device: &dyn RhiDevice, width: u32, height: u32) -> bool {
        if !self.initialized {
            crate::engine_error!("vesper::SwapChain", "resize() on an uninitialized swap chain");
            return false;
        }

        if width == self.width && height == self.height && self.present_enabled {
            return true;
        }

        // Minimized window: successful no-present state, not an error
        if width == 0 || height == 0 {
            self.present_enabled = false;
            return true;
        }

        if !device.validate_resolution(width, height) {
            crate::engine_error!("vesper::SwapChain", "{}x{} is an invalid resolution", width, height);
            return false;
        }

        if device.queue_wait_all().is_err() {
            return false;
        }

        let backend = match self.backend.as_mut() {
            Some(backend) => backend,
            None => return false,
        };
        if let Err(err) = backend.resize(width, height) {
            crate::engine_error!("vesper::SwapChain", "Resize failed: {}", err);
            return false;
        }

        self.width = width;
        self.height = height;
        self.present_enabled = true;
        self.image_acquired = false;
        self.image_index = 0;
        self.layout = ImageLayout::Undefined;

        crate::engine_info!("vesper::SwapChain", "Resized to {}x{}", width, height);
        true
    }

    /// Acquire the next back-buffer image.
    ///
    /// Returns true immediately while presentation is suspended. Otherwise
    /// blocks until the backend hands back an image, cycling the index
    /// modulo the buffer count; the command pool is reset each time every
    /// buffer has been cycled once.
    pub fn acquire_next_image(&mut self) -> bool {
        if !self.initialized {
            return false;
        }
        if !self.present_enabled {
            return true;
        }

        let backend = match self.backend.as_mut() {
            Some(backend) => backend,
            None => return false,
        };

        let index = match backend.acquire_next_image() {
            Ok(index) => index,
            Err(err) => {
                crate::engine_error!("vesper::SwapChain", "Acquire failed: {}", err);
                return false;
            }
        };

        self.image_index = index % self.buffer_count;
        self.image_acquired = true;
        self.acquire_count += 1;

        // All buffers cycled once: safe point to recycle the pool
        if self.acquire_count % self.buffer_count as u64 == 0 {
            if let Err(err) = backend.reset_command_pool() {
                crate::engine_warn!("vesper::SwapChain", "Command pool reset failed: {}", err);
            }
        }

        // Hand the acquire sync to the command list that will render into
        // this image
        let sync = backend.acquired_sync();
        if let Some(Some(cmd)) = self.cmd_lists.get_mut(self.image_index as usize) {
            cmd.set_wait_sync(sync);
        }

        true
    }

    /// Present the current image. Fails (logged) without a prior successful
    /// acquire.
    pub fn present(&mut self) -> bool {
        if !self.initialized {
            return false;
        }
        if !self.present_enabled {
            return true;
        }
        if !self.image_acquired {
            crate::engine_error!("vesper::SwapChain", "present() without a prior successful acquire");
            return false;
        }

        let backend = match self.backend.as_mut() {
            Some(backend) => backend,
            None => return false,
        };
        if let Err(err) = backend.present(self.image_index) {
            crate::engine_error!("vesper::SwapChain", "Present failed: {}", err);
            return false;
        }

        self.image_acquired = false;
        true
    }

    /// Transition every backing image to `layout` through `cmd`.
    /// Tracked per swap chain and skipped when already in the requested
    /// layout.
    pub fn set_layout(&mut self, layout: ImageLayout, cmd: &mut CommandList) -> Result<()> {
        if self.layout == layout {
            return Ok(());
        }

        if let Some(backend) = &self.backend {
            for index in 0..self.buffer_count {
                let image = backend.backbuffer(index);
                cmd.set_texture_layout(&image, layout)?;
            }
        }

        self.layout = layout;
        Ok(())
    }
}

#[cfg(test)]
#[path = "swapchain_tests.rs"]
mod tests;
