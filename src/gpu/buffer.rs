// gpu/buffer.rs — device buffers and host↔device transfers.
//
// LAYOUT
// ──────
// Every device buffer is a flat storage buffer with
// `STORAGE | COPY_SRC | COPY_DST`. The access mode is a host-side contract
// about what kernels may do with it (read, write, both); it is enforced
// when the buffer is bound to a kernel parameter, not by the runtime.
//
// wgpu copies operate on multiples of `COPY_BUFFER_ALIGNMENT` (4 bytes).
// The device allocation is rounded up to that; the logical size requested
// by the caller is what transfers check against. Padding bytes are never
// observed by the host.
//
// READBACK
// ────────
// Storage buffers are not mappable. A download copies into a transient
// `MAP_READ | COPY_DST` staging buffer, submits, requests the map, and
// polls the device until the map callback has fired. The non-blocking
// form returns a `PendingRead`; the bytes are only reachable through its
// `wait`, so nothing can read a half-written buffer.

use std::sync::mpsc;

use crate::gpu::context::{wait_all, Context, Event, Queue};
use crate::gpu::error::{GpuError, GpuResult};

/// How kernels access a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// Kernels only read it (inputs).
    ReadOnly,
    /// Kernels only write it (outputs).
    WriteOnly,
    /// Kernels read and write it.
    ReadWrite,
}

impl AccessMode {
    pub fn kernel_reads(self) -> bool {
        !matches!(self, AccessMode::WriteOnly)
    }

    pub fn kernel_writes(self) -> bool {
        !matches!(self, AccessMode::ReadOnly)
    }
}

/// Whether a transfer returns before or after the copy has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocking {
    Yes,
    No,
}

// ============================================================
// DeviceBuffer
// ============================================================

/// A fixed-size region of device memory owned by a [`Context`].
pub struct DeviceBuffer<'ctx> {
    pub(crate) raw: wgpu::Buffer,
    size: u64,
    access: AccessMode,
    label: String,
    pub(crate) ctx: &'ctx Context,
}

impl<'ctx> DeviceBuffer<'ctx> {
    /// Allocate `size` bytes of device memory.
    ///
    /// # Errors
    /// `AllocationFailed` when `size` is zero, exceeds the device's buffer
    /// or storage-binding limits, or the runtime reports out-of-memory.
    pub fn allocate(
        ctx: &'ctx Context,
        label: &str,
        size: u64,
        access: AccessMode,
    ) -> GpuResult<Self> {
        if size == 0 {
            return Err(GpuError::AllocationFailed { size, reason: "zero-sized buffer".into() });
        }
        let padded = align_to(size, wgpu::COPY_BUFFER_ALIGNMENT);
        let limits = ctx.limits();
        let max = limits.max_buffer_size.min(limits.max_storage_buffer_binding_size as u64);
        if padded > max {
            return Err(GpuError::AllocationFailed {
                size,
                reason: format!("exceeds device limit of {max} bytes"),
            });
        }

        let (raw, err) = ctx.scoped(|device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: padded,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });
        if let Some(e) = err {
            return Err(GpuError::AllocationFailed { size, reason: e.to_string() });
        }

        log::debug!("allocated `{label}`: {size} bytes ({access:?})");
        Ok(DeviceBuffer { raw, size, access, label: label.to_string(), ctx })
    }

    /// Logical size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn access(&self) -> AccessMode {
        self.access
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for DeviceBuffer<'_> {
    fn drop(&mut self) {
        log::debug!("buffer `{}` released", self.label);
    }
}

// ============================================================
// Transfers
// ============================================================

impl<'ctx> Queue<'ctx> {
    /// Copy `data` into `buffer`.
    ///
    /// With `Blocking::Yes` this returns after the copy has completed; with
    /// `Blocking::No` the returned event must be waited on (or ordered
    /// behind by a later submission on this queue) before relying on it.
    ///
    /// # Errors
    /// `TransferFailed` on size mismatch, a buffer from another context or
    /// a runtime error while staging the write.
    pub fn upload(
        &self,
        buffer: &DeviceBuffer<'_>,
        data: &[u8],
        blocking: Blocking,
    ) -> GpuResult<Event<'ctx>> {
        self.check_buffer(buffer)?;
        if data.len() as u64 != buffer.size {
            return Err(GpuError::TransferFailed(format!(
                "upload of {} bytes into `{}` of {} bytes",
                data.len(),
                buffer.label,
                buffer.size
            )));
        }

        // Pad the tail so the write length is a multiple of the copy alignment.
        let padded_len = buffer.raw.size() as usize;
        let mut padded: Vec<u8>;
        let payload = if data.len() == padded_len {
            data
        } else {
            padded = vec![0u8; padded_len];
            padded[..data.len()].copy_from_slice(data);
            &padded[..]
        };

        let (event, err) = self.ctx.scoped(|device| {
            self.raw.write_buffer(&buffer.raw, 0, payload);
            let encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("upload"),
            });
            self.submit(encoder)
        });
        if let Some(e) = err {
            return Err(GpuError::TransferFailed(format!("upload into `{}`: {e}", buffer.label)));
        }

        if blocking == Blocking::Yes {
            event.wait();
        }
        log::debug!("uploaded {} bytes into `{}` ({blocking:?})", data.len(), buffer.label);
        Ok(event)
    }

    /// Copy `buffer` into `dest`, after every event in `wait_for` has
    /// completed. Blocks until the bytes are in `dest`.
    ///
    /// # Errors
    /// `TransferFailed` on size mismatch, foreign buffer/events, or a
    /// failed map.
    pub fn download(
        &self,
        buffer: &DeviceBuffer<'_>,
        dest: &mut [u8],
        wait_for: &[Event<'_>],
    ) -> GpuResult<()> {
        if dest.len() as u64 != buffer.size {
            return Err(GpuError::TransferFailed(format!(
                "download of `{}` ({} bytes) into {} bytes",
                buffer.label,
                buffer.size,
                dest.len()
            )));
        }
        self.enqueue_download(buffer, wait_for)?.wait(dest)
    }

    /// Start copying `buffer` back to the host once `wait_for` completed.
    ///
    /// Returns immediately after submission; the data is obtained with
    /// [`PendingRead::wait`].
    pub fn enqueue_download(
        &self,
        buffer: &DeviceBuffer<'_>,
        wait_for: &[Event<'_>],
    ) -> GpuResult<PendingRead<'ctx>> {
        self.check_buffer(buffer)?;
        self.check_events(wait_for).map_err(GpuError::TransferFailed)?;

        // Gate the read on its producers.
        wait_all(wait_for);

        let padded = buffer.raw.size();
        let ((staging, event), err) = self.ctx.scoped(|device| {
            let staging = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("readback staging"),
                size: padded,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("download"),
            });
            encoder.copy_buffer_to_buffer(&buffer.raw, 0, &staging, 0, padded);
            let event = self.submit(encoder);
            (staging, event)
        });
        if let Some(e) = err {
            return Err(GpuError::TransferFailed(format!("download of `{}`: {e}", buffer.label)));
        }

        let (sender, receiver) = mpsc::channel();
        staging.slice(..).map_async(wgpu::MapMode::Read, move |result| {
            // The receiver only disappears if the PendingRead was dropped.
            let _ = sender.send(result);
        });

        Ok(PendingRead {
            ctx: self.ctx,
            staging,
            size: buffer.size,
            label: buffer.label.clone(),
            event,
            receiver,
        })
    }

    fn check_buffer(&self, buffer: &DeviceBuffer<'_>) -> GpuResult<()> {
        if buffer.ctx.id() != self.ctx.id() {
            return Err(GpuError::TransferFailed(format!(
                "buffer `{}` belongs to context #{}, queue to context #{}",
                buffer.label,
                buffer.ctx.id(),
                self.ctx.id()
            )));
        }
        Ok(())
    }
}

/// A download that has been submitted but not yet observed by the host.
pub struct PendingRead<'ctx> {
    ctx: &'ctx Context,
    staging: wgpu::Buffer,
    size: u64,
    label: String,
    event: Event<'ctx>,
    receiver: mpsc::Receiver<Result<(), wgpu::BufferAsyncError>>,
}

impl<'ctx> PendingRead<'ctx> {
    /// Completion event of the device→staging copy.
    pub fn event(&self) -> &Event<'ctx> {
        &self.event
    }

    /// Block until the copy has completed and write the bytes into `dest`.
    ///
    /// # Errors
    /// `TransferFailed` on size mismatch or a failed map.
    pub fn wait(self, dest: &mut [u8]) -> GpuResult<()> {
        if dest.len() as u64 != self.size {
            return Err(GpuError::TransferFailed(format!(
                "download of `{}` ({} bytes) into {} bytes",
                self.label,
                self.size,
                dest.len()
            )));
        }

        self.event.wait();
        let mapped = match self.receiver.try_recv() {
            Ok(r) => r,
            Err(_) => {
                // Map callbacks fire during a poll; drive one more if needed.
                self.ctx.device.poll(wgpu::Maintain::Wait);
                self.receiver.recv().map_err(|_| {
                    GpuError::TransferFailed(format!("map of `{}` never completed", self.label))
                })?
            }
        };
        mapped.map_err(|e| GpuError::TransferFailed(format!("map of `{}`: {e}", self.label)))?;

        {
            let view = self.staging.slice(..).get_mapped_range();
            dest.copy_from_slice(&view[..self.size as usize]);
        }
        self.staging.unmap();
        log::debug!("downloaded {} bytes from `{}`", self.size, self.label);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helper
// ---------------------------------------------------------------------------

/// Round `value` up to the next multiple of `alignment`.
///
///   align_to(1, 4)  = 4
///   align_to(28, 4) = 28
///   align_to(30, 4) = 32
#[inline]
pub(crate) fn align_to(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::testutil::any_context;

    #[test]
    fn test_align_to() {
        assert_eq!(align_to(0, 4), 0);
        assert_eq!(align_to(1, 4), 4);
        assert_eq!(align_to(4, 4), 4);
        assert_eq!(align_to(28, 4), 28);
        assert_eq!(align_to(30, 4), 32);
    }

    #[test]
    fn test_access_mode_directions() {
        assert!(AccessMode::ReadOnly.kernel_reads());
        assert!(!AccessMode::ReadOnly.kernel_writes());
        assert!(!AccessMode::WriteOnly.kernel_reads());
        assert!(AccessMode::WriteOnly.kernel_writes());
        assert!(AccessMode::ReadWrite.kernel_reads());
        assert!(AccessMode::ReadWrite.kernel_writes());
    }

    // ---- GPU tests (subprocess-isolated) ----------------------------------

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_zero_sized_allocation_fails() {
        let ctx = any_context();
        let err = DeviceBuffer::allocate(&ctx, "empty", 0, AccessMode::ReadWrite)
            .err()
            .expect("zero size must fail");
        assert!(matches!(err, GpuError::AllocationFailed { size: 0, .. }));
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_upload_download_round_trip() {
        let ctx = any_context();
        let queue = ctx.create_queue().unwrap();
        // 30 bytes: exercises tail padding to the copy alignment.
        let data: Vec<u8> = (0u8..30).collect();
        let buf = DeviceBuffer::allocate(&ctx, "rt", 30, AccessMode::ReadWrite).unwrap();
        queue.upload(&buf, &data, Blocking::Yes).unwrap();
        let mut back = vec![0u8; 30];
        queue.download(&buf, &mut back, &[]).unwrap();
        assert_eq!(back, data);
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_non_blocking_transfers() {
        let ctx = any_context();
        let queue = ctx.create_queue().unwrap();
        let data = vec![7u8; 64];
        let buf = DeviceBuffer::allocate(&ctx, "nb", 64, AccessMode::ReadWrite).unwrap();
        let written = queue.upload(&buf, &data, Blocking::No).unwrap();
        let pending = queue.enqueue_download(&buf, &[written]).unwrap();
        let mut back = vec![0u8; 64];
        pending.wait(&mut back).unwrap();
        assert_eq!(back, data);
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_size_mismatch_is_transfer_error() {
        let ctx = any_context();
        let queue = ctx.create_queue().unwrap();
        let buf = DeviceBuffer::allocate(&ctx, "mm", 16, AccessMode::ReadWrite).unwrap();
        let err = queue.upload(&buf, &[0u8; 8], Blocking::Yes).err().unwrap();
        assert!(matches!(err, GpuError::TransferFailed(_)));
        let mut small = [0u8; 4];
        let err = queue.download(&buf, &mut small, &[]).err().unwrap();
        assert!(matches!(err, GpuError::TransferFailed(_)));
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "requires a real GPU runtime"]
    fn test_zero_sized_allocation_fails() {
        let out = crate::gpu::run_gpu_test_in_subprocess(
            "gpu::buffer::tests::inner_zero_sized_allocation_fails",
        );
        assert!(out.contains("GPU_TEST_OK"), "inner test failed:\n{out}");
    }

    #[test]
    #[ignore = "requires a real GPU runtime"]
    fn test_upload_download_round_trip() {
        let out = crate::gpu::run_gpu_test_in_subprocess(
            "gpu::buffer::tests::inner_upload_download_round_trip",
        );
        assert!(out.contains("GPU_TEST_OK"), "inner test failed:\n{out}");
    }

    #[test]
    #[ignore = "requires a real GPU runtime"]
    fn test_non_blocking_transfers() {
        let out = crate::gpu::run_gpu_test_in_subprocess(
            "gpu::buffer::tests::inner_non_blocking_transfers",
        );
        assert!(out.contains("GPU_TEST_OK"), "inner test failed:\n{out}");
    }

    #[test]
    #[ignore = "requires a real GPU runtime"]
    fn test_size_mismatch_is_transfer_error() {
        let out = crate::gpu::run_gpu_test_in_subprocess(
            "gpu::buffer::tests::inner_size_mismatch_is_transfer_error",
        );
        assert!(out.contains("GPU_TEST_OK"), "inner test failed:\n{out}");
    }
}
