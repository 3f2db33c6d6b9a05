// gpu/context.rs — execution context, its single command queue, and events.
//
// OWNERSHIP
// ─────────
// `Context` owns the logical wgpu device, the adapters it was created from
// and the wgpu instance. Everything created against it (queue, buffers,
// programs, kernels, events) borrows it for `'ctx`, so the borrow checker
// refuses to drop a context while any of those are alive. Release order
// inside the context itself is fixed by field declaration order:
//
//   device   → logical device (and its internal handles)
//   devices  → adapters the device was built from
//   _instance → the runtime instance, dropped last
//
// Dropping the instance while device-level objects still hold references
// to it crashes some translation layers (dzn on WSL2), hence instance last.
//
// QUEUE
// ─────
// wgpu hands out the queue together with the device. The context parks it
// and gives it out exactly once through `create_queue`, so there is one
// queue per context and it is in-order.
//
// EVENTS
// ──────
// Each submission yields a `wgpu::SubmissionIndex`. An `Event` wraps it;
// waiting polls the device until that submission has completed. None of
// the waits are cancellable and none time out: a stalled device blocks the
// calling thread indefinitely.

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::gpu::device::{Device, DeviceInfo};
use crate::gpu::error::{GpuError, GpuResult};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

// ============================================================
// Context
// ============================================================

/// A logical device bound to one adapter, plus the queue it owns.
///
/// Create via [`Context::create`]. Not `Sync`: the driver is the only user.
pub struct Context {
    pub(crate) device: wgpu::Device,
    queue: Cell<Option<wgpu::Queue>>,
    limits: wgpu::Limits,
    id: u64,
    pub info: DeviceInfo,
    /// Adapters the device was created from. Kept until the context goes.
    devices: Vec<Device>,
    /// Keeps the instance alive until `device` has been dropped.
    _instance: wgpu::Instance,
}

impl Context {
    /// Bind a logical device over `devices`.
    ///
    /// wgpu binds one adapter per logical device, so the first entry is
    /// used and any others are only retained for their lifetime. The
    /// adapter's own limits are requested, which the adapter always accepts.
    ///
    /// # Errors
    /// `ContextCreationFailed` when `devices` is empty or the runtime
    /// rejects the device request.
    pub fn create(instance: wgpu::Instance, devices: Vec<Device>) -> GpuResult<Self> {
        let Some(first) = devices.first() else {
            return Err(GpuError::ContextCreationFailed {
                reason: "empty device list".to_string(),
                source: None,
            });
        };
        if devices.len() > 1 {
            log::warn!(
                "{} devices offered, binding the first only: {}",
                devices.len(),
                first.info
            );
        }

        let limits = first.info.limits.clone();
        let request = first.adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("gridcast"),
                required_features: wgpu::Features::empty(),
                required_limits: limits.clone(),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        );
        // wgpu 22: the tuple type must be spelled out for inference.
        let (device, queue): (wgpu::Device, wgpu::Queue) = pollster::block_on(request)
            .map_err(|e| GpuError::ContextCreationFailed {
                reason: format!("device request rejected by {}", first.info.name),
                source: Some(e),
            })?;

        device.on_uncaptured_error(Box::new(|err: wgpu::Error| {
            log::error!("uncaptured device error: {err}");
        }));

        let info = first.info.clone();
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        log::info!("context #{id} bound to {info}");

        Ok(Context {
            device,
            queue: Cell::new(Some(queue)),
            limits,
            id,
            info,
            devices,
            _instance: instance,
        })
    }

    /// Hand out the context's command queue. Only one queue exists per
    /// context.
    ///
    /// # Errors
    /// `QueueCreationFailed` when the queue was already taken.
    pub fn create_queue(&self) -> GpuResult<Queue<'_>> {
        let raw = self.queue.take().ok_or_else(|| {
            GpuError::QueueCreationFailed(format!(
                "context #{} already has its queue",
                self.id
            ))
        })?;
        log::debug!("queue created on context #{}", self.id);
        Ok(Queue { raw, ctx: self })
    }

    /// Limits the logical device was created with.
    pub fn limits(&self) -> &wgpu::Limits {
        &self.limits
    }

    /// Number of adapters retained by this context.
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Run `f` inside validation and out-of-memory error scopes and return
    /// the first error the runtime reported, if any.
    pub(crate) fn scoped<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> (T, Option<wgpu::Error>) {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let out = f(&self.device);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());
        (out, validation.or(oom))
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Context #{} {{ device: {} }}", self.id, self.info)
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        log::debug!("context #{} released", self.id);
    }
}

// ============================================================
// Queue
// ============================================================

/// The in-order command queue of a [`Context`].
///
/// Transfers live in `gpu::buffer`, kernel launches in `gpu::dispatch`.
pub struct Queue<'ctx> {
    pub(crate) raw: wgpu::Queue,
    pub(crate) ctx: &'ctx Context,
}

impl<'ctx> Queue<'ctx> {
    pub fn context(&self) -> &'ctx Context {
        self.ctx
    }

    /// Block until every operation submitted so far has completed.
    ///
    /// Not cancellable.
    pub fn finish(&self) {
        let status = self.ctx.device.poll(wgpu::Maintain::Wait);
        log::debug!(
            "queue drained on context #{} (queue empty: {})",
            self.ctx.id,
            status.is_queue_empty()
        );
    }

    /// Submit one encoded command buffer and return its completion event.
    pub(crate) fn submit(&self, encoder: wgpu::CommandEncoder) -> Event<'ctx> {
        let index = self.raw.submit(std::iter::once(encoder.finish()));
        Event { ctx: self.ctx, index }
    }

    /// Check that every event in `wait_for` was produced on this context.
    pub(crate) fn check_events(&self, wait_for: &[Event<'_>]) -> Result<(), String> {
        match wait_for.iter().find(|e| e.ctx.id != self.ctx.id) {
            Some(e) => Err(format!(
                "event from context #{} used on context #{}",
                e.ctx.id, self.ctx.id
            )),
            None => Ok(()),
        }
    }
}

impl Drop for Queue<'_> {
    fn drop(&mut self) {
        log::debug!("queue released on context #{}", self.ctx.id);
    }
}

// ============================================================
// Event
// ============================================================

/// Completion token for one submitted operation.
#[derive(Clone)]
pub struct Event<'ctx> {
    ctx: &'ctx Context,
    index: wgpu::SubmissionIndex,
}

impl Event<'_> {
    /// Block until the operation behind this event has completed.
    ///
    /// Not cancellable and without timeout.
    pub fn wait(&self) {
        self.ctx
            .device
            .poll(wgpu::Maintain::WaitForSubmissionIndex(self.index.clone()));
    }
}

impl fmt::Debug for Event<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("context", &self.ctx.id)
            .field("index", &self.index)
            .finish()
    }
}

/// Block until every event in `events` has completed.
pub fn wait_all(events: &[Event<'_>]) {
    for e in events {
        e.wait();
    }
}

// ============================================================
// Tests
// ============================================================
