// gpu/program.rs — kernel programs: compile, reflect, bind.
//
// SOURCE TEXT
// ───────────
// A program is WGSL source text. The workgroup size is not fixed by the
// author: `@workgroup_size({{WG_X}}, {{WG_Y}}, {{WG_Z}})` placeholders are
// specialised per dispatch by string replacement. naga does not accept
// `override` expressions inside @workgroup_size() in this wgpu release, so
// the dimensions are baked into the source text instead. Sources without
// placeholders keep the size they declare.
//
// COMPILE
// ───────
// The template (specialised to 1×1×1) is parsed and validated with naga
// first. naga renders diagnostics with source excerpts, which is the log a
// `CompilationFailed` carries. The module is then handed to wgpu inside an
// error scope to catch anything the backend rejects on top. Non-error
// messages from the runtime's compilation info form the build log.
//
// ARGUMENTS
// ─────────
// Arguments are positional: argument index N is the parameter declared at
// `@group(0) @binding(N)`. The parameter table is reflected from the naga
// module, restricted to the globals the entry point actually uses, and the
// bind group layout is built from it explicitly:
//
//   var<storage, read>        → ParamKind::Storage { read_only: true }
//   var<storage, read_write>  → ParamKind::Storage { read_only: false }
//   var<uniform>              → ParamKind::Uniform { size }   (scalars)
//
// Binding checks happen in `set_arg`, so a mismatched argument fails there
// rather than at dispatch.

use std::collections::HashMap;
use std::fmt;

use wgpu::util::DeviceExt;

use crate::gpu::buffer::DeviceBuffer;
use crate::gpu::context::Context;
use crate::gpu::dispatch::WorkgroupSize;
use crate::gpu::error::{GpuError, GpuResult};

const WG_PLACEHOLDERS: [&str; 3] = ["{{WG_X}}", "{{WG_Y}}", "{{WG_Z}}"];

/// Replace the workgroup-size placeholders of a WGSL template.
pub fn specialise(template: &str, wg: WorkgroupSize) -> String {
    template
        .replace(WG_PLACEHOLDERS[0], &wg.x.to_string())
        .replace(WG_PLACEHOLDERS[1], &wg.y.to_string())
        .replace(WG_PLACEHOLDERS[2], &wg.z.to_string())
}

// ============================================================
// Reflection
// ============================================================

/// Kind of a kernel parameter, as declared in WGSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// `var<storage, read>` or `var<storage, read_write>`.
    Storage { read_only: bool },
    /// `var<uniform>` holding a fixed-size value of `size` bytes.
    Uniform { size: u32 },
}

/// One positional kernel parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub binding: u32,
    pub name: String,
    pub kind: ParamKind,
}

/// Entry points and their parameter tables, reflected from naga.
struct Reflection {
    entries: Vec<(String, WorkgroupSize, Vec<Param>)>,
}

fn reflect(module: &naga::Module, info: &naga::valid::ModuleInfo) -> Result<Reflection, String> {
    let mut entries = Vec::new();
    for (i, ep) in module.entry_points.iter().enumerate() {
        if ep.stage != naga::ShaderStage::Compute {
            continue;
        }
        let uses = info.get_entry_point(i);
        let mut params = Vec::new();
        for (handle, var) in module.global_variables.iter() {
            if uses[handle].is_empty() {
                continue;
            }
            let Some(rb) = &var.binding else { continue };
            let name = var.name.clone().unwrap_or_else(|| format!("binding{}", rb.binding));
            if rb.group != 0 {
                return Err(format!(
                    "entry point `{}`: `{name}` is in @group({}); only @group(0) is supported",
                    ep.name, rb.group
                ));
            }
            let kind = match var.space {
                naga::AddressSpace::Storage { access } => ParamKind::Storage {
                    read_only: !access.contains(naga::StorageAccess::STORE),
                },
                naga::AddressSpace::Uniform => ParamKind::Uniform {
                    size: module.types[var.ty].inner.size(module.to_ctx()),
                },
                other => {
                    return Err(format!(
                        "entry point `{}`: `{name}` has unsupported address space {other:?}",
                        ep.name
                    ))
                }
            };
            params.push(Param { binding: rb.binding, name, kind });
        }
        params.sort_by_key(|p| p.binding);
        let [x, y, z] = ep.workgroup_size;
        entries.push((ep.name.clone(), WorkgroupSize { x, y, z }, params));
    }
    Ok(Reflection { entries })
}

/// Parse and validate WGSL with naga, rendering any failure as a log.
fn front_end(source: &str) -> Result<(naga::Module, naga::valid::ModuleInfo), String> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;
    let info = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| e.emit_to_string(source))?;
    Ok((module, info))
}

// ============================================================
// Program
// ============================================================

/// Compiled kernel program, owned by a [`Context`].
pub struct Program<'ctx> {
    ctx: &'ctx Context,
    label: String,
    template: String,
    templated: bool,
    reflection: Reflection,
    build_log: String,
    /// wgpu module of the 1×1×1 (or as-declared) specialisation.
    base_module: wgpu::ShaderModule,
}

impl<'ctx> Program<'ctx> {
    /// Compile `source` for the context's device.
    ///
    /// # Errors
    /// `CompilationFailed` with the full diagnostic when the source does
    /// not parse or validate, or when the runtime rejects it.
    pub fn compile(ctx: &'ctx Context, label: &str, source: &str) -> GpuResult<Self> {
        let templated = WG_PLACEHOLDERS.iter().any(|p| source.contains(p));
        let base_src = specialise(source, WorkgroupSize::ONE);

        let (module, info) =
            front_end(&base_src).map_err(|log| GpuError::CompilationFailed { log })?;
        let reflection =
            reflect(&module, &info).map_err(|log| GpuError::CompilationFailed { log })?;

        let (base_module, build_log) = create_shader_module(ctx, label, &base_src)?;
        if !build_log.is_empty() {
            log::warn!("`{label}` compiled with diagnostics:\n{build_log}");
        }

        log::info!(
            "compiled `{label}` (entry points: {:?})",
            reflection.entries.iter().map(|(n, _, _)| n.as_str()).collect::<Vec<_>>()
        );
        Ok(Program {
            ctx,
            label: label.to_string(),
            template: source.to_string(),
            templated,
            reflection,
            build_log,
            base_module,
        })
    }

    /// Non-error compiler messages. Empty on a clean build.
    pub fn build_log(&self) -> &str {
        &self.build_log
    }

    /// Names of every `@compute` entry point.
    pub fn entry_points(&self) -> Vec<&str> {
        self.reflection.entries.iter().map(|(n, _, _)| n.as_str()).collect()
    }

    /// Resolve the entry point `name` into a bindable kernel.
    ///
    /// # Errors
    /// `EntryPointNotFound` when no `@compute` function has that name;
    /// `CompilationFailed` when the runtime rejects the derived layout.
    pub fn create_kernel<'p>(&'p self, name: &str) -> GpuResult<Kernel<'p, 'ctx>> {
        let Some((_, declared, params)) =
            self.reflection.entries.iter().find(|(n, _, _)| n == name)
        else {
            return Err(GpuError::EntryPointNotFound {
                name: name.to_string(),
                available: self.entry_points().into_iter().map(String::from).collect(),
            });
        };

        let layout_entries: Vec<wgpu::BindGroupLayoutEntry> = params
            .iter()
            .map(|p| wgpu::BindGroupLayoutEntry {
                binding: p.binding,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: match p.kind {
                        ParamKind::Storage { read_only } => {
                            wgpu::BufferBindingType::Storage { read_only }
                        }
                        ParamKind::Uniform { .. } => wgpu::BufferBindingType::Uniform,
                    },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect();

        let ((bgl, pipeline_layout), err) = self.ctx.scoped(|device| {
            let bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(name),
                entries: &layout_entries,
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(name),
                bind_group_layouts: &[&bgl],
                push_constant_ranges: &[],
            });
            (bgl, pipeline_layout)
        });
        if let Some(e) = err {
            return Err(GpuError::CompilationFailed {
                log: format!("layout for `{name}` rejected: {e}"),
            });
        }

        let fixed = if self.templated { None } else { Some(*declared) };
        log::debug!("kernel `{name}` params: {params:?}");
        Ok(Kernel {
            program: self,
            entry: name.to_string(),
            fixed,
            slots: params.iter().cloned().map(|param| Slot { param, value: None }).collect(),
            bgl,
            pipeline_layout,
            pipelines: HashMap::new(),
        })
    }

    /// wgpu module for a workgroup size, reusing the base one when possible.
    fn module_for(&self, wg: WorkgroupSize) -> GpuResult<Option<wgpu::ShaderModule>> {
        if !self.templated || wg == WorkgroupSize::ONE {
            return Ok(None);
        }
        let src = specialise(&self.template, wg);
        let label = format!("{} [{wg}]", self.label);
        create_shader_module(self.ctx, &label, &src).map(|(m, _)| Some(m))
    }
}

impl fmt::Debug for Program<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("label", &self.label)
            .field("entry_points", &self.entry_points())
            .field("templated", &self.templated)
            .finish_non_exhaustive()
    }
}

impl Drop for Program<'_> {
    fn drop(&mut self) {
        log::debug!("program `{}` released", self.label);
    }
}

/// Hand WGSL to the runtime; returns the module and its non-error messages.
fn create_shader_module(
    ctx: &Context,
    label: &str,
    source: &str,
) -> GpuResult<(wgpu::ShaderModule, String)> {
    let (module, err) = ctx.scoped(|device| {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        })
    });
    let info = pollster::block_on(module.get_compilation_info());

    let mut errors = Vec::new();
    let mut notes = Vec::new();
    for m in &info.messages {
        let at = m
            .location
            .as_ref()
            .map(|l| format!("{}:{}: ", l.line_number, l.line_position))
            .unwrap_or_default();
        match m.message_type {
            wgpu::CompilationMessageType::Error => errors.push(format!("error: {at}{}", m.message)),
            wgpu::CompilationMessageType::Warning => notes.push(format!("warning: {at}{}", m.message)),
            wgpu::CompilationMessageType::Info => notes.push(format!("info: {at}{}", m.message)),
        }
    }
    if let Some(e) = err {
        errors.push(e.to_string());
    }
    if !errors.is_empty() {
        return Err(GpuError::CompilationFailed { log: errors.join("\n") });
    }
    Ok((module, notes.join("\n")))
}

// ============================================================
// Kernel
// ============================================================

/// A value for one kernel parameter.
pub enum KernelArg<'a, 'ctx> {
    /// A device buffer, for storage parameters.
    Buffer(&'a DeviceBuffer<'ctx>),
    /// Raw bytes of a fixed-size value, for uniform parameters.
    Scalar(Vec<u8>),
}

impl KernelArg<'_, '_> {
    /// Scalar argument from any plain-old-data value.
    pub fn scalar<T: bytemuck::Pod>(value: &T) -> Self {
        KernelArg::Scalar(bytemuck::bytes_of(value).to_vec())
    }
}

struct Slot<'a> {
    param: Param,
    value: Option<Bound<'a>>,
}

enum Bound<'a> {
    Buffer(&'a wgpu::Buffer),
    Scalar(Vec<u8>),
}

/// An entry point of a [`Program`] with its positional argument bindings.
///
/// Bindings persist across dispatches until overwritten.
pub struct Kernel<'p, 'ctx> {
    program: &'p Program<'ctx>,
    entry: String,
    /// Declared workgroup size when the source is not a template.
    fixed: Option<WorkgroupSize>,
    slots: Vec<Slot<'p>>,
    bgl: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<WorkgroupSize, wgpu::ComputePipeline>,
}

impl<'p, 'ctx> Kernel<'p, 'ctx> {
    pub fn name(&self) -> &str {
        &self.entry
    }

    /// Reflected parameter table, ordered by binding.
    pub fn params(&self) -> impl Iterator<Item = &Param> {
        self.slots.iter().map(|s| &s.param)
    }

    /// Bind `arg` to the parameter at `@binding(index)`.
    ///
    /// # Errors
    /// `ArgumentBindingFailed` when there is no such parameter, the
    /// argument kind or size does not match it, the buffer's access mode
    /// contradicts the parameter's, or the buffer is from another context.
    pub fn set_arg(&mut self, index: u32, arg: KernelArg<'p, 'ctx>) -> GpuResult<()> {
        let ctx_id = self.program.ctx.id();
        let entry = self.entry.clone();
        let fail = |reason: String| GpuError::ArgumentBindingFailed { index, reason };

        let bindings: Vec<u32> = self.slots.iter().map(|s| s.param.binding).collect();
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.param.binding == index)
            .ok_or_else(|| {
                fail(format!("kernel `{entry}` has no parameter at binding {index} (bindings: {bindings:?})"))
            })?;
        let name = &slot.param.name;

        let bound = match (arg, slot.param.kind) {
            (KernelArg::Buffer(buf), ParamKind::Storage { read_only }) => {
                if buf.ctx.id() != ctx_id {
                    return Err(fail(format!("buffer `{}` belongs to another context", buf.label())));
                }
                if !read_only && !buf.access().kernel_writes() {
                    return Err(fail(format!(
                        "`{name}` is read_write but buffer `{}` is {:?}",
                        buf.label(),
                        buf.access()
                    )));
                }
                if read_only && !buf.access().kernel_reads() {
                    return Err(fail(format!(
                        "`{name}` is read-only but buffer `{}` is {:?}",
                        buf.label(),
                        buf.access()
                    )));
                }
                Bound::Buffer(&buf.raw)
            }
            (KernelArg::Scalar(bytes), ParamKind::Uniform { size }) => {
                if bytes.len() != size as usize {
                    return Err(fail(format!(
                        "`{name}` takes {size} bytes, got {}",
                        bytes.len()
                    )));
                }
                Bound::Scalar(bytes)
            }
            (KernelArg::Buffer(buf), ParamKind::Uniform { .. }) => {
                return Err(fail(format!(
                    "`{name}` is a scalar parameter, got buffer `{}`",
                    buf.label()
                )))
            }
            (KernelArg::Scalar(_), ParamKind::Storage { .. }) => {
                return Err(fail(format!("`{name}` is a buffer parameter, got a scalar")))
            }
        };

        slot.value = Some(bound);
        log::trace!("kernel `{entry}`: bound binding {index}");
        Ok(())
    }

    /// Whether every parameter currently has a value.
    pub fn is_fully_bound(&self) -> bool {
        self.slots.iter().all(|s| s.value.is_some())
    }

    /// Names of parameters without a value.
    pub fn unbound(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter(|s| s.value.is_none())
            .map(|s| s.param.name.as_str())
            .collect()
    }

    pub(crate) fn context_id(&self) -> u64 {
        self.program.ctx.id()
    }

    /// Workgroup size fixed by the source, if it is not a template.
    pub fn fixed_workgroup_size(&self) -> Option<WorkgroupSize> {
        self.fixed
    }

    /// Build (once) the pipeline specialised to `wg`.
    pub(crate) fn prepare(&mut self, wg: WorkgroupSize) -> GpuResult<()> {
        if self.pipelines.contains_key(&wg) {
            return Ok(());
        }
        let specialised = self.program.module_for(wg)?;
        let module = specialised.as_ref().unwrap_or(&self.program.base_module);

        let (pipeline, err) = self.program.ctx.scoped(|device| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(&self.entry),
                layout: Some(&self.pipeline_layout),
                module,
                entry_point: &self.entry,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            })
        });
        if let Some(e) = err {
            return Err(GpuError::CompilationFailed {
                log: format!("pipeline `{}` [{wg}] rejected: {e}", self.entry),
            });
        }
        log::debug!("pipeline `{}` specialised to {wg}", self.entry);
        self.pipelines.insert(wg, pipeline);
        Ok(())
    }

    pub(crate) fn pipeline(&self, wg: WorkgroupSize) -> Option<&wgpu::ComputePipeline> {
        self.pipelines.get(&wg)
    }

    /// Bind group over the current bindings. Scalar arguments get a
    /// transient uniform buffer each; the buffers are returned so they
    /// outlive the submission that uses the group.
    pub(crate) fn bind_group(&self) -> GpuResult<(wgpu::BindGroup, Vec<wgpu::Buffer>)> {
        let device = &self.program.ctx.device;
        let uniforms: Vec<Option<wgpu::Buffer>> = self
            .slots
            .iter()
            .map(|slot| match &slot.value {
                Some(Bound::Scalar(bytes)) => {
                    Some(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(&slot.param.name),
                        contents: bytes,
                        usage: wgpu::BufferUsages::UNIFORM,
                    }))
                }
                _ => None,
            })
            .collect();

        let mut entries = Vec::with_capacity(self.slots.len());
        for (slot, uniform) in self.slots.iter().zip(&uniforms) {
            let resource = match (&slot.value, uniform) {
                (Some(Bound::Buffer(buf)), _) => buf.as_entire_binding(),
                (Some(Bound::Scalar(_)), Some(u)) => u.as_entire_binding(),
                _ => {
                    return Err(GpuError::DispatchFailed(format!(
                        "kernel `{}`: parameter `{}` is unbound",
                        self.entry, slot.param.name
                    )))
                }
            };
            entries.push(wgpu::BindGroupEntry { binding: slot.param.binding, resource });
        }

        let (group, err) = self.program.ctx.scoped(|device| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&self.entry),
                layout: &self.bgl,
                entries: &entries,
            })
        });
        if let Some(e) = err {
            return Err(GpuError::DispatchFailed(format!(
                "kernel `{}`: bind group rejected: {e}",
                self.entry
            )));
        }
        drop(entries);
        Ok((group, uniforms.into_iter().flatten().collect()))
    }
}

impl Drop for Kernel<'_, '_> {
    fn drop(&mut self) {
        log::debug!("kernel `{}` released", self.entry);
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::buffer::AccessMode;
    use crate::gpu::testutil::any_context;

    const TWO_PARAMS: &str = r#"
struct Params { scale: u32 }

@group(0) @binding(0) var<storage, read> src: array<u32>;
@group(0) @binding(1) var<storage, read_write> dst: array<u32>;
@group(0) @binding(2) var<uniform> params: Params;

@compute @workgroup_size({{WG_X}}, {{WG_Y}}, {{WG_Z}})
fn scale(@builtin(global_invocation_id) gid: vec3<u32>) {
    dst[gid.x] = src[gid.x] * params.scale;
}

@compute @workgroup_size(1)
fn clear(@builtin(global_invocation_id) gid: vec3<u32>) {
    dst[gid.x] = 0u;
}
"#;

    fn reflect_src(src: &str) -> Reflection {
        let (module, info) = front_end(&specialise(src, WorkgroupSize::ONE)).expect("valid WGSL");
        reflect(&module, &info).expect("reflectable")
    }

    #[test]
    fn test_specialise_replaces_all_placeholders() {
        let out = specialise(
            "@workgroup_size({{WG_X}}, {{WG_Y}}, {{WG_Z}})",
            WorkgroupSize { x: 16, y: 8, z: 1 },
        );
        assert_eq!(out, "@workgroup_size(16, 8, 1)");
    }

    #[test]
    fn test_reflect_params_per_entry_point() {
        let r = reflect_src(TWO_PARAMS);
        assert_eq!(r.entries.len(), 2);

        let (_, _, scale) = r.entries.iter().find(|(n, _, _)| n == "scale").unwrap();
        assert_eq!(scale.len(), 3);
        assert_eq!(scale[0].kind, ParamKind::Storage { read_only: true });
        assert_eq!(scale[1].kind, ParamKind::Storage { read_only: false });
        assert_eq!(scale[2].kind, ParamKind::Uniform { size: 4 });
        assert_eq!(scale[2].name, "params");

        // `clear` only touches dst, so only binding 1 is a parameter.
        let (_, wg, clear) = r.entries.iter().find(|(n, _, _)| n == "clear").unwrap();
        assert_eq!(clear.len(), 1);
        assert_eq!(clear[0].binding, 1);
        assert_eq!(*wg, WorkgroupSize::ONE);
    }

    #[test]
    fn test_syntax_error_renders_diagnostic() {
        let log = front_end("fn broken( { }").err().expect("must not parse");
        assert!(!log.is_empty());
    }

    #[test]
    fn test_validation_error_renders_diagnostic() {
        // Type error: assigning f32 to a u32 element.
        let src = r#"
@group(0) @binding(0) var<storage, read_write> dst: array<u32>;
@compute @workgroup_size(1)
fn main() { dst[0] = 1.5; }
"#;
        assert!(front_end(src).is_err());
    }

    #[test]
    fn test_other_bind_groups_rejected() {
        let src = r#"
@group(1) @binding(0) var<storage, read_write> dst: array<u32>;
@compute @workgroup_size(1)
fn main() { dst[0] = 1u; }
"#;
        let (module, info) = front_end(src).unwrap();
        let err = reflect(&module, &info).err().expect("group 1 unsupported");
        assert!(err.contains("@group(1)"));
    }

    #[test]
    fn test_kernel_arg_scalar_bytes() {
        match KernelArg::scalar(&7u32) {
            KernelArg::Scalar(b) => assert_eq!(b, vec![7, 0, 0, 0]),
            KernelArg::Buffer(_) => panic!("expected scalar"),
        }
    }

    // ---- GPU tests (subprocess-isolated) ----------------------------------

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_compile_errors_and_entry_points() {
        let ctx = any_context();
        let err = Program::compile(&ctx, "broken", "fn nope( {").err().unwrap();
        match err {
            GpuError::CompilationFailed { log } => assert!(!log.is_empty()),
            other => panic!("unexpected {other}"),
        }

        let program = Program::compile(&ctx, "two", TWO_PARAMS).unwrap();
        assert_eq!(program.entry_points(), vec!["scale", "clear"]);
        assert!(!program.build_log().contains("error"));
        let err = program.create_kernel("missing").err().unwrap();
        assert!(matches!(err, GpuError::EntryPointNotFound { .. }));
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_binding_checks() {
        let ctx = any_context();
        let program = Program::compile(&ctx, "two", TWO_PARAMS).unwrap();
        let input = DeviceBuffer::allocate(&ctx, "in", 16, AccessMode::ReadOnly).unwrap();
        let output = DeviceBuffer::allocate(&ctx, "out", 16, AccessMode::ReadWrite).unwrap();
        let mut k = program.create_kernel("scale").unwrap();
        let bindings: Vec<u32> = k.params().map(|p| p.binding).collect();
        assert_eq!(bindings, vec![0, 1, 2]);

        // Out of range index.
        let e = k.set_arg(7, KernelArg::Buffer(&input)).err().unwrap();
        assert!(matches!(e, GpuError::ArgumentBindingFailed { index: 7, .. }));
        // Read-only buffer into a read_write parameter.
        let e = k.set_arg(1, KernelArg::Buffer(&input)).err().unwrap();
        assert!(matches!(e, GpuError::ArgumentBindingFailed { index: 1, .. }));
        // Scalar into a storage parameter, buffer into a uniform.
        assert!(k.set_arg(0, KernelArg::scalar(&1u32)).is_err());
        assert!(k.set_arg(2, KernelArg::Buffer(&output)).is_err());
        // Wrong scalar size.
        assert!(k.set_arg(2, KernelArg::scalar(&1u64)).is_err());

        k.set_arg(0, KernelArg::Buffer(&input)).unwrap();
        k.set_arg(1, KernelArg::Buffer(&output)).unwrap();
        assert!(!k.is_fully_bound());
        assert_eq!(k.unbound(), vec!["params"]);
        k.set_arg(2, KernelArg::scalar(&3u32)).unwrap();
        assert!(k.is_fully_bound());
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "requires a real GPU runtime"]
    fn test_compile_errors_and_entry_points() {
        let out = crate::gpu::run_gpu_test_in_subprocess(
            "gpu::program::tests::inner_compile_errors_and_entry_points",
        );
        assert!(out.contains("GPU_TEST_OK"), "inner test failed:\n{out}");
    }

    #[test]
    #[ignore = "requires a real GPU runtime"]
    fn test_binding_checks() {
        let out = crate::gpu::run_gpu_test_in_subprocess("gpu::program::tests::inner_binding_checks");
        assert!(out.contains("GPU_TEST_OK"), "inner test failed:\n{out}");
    }
}
