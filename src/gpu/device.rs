//! Compute device discovery, kernel compilation and context lifetime.
//!
//! A [`DeviceManager`] owns at most one [`DeviceContext`]. The context is
//! created lazily on the first search, stays warm across searches (the kernel
//! is compiled exactly once) and is released on [`DeviceManager::teardown`] or
//! drop. Initialization is all-or-nothing: a context is stored only after the
//! device, queue and kernel pipeline all exist.
//!
//! Adapter selection walks an ordered list of device classes (GPU first, then
//! software/CPU adapters by default) and binds the first adapter that hands
//! out a device.

use crate::trace::{trace_debug, trace_event, trace_warn};
use crate::util::{TriggerError, TriggerResult};
use std::fmt;

const KERNEL_SOURCE: &str = include_str!("../shaders/find_first_match.wgsl");

/// Entry point of the match kernel.
pub const KERNEL_ENTRY_POINT: &str = "find_first_match";

/// Capability class an adapter must belong to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceClass {
    /// Hardware or passthrough GPUs.
    Gpu,
    /// Software rasterizers exposing compute on the host (llvmpipe, WARP).
    Cpu,
}

impl DeviceClass {
    /// Returns `true` when an adapter of type `ty` belongs to this class.
    pub fn accepts(self, ty: wgpu::DeviceType) -> bool {
        match self {
            DeviceClass::Gpu => matches!(
                ty,
                wgpu::DeviceType::DiscreteGpu
                    | wgpu::DeviceType::IntegratedGpu
                    | wgpu::DeviceType::VirtualGpu
                    | wgpu::DeviceType::Other
            ),
            DeviceClass::Cpu => matches!(ty, wgpu::DeviceType::Cpu),
        }
    }

    /// Ordering inside a class; lower binds first.
    fn rank(ty: wgpu::DeviceType) -> u8 {
        match ty {
            wgpu::DeviceType::DiscreteGpu => 0,
            wgpu::DeviceType::IntegratedGpu => 1,
            wgpu::DeviceType::VirtualGpu => 2,
            wgpu::DeviceType::Other => 3,
            wgpu::DeviceType::Cpu => 4,
        }
    }
}

/// Which device classes may be bound, in order of preference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DevicePreference {
    /// Try GPUs, fall back to CPU adapters.
    #[default]
    GpuThenCpu,
    GpuOnly,
    CpuOnly,
}

impl DevicePreference {
    /// Candidate classes tried in sequence.
    pub fn candidates(self) -> &'static [DeviceClass] {
        match self {
            DevicePreference::GpuThenCpu => &[DeviceClass::Gpu, DeviceClass::Cpu],
            DevicePreference::GpuOnly => &[DeviceClass::Gpu],
            DevicePreference::CpuOnly => &[DeviceClass::Cpu],
        }
    }
}

/// A workgroup configuration for the 2-D match dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkgroupSize {
    pub x: u32,
    pub y: u32,
}

impl WorkgroupSize {
    /// Total invocations per workgroup (x * y).
    pub fn total(&self) -> u32 {
        self.x * self.y
    }

    /// Picks 16x16 tiles, or 8x8 on devices that cannot run 256 invocations
    /// per group.
    pub fn for_limits(limits: &wgpu::Limits) -> Self {
        let fits_wide = limits.max_compute_invocations_per_workgroup >= 256
            && limits.max_compute_workgroup_size_x >= 16
            && limits.max_compute_workgroup_size_y >= 16;
        if fits_wide {
            WorkgroupSize { x: 16, y: 16 }
        } else {
            WorkgroupSize { x: 8, y: 8 }
        }
    }

    /// Number of workgroups needed to cover a `width x height` grid.
    ///
    /// Uses ceiling division; the kernel discards invocations past the grid.
    pub fn dispatch_size(&self, width: u32, height: u32) -> (u32, u32) {
        (width.div_ceil(self.x), height.div_ceil(self.y))
    }
}

impl fmt::Display for WorkgroupSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} ({} invocations)", self.x, self.y, self.total())
    }
}

/// Cached adapter information for logging.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
}

impl AdapterInfo {
    /// Coarse device kind label.
    pub fn kind(&self) -> &'static str {
        match self.device_type {
            wgpu::DeviceType::DiscreteGpu
            | wgpu::DeviceType::IntegratedGpu
            | wgpu::DeviceType::VirtualGpu => "GPU",
            wgpu::DeviceType::Cpu => "CPU",
            wgpu::DeviceType::Other => "Unknown",
        }
    }
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Device: {} ({})", self.name, self.kind())
    }
}

/// Everything a search needs from the device, kept alive between searches.
///
/// # Field drop order
/// Fields drop top to bottom: pipeline, binding layout, queue, device, then
/// the instance, so no object outlives what it was created from.
pub struct DeviceContext {
    pub(crate) pipeline: wgpu::ComputePipeline,
    pub(crate) bind_group_layout: wgpu::BindGroupLayout,
    pub(crate) queue: wgpu::Queue,
    pub(crate) device: wgpu::Device,
    pub adapter_info: AdapterInfo,
    pub workgroup_size: WorkgroupSize,
    /// Largest storage buffer the kernel may bind, in bytes.
    pub max_storage_binding: u64,
    /// Largest workgroup count per dispatch dimension.
    pub max_workgroups_per_dimension: u32,
    _instance: wgpu::Instance,
}

impl DeviceContext {
    /// Binds a device according to `preference` and compiles the kernel.
    pub fn create(preference: DevicePreference) -> TriggerResult<Self> {
        pollster::block_on(Self::create_async(preference))
    }

    async fn create_async(preference: DevicePreference) -> TriggerResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let mut adapters = instance.enumerate_adapters(wgpu::Backends::all());
        if adapters.is_empty() {
            return Err(TriggerError::NoAdapter);
        }
        adapters.sort_by_key(|a| DeviceClass::rank(a.get_info().device_type));
        for adapter in &adapters {
            let info = adapter.get_info();
            trace_debug!(
                "compute adapter: {} ({:?}, {:?})",
                info.name,
                info.backend,
                info.device_type
            );
        }

        let mut bound = None;
        'classes: for class in preference.candidates() {
            for adapter in adapters
                .iter()
                .filter(|a| class.accepts(a.get_info().device_type))
            {
                let info = adapter.get_info();
                let request = adapter.request_device(
                    &wgpu::DeviceDescriptor {
                        label: Some("glyphtrigger"),
                        required_features: wgpu::Features::empty(),
                        required_limits: adapter.limits(),
                        memory_hints: wgpu::MemoryHints::default(),
                    },
                    None,
                );
                match request.await {
                    Ok((device, queue)) => {
                        bound = Some((info, device, queue));
                        break 'classes;
                    }
                    Err(err) => {
                        trace_warn!("device request on {} failed: {}", info.name, err);
                    }
                }
            }
            trace_warn!("no {:?} adapter could bind a device", class);
        }
        let (raw_info, device, queue): (wgpu::AdapterInfo, wgpu::Device, wgpu::Queue) =
            bound.ok_or(TriggerError::NoDevice)?;

        device.on_uncaptured_error(Box::new(|err: wgpu::Error| {
            trace_warn!("uncaptured device error: {}", err);
        }));

        let limits = device.limits();
        let workgroup_size = WorkgroupSize::for_limits(&limits);
        let (bind_group_layout, pipeline) =
            build_kernel(&device, &kernel_source(workgroup_size)).await?;

        let adapter_info = AdapterInfo {
            name: raw_info.name,
            device_type: raw_info.device_type,
            backend: raw_info.backend,
        };
        trace_event!(
            "device_ready",
            adapter = adapter_info.name.as_str(),
            kind = adapter_info.kind(),
            workgroup = workgroup_size.total(),
            max_storage_mb = u64::from(limits.max_storage_buffer_binding_size) >> 20
        );

        Ok(DeviceContext {
            pipeline,
            bind_group_layout,
            queue,
            device,
            adapter_info,
            workgroup_size,
            max_storage_binding: u64::from(limits.max_storage_buffer_binding_size)
                .min(limits.max_buffer_size),
            max_workgroups_per_dimension: limits.max_compute_workgroups_per_dimension,
            _instance: instance,
        })
    }

    /// Releases pipeline, layout, queue and device in that order.
    pub fn release(self) {
        let DeviceContext {
            pipeline,
            bind_group_layout,
            queue,
            device,
            adapter_info,
            _instance,
            ..
        } = self;
        drop(pipeline);
        drop(bind_group_layout);
        drop(queue);
        device.destroy();
        drop(device);
        drop(_instance);
        trace_debug!("released {}", adapter_info);
    }
}

/// Kernel source specialized for `workgroup`.
pub fn kernel_source(workgroup: WorkgroupSize) -> String {
    KERNEL_SOURCE
        .replace("{{WG_X}}", &workgroup.x.to_string())
        .replace("{{WG_Y}}", &workgroup.y.to_string())
}

/// Compiles `source` into the match pipeline.
///
/// Compilation and validation errors are captured through an error scope and
/// returned as [`TriggerError::KernelBuild`] carrying the compiler log.
pub async fn build_kernel(
    device: &wgpu::Device,
    source: &str,
) -> TriggerResult<(wgpu::BindGroupLayout, wgpu::ComputePipeline)> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("find_first_match.wgsl"),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let storage = |binding, read_only| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    };
    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("match BGL"),
        entries: &[
            // source samples
            storage(0, true),
            // template samples
            storage(1, true),
            // result slot
            storage(2, false),
            // params uniform
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("match pipeline layout"),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(KERNEL_ENTRY_POINT),
        layout: Some(&pipeline_layout),
        module: &module,
        entry_point: KERNEL_ENTRY_POINT,
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        cache: None,
    });

    if let Some(err) = device.pop_error_scope().await {
        let log = err.to_string();
        trace_warn!("match kernel failed to build:\n{}", log);
        return Err(TriggerError::KernelBuild { log });
    }
    Ok((bind_group_layout, pipeline))
}

/// Owner of the lazily created [`DeviceContext`].
pub struct DeviceManager {
    preference: DevicePreference,
    context: Option<DeviceContext>,
}

impl DeviceManager {
    pub fn new(preference: DevicePreference) -> Self {
        Self {
            preference,
            context: None,
        }
    }

    pub fn preference(&self) -> DevicePreference {
        self.preference
    }

    pub fn is_initialized(&self) -> bool {
        self.context.is_some()
    }

    /// Returns the live context, if any.
    pub fn context(&self) -> Option<&DeviceContext> {
        self.context.as_ref()
    }

    /// Initializes the context once; later calls return it immediately.
    pub fn try_initialize(&mut self) -> TriggerResult<&DeviceContext> {
        if self.context.is_none() {
            self.context = Some(DeviceContext::create(self.preference)?);
        }
        self.context.as_ref().ok_or(TriggerError::NoDevice)
    }

    /// Like [`try_initialize`](Self::try_initialize), reporting only success.
    pub fn ensure_initialized(&mut self) -> bool {
        match self.try_initialize() {
            Ok(_) => true,
            Err(err) => {
                trace_warn!("device initialization failed: {}", err);
                false
            }
        }
    }

    /// Releases the context; the next search initializes a fresh one.
    pub fn teardown(&mut self) {
        if let Some(context) = self.context.take() {
            context.release();
        }
    }

    /// Human-readable description of the bound device.
    pub fn describe(&self) -> String {
        match &self.context {
            Some(context) => context.adapter_info.to_string(),
            None => "Device is not initialized.".to_string(),
        }
    }
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new(DevicePreference::default())
    }
}

impl Drop for DeviceManager {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tests touching a real adapter are `#[ignore]`d so `cargo test` passes on
    // machines without one. Run them with `cargo test -- --include-ignored`.

    #[test]
    fn preference_orders_candidates() {
        assert_eq!(
            DevicePreference::GpuThenCpu.candidates(),
            &[DeviceClass::Gpu, DeviceClass::Cpu]
        );
        assert_eq!(DevicePreference::GpuOnly.candidates(), &[DeviceClass::Gpu]);
        assert_eq!(DevicePreference::CpuOnly.candidates(), &[DeviceClass::Cpu]);
    }

    #[test]
    fn classes_partition_device_types() {
        for ty in [
            wgpu::DeviceType::DiscreteGpu,
            wgpu::DeviceType::IntegratedGpu,
            wgpu::DeviceType::VirtualGpu,
            wgpu::DeviceType::Other,
            wgpu::DeviceType::Cpu,
        ] {
            assert_ne!(DeviceClass::Gpu.accepts(ty), DeviceClass::Cpu.accepts(ty));
        }
    }

    #[test]
    fn workgroup_prefers_16x16() {
        let ws = WorkgroupSize::for_limits(&wgpu::Limits::default());
        assert_eq!(ws, WorkgroupSize { x: 16, y: 16 });
        assert_eq!(ws.total(), 256);
    }

    #[test]
    fn workgroup_falls_back_on_small_devices() {
        let limits = wgpu::Limits {
            max_compute_invocations_per_workgroup: 128,
            ..wgpu::Limits::default()
        };
        assert_eq!(WorkgroupSize::for_limits(&limits), WorkgroupSize { x: 8, y: 8 });
    }

    #[test]
    fn dispatch_size_uses_ceiling() {
        let ws = WorkgroupSize { x: 16, y: 16 };
        assert_eq!(ws.dispatch_size(91, 71), (6, 5));
        assert_eq!(ws.dispatch_size(32, 16), (2, 1));
        assert_eq!(ws.dispatch_size(1, 1), (1, 1));
    }

    #[test]
    fn kernel_source_is_specialized() {
        let src = kernel_source(WorkgroupSize { x: 8, y: 8 });
        assert!(src.contains("@workgroup_size(8, 8, 1)"));
        assert!(!src.contains("{{WG_X}}"));
        assert!(src.contains(KERNEL_ENTRY_POINT));
    }

    #[test]
    fn manager_starts_torn_down() {
        let mut manager = DeviceManager::default();
        assert!(!manager.is_initialized());
        assert_eq!(manager.describe(), "Device is not initialized.");
        manager.teardown();
        assert!(manager.context().is_none());
    }

    #[test]
    #[ignore = "requires a compute adapter"]
    fn initialization_is_idempotent() {
        let mut manager = DeviceManager::default();
        assert!(manager.ensure_initialized());
        let name = manager.describe();
        assert!(manager.ensure_initialized());
        assert_eq!(manager.describe(), name);
        manager.teardown();
        assert!(!manager.is_initialized());
    }

    #[test]
    #[ignore = "requires a compute adapter"]
    fn broken_kernel_reports_compiler_log() {
        let mut manager = DeviceManager::default();
        let context = manager.try_initialize().expect("need a compute adapter");
        let err = pollster::block_on(build_kernel(&context.device, "fn broken( {"))
            .err()
            .expect("garbage must not compile");
        match err {
            TriggerError::KernelBuild { log } => assert!(!log.is_empty()),
            other => panic!("unexpected error: {other}"),
        }
    }
}
