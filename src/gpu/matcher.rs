use crate::geometry::Point;
use crate::gpu::device::{DeviceContext, DeviceManager, DevicePreference};
use crate::image::GrayscaleMatrix;
use crate::search::{
    validate_inputs, MatchParams, MatchResult, SearchGrid, TemplateMatcher, TieBreak,
};
use crate::trace::{trace_event, trace_span};
use crate::util::{TriggerError, TriggerResult};
use bytemuck::{Pod, Zeroable};
use std::time::Instant;
use wgpu::util::DeviceExt;

/// Result slot contents before dispatch: not found, no coordinates, and a
/// best index larger than any candidate.
const SLOT_INIT: [u32; 4] = [0, 0, 0, u32::MAX];
const SLOT_BYTES: u64 = std::mem::size_of::<[u32; 4]>() as u64;

/// Uniform block mirroring `Params` in the kernel.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct KernelParams {
    source_width: u32,
    source_height: u32,
    template_width: u32,
    template_height: u32,
    grid_width: u32,
    grid_height: u32,
    threshold: f32,
    tolerance: f32,
    tie_break: u32,
    _pad: [u32; 3],
}

impl KernelParams {
    fn new(
        source: &GrayscaleMatrix,
        template: &GrayscaleMatrix,
        grid: SearchGrid,
        params: &MatchParams,
    ) -> Self {
        Self {
            source_width: source.width() as u32,
            source_height: source.height() as u32,
            template_width: template.width() as u32,
            template_height: template.height() as u32,
            grid_width: grid.width as u32,
            grid_height: grid.height as u32,
            threshold: params.threshold,
            tolerance: params.tolerance,
            tie_break: match params.tie_break {
                TieBreak::FirstFound => 0,
                TieBreak::RowMajor => 1,
            },
            _pad: [0; 3],
        }
    }
}

/// Per-call device buffers; destroyed together when the guard drops,
/// whichever way the call exits.
struct CallBuffers {
    source: wgpu::Buffer,
    template: wgpu::Buffer,
    slot: wgpu::Buffer,
    params: wgpu::Buffer,
    readback: wgpu::Buffer,
}

impl CallBuffers {
    fn allocate(
        device: &wgpu::Device,
        source: &GrayscaleMatrix,
        template: &GrayscaleMatrix,
        params: &KernelParams,
    ) -> Self {
        let source = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("source"),
            contents: bytemuck::cast_slice(source.as_slice()),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let template = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("template"),
            contents: bytemuck::cast_slice(template.as_slice()),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let slot = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("match slot"),
            contents: bytemuck::cast_slice(&SLOT_INIT),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        });
        let params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("params"),
            contents: bytemuck::bytes_of(params),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("slot readback"),
            size: SLOT_BYTES,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            source,
            template,
            slot,
            params,
            readback,
        }
    }
}

impl Drop for CallBuffers {
    fn drop(&mut self) {
        self.readback.destroy();
        self.params.destroy();
        self.slot.destroy();
        self.template.destroy();
        self.source.destroy();
    }
}

/// Interprets the slot words read back after a dispatch.
pub(crate) fn decode_slot(words: [u32; 4], grid: SearchGrid, tie_break: TieBreak) -> MatchResult {
    let [found, x, y, best_index] = words;
    match tie_break {
        TieBreak::RowMajor if best_index != u32::MAX => {
            let (x, y) = grid.offset(best_index as usize);
            MatchResult::FoundAt(Point::new(x as i32, y as i32))
        }
        TieBreak::FirstFound if found != 0 => {
            MatchResult::FoundAt(Point::new(x as i32, y as i32))
        }
        _ => MatchResult::NotFound,
    }
}

fn check_binding(ctx: &DeviceContext, matrix: &GrayscaleMatrix) -> TriggerResult<()> {
    let size = std::mem::size_of_val(matrix.as_slice()) as u64;
    if size > ctx.max_storage_binding {
        return Err(TriggerError::BufferTooLarge {
            size,
            limit: ctx.max_storage_binding,
        });
    }
    Ok(())
}

/// Runs one search on a live context. Inputs must already be validated.
fn dispatch_search(
    ctx: &DeviceContext,
    source: &GrayscaleMatrix,
    template: &GrayscaleMatrix,
    grid: SearchGrid,
    params: &MatchParams,
) -> TriggerResult<MatchResult> {
    check_binding(ctx, source)?;
    check_binding(ctx, template)?;
    if grid.len() >= u32::MAX as usize {
        return Err(TriggerError::InvalidInput(
            "candidate grid exceeds the device index range",
        ));
    }
    let (groups_x, groups_y) = ctx
        .workgroup_size
        .dispatch_size(grid.width as u32, grid.height as u32);
    if groups_x > ctx.max_workgroups_per_dimension || groups_y > ctx.max_workgroups_per_dimension
    {
        return Err(TriggerError::Dispatch(format!(
            "{groups_x}x{groups_y} workgroups exceed the per-dimension limit of {}",
            ctx.max_workgroups_per_dimension
        )));
    }

    let device = &ctx.device;
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let kernel_params = KernelParams::new(source, template, grid, params);
    let buffers = CallBuffers::allocate(device, source, template, &kernel_params);

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("match BG"),
        layout: &ctx.bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: buffers.source.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: buffers.template.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: buffers.slot.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: buffers.params.as_entire_binding(),
            },
        ],
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("match encoder"),
    });
    {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("find_first_match"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&ctx.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(groups_x, groups_y, 1);
    }
    encoder.copy_buffer_to_buffer(&buffers.slot, 0, &buffers.readback, 0, SLOT_BYTES);
    ctx.queue.submit(std::iter::once(encoder.finish()));

    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());
    if let Some(err) = validation.or(out_of_memory) {
        return Err(TriggerError::Dispatch(err.to_string()));
    }

    let words = read_slot(device, &buffers.readback)?;
    drop(bind_group);
    drop(buffers);
    Ok(decode_slot(words, grid, params.tie_break))
}

fn read_slot(device: &wgpu::Device, readback: &wgpu::Buffer) -> TriggerResult<[u32; 4]> {
    let slice = readback.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |r| {
        let _ = tx.send(r);
    });
    device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .map_err(|e| TriggerError::Readback(e.to_string()))?
        .map_err(|e| TriggerError::Readback(e.to_string()))?;

    let words: [u32; 4] = {
        let mapped = slice.get_mapped_range();
        bytemuck::pod_read_unaligned(&mapped[..SLOT_BYTES as usize])
    };
    readback.unmap();
    Ok(words)
}

/// Device-backed first-match search.
///
/// The device context is created on the first call and reused afterwards.
/// Validation runs before initialization, so a malformed call never touches
/// the device.
pub struct GpuMatcher {
    manager: DeviceManager,
}

impl GpuMatcher {
    pub fn new(preference: DevicePreference) -> Self {
        Self {
            manager: DeviceManager::new(preference),
        }
    }

    pub fn manager(&self) -> &DeviceManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut DeviceManager {
        &mut self.manager
    }

    /// Eagerly binds a device and compiles the kernel.
    pub fn ensure_initialized(&mut self) -> bool {
        self.manager.ensure_initialized()
    }

    pub fn describe(&self) -> String {
        self.manager.describe()
    }
}

impl Default for GpuMatcher {
    fn default() -> Self {
        Self::new(DevicePreference::default())
    }
}

impl TemplateMatcher for GpuMatcher {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn try_find_first_match(
        &mut self,
        source: &GrayscaleMatrix,
        template: &GrayscaleMatrix,
        params: &MatchParams,
    ) -> TriggerResult<MatchResult> {
        let grid = validate_inputs(source, template, params)?;
        let ctx = self.manager.try_initialize()?;
        let _span = trace_span!("gpu_search", candidates = grid.len()).entered();
        let started = Instant::now();
        let result = dispatch_search(ctx, source, template, grid, params)?;
        trace_event!(
            "gpu_search_done",
            found = result.is_found(),
            elapsed_us = started.elapsed().as_micros() as u64
        );
        Ok(result)
    }
}
