use std::collections::HashMap;
use std::ffi::CString;
use std::mem;

use anyhow::{anyhow, Context, Result};
use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use shaderc::ShaderKind;
use winit::window::Window;

use crate::backend::{
    resolve_bindings, BackendError, BlendMode, Capabilities, FilterMode, GpuBackend,
    PassConstants, Program, ProgramHandle, SampleFormat, Sampler, TargetDesc, TargetId, Uniform,
};
use crate::display::SURFACE_CLEAR;
use crate::render::config::{
    capabilities_from_features, choose_extent, choose_present_mode, choose_surface_format,
    target_format,
};
use crate::render::shaders;

const DESCRIPTOR_SETS_PER_FRAME: u32 = 4096;
const SAMPLER_BINDINGS: u32 = 2;

struct RenderTarget {
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    framebuffer: vk::Framebuffer,
    extent: vk::Extent2D,
    filter: FilterMode,
}

struct Swapchain {
    handle: vk::SwapchainKHR,
    views: Vec<vk::ImageView>,
    framebuffers: Vec<vk::Framebuffer>,
    extent: vk::Extent2D,
}

#[derive(Clone, Copy)]
struct ProgramPipelines {
    target: vk::Pipeline,
    surface: vk::Pipeline,
}

#[derive(Default)]
struct Frame {
    recording: bool,
    image_index: Option<u32>,
    image_wait_pending: bool,
    surface_cleared: bool,
}

pub struct VulkanBackend {
    _entry: ash::Entry,
    instance: ash::Instance,
    surface_loader: ash::extensions::khr::Surface,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    queue: vk::Queue,
    queue_family_index: u32,
    swapchain_loader: ash::extensions::khr::Swapchain,
    swapchain: Swapchain,
    surface_format: vk::SurfaceFormatKHR,
    surface_size: (u32, u32),
    swapchain_dirty: bool,
    capabilities: Capabilities,
    target_format: SampleFormat,
    linear_filtering: bool,
    target_render_pass: vk::RenderPass,
    surface_clear_pass: vk::RenderPass,
    surface_load_pass: vk::RenderPass,
    descriptor_set_layout: vk::DescriptorSetLayout,
    pipeline_layout: vk::PipelineLayout,
    vertex_module: vk::ShaderModule,
    pipelines: Vec<Option<ProgramPipelines>>,
    linear_sampler: vk::Sampler,
    nearest_sampler: vk::Sampler,
    targets: HashMap<TargetId, RenderTarget>,
    next_target: u32,
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    descriptor_pool: vk::DescriptorPool,
    image_available: vk::Semaphore,
    render_finished: vk::Semaphore,
    in_flight_fence: vk::Fence,
    frame: Frame,
    current: Option<ProgramHandle>,
    constants: PassConstants,
    bound: [Option<TargetId>; Sampler::COUNT],
}

impl VulkanBackend {
    pub fn new(window: &Window) -> Result<Self> {
        let entry = unsafe { ash::Entry::load().context("load Vulkan entry")? };
        let app_name = CString::new("inkflow")?;
        let engine_name = CString::new("inkflow")?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(0)
            .engine_name(&engine_name)
            .engine_version(0)
            .api_version(vk::API_VERSION_1_0);
        let extension_names =
            ash_window::enumerate_required_extensions(window.raw_display_handle())
                .context("enumerate required extensions")?;
        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(extension_names);
        let instance = unsafe {
            entry
                .create_instance(&create_info, None)
                .context("create Vulkan instance")?
        };
        let surface = unsafe {
            ash_window::create_surface(
                &entry,
                &instance,
                window.raw_display_handle(),
                window.raw_window_handle(),
                None,
            )
            .context("create surface")?
        };
        let surface_loader = ash::extensions::khr::Surface::new(&entry, &instance);
        let (physical_device, queue_family_index) =
            pick_physical_device(&instance, &surface_loader, surface)?;

        let half_features = format_features(&instance, physical_device, SampleFormat::HalfFloat);
        let unorm_features = format_features(&instance, physical_device, SampleFormat::Unorm8);
        let capabilities = capabilities_from_features(half_features, unorm_features)
            .ok_or_else(|| anyhow!("no render target format can be drawn to and sampled"))?;
        let target_format = capabilities.preferred_format();
        let linear_filtering = match target_format {
            SampleFormat::HalfFloat => capabilities.half_float_linear,
            SampleFormat::Unorm8 => {
                unorm_features.contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR)
            }
        };
        log::info!(
            "render targets: {:?}, linear filtering {}",
            target_format,
            if linear_filtering { "on" } else { "off" }
        );

        let queue_priorities = [1.0_f32];
        let queue_info = [vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(queue_family_index)
            .queue_priorities(&queue_priorities)
            .build()];
        let device_extensions = [ash::extensions::khr::Swapchain::name().as_ptr()];
        let device_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_info)
            .enabled_extension_names(&device_extensions);
        let device = unsafe {
            instance
                .create_device(physical_device, &device_info, None)
                .context("create logical device")?
        };
        let queue = unsafe { device.get_device_queue(queue_family_index, 0) };
        let swapchain_loader = ash::extensions::khr::Swapchain::new(&instance, &device);

        let formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(physical_device, surface)
                .context("surface formats")?
        };
        let surface_format = choose_surface_format(&formats);
        let size = window.inner_size();
        let surface_size = (size.width, size.height);

        let target_render_pass = create_target_render_pass(&device, target_format)?;
        let surface_clear_pass = create_surface_render_pass(&device, surface_format.format, true)?;
        let surface_load_pass = create_surface_render_pass(&device, surface_format.format, false)?;
        let swapchain = create_swapchain(
            &device,
            &swapchain_loader,
            &surface_loader,
            surface,
            physical_device,
            surface_format,
            surface_size,
            queue_family_index,
            surface_clear_pass,
            vk::SwapchainKHR::null(),
        )?;

        let descriptor_set_layout = create_descriptor_set_layout(&device)?;
        let pipeline_layout = create_pipeline_layout(&device, descriptor_set_layout)?;
        let vert_spv = compile_shader(&shaders::vertex_source(), ShaderKind::Vertex, "pass.vert")?;
        let vertex_module = create_shader_module(&device, &vert_spv)?;
        let linear_sampler = create_sampler(&device, vk::Filter::LINEAR)?;
        let nearest_sampler = create_sampler(&device, vk::Filter::NEAREST)?;
        let command_pool = create_command_pool(&device, queue_family_index)?;
        let command_buffer = create_command_buffer(&device, command_pool)?;
        let descriptor_pool = create_descriptor_pool(&device)?;
        let (image_available, render_finished, in_flight_fence) = create_sync_objects(&device)?;

        Ok(Self {
            _entry: entry,
            instance,
            surface_loader,
            surface,
            physical_device,
            device,
            queue,
            queue_family_index,
            swapchain_loader,
            swapchain,
            surface_format,
            surface_size,
            swapchain_dirty: false,
            capabilities,
            target_format,
            linear_filtering,
            target_render_pass,
            surface_clear_pass,
            surface_load_pass,
            descriptor_set_layout,
            pipeline_layout,
            vertex_module,
            pipelines: vec![None; Program::ALL.len()],
            linear_sampler,
            nearest_sampler,
            targets: HashMap::new(),
            next_target: 1,
            command_pool,
            command_buffer,
            descriptor_pool,
            image_available,
            render_finished,
            in_flight_fence,
            frame: Frame::default(),
            current: None,
            constants: PassConstants::default(),
            bound: [None; Sampler::COUNT],
        })
    }

    pub fn set_surface_size(&mut self, size: (u32, u32)) {
        if size != self.surface_size {
            self.surface_size = size;
            self.swapchain_dirty = true;
        }
    }

    fn begin_frame(&mut self) -> Result<()> {
        if self.frame.recording {
            return Ok(());
        }
        unsafe {
            self.device
                .wait_for_fences(&[self.in_flight_fence], true, u64::MAX)
                .context("wait for in-flight fence")?;
            self.device
                .reset_descriptor_pool(self.descriptor_pool, vk::DescriptorPoolResetFlags::empty())
                .context("reset descriptor pool")?;
            self.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .context("reset command buffer")?;
            let begin_info = vk::CommandBufferBeginInfo::builder()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .context("begin command buffer")?;
        }
        self.frame.recording = true;
        Ok(())
    }

    fn submit(&mut self, signal: bool) -> Result<()> {
        let mut wait_semaphores = Vec::with_capacity(1);
        let mut wait_stages = Vec::with_capacity(1);
        if self.frame.image_wait_pending {
            wait_semaphores.push(self.image_available);
            wait_stages.push(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
            self.frame.image_wait_pending = false;
        }
        let signal_semaphores: &[vk::Semaphore] = if signal {
            std::slice::from_ref(&self.render_finished)
        } else {
            &[]
        };
        let command_buffers = [self.command_buffer];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(signal_semaphores);
        unsafe {
            self.device
                .end_command_buffer(self.command_buffer)
                .context("end command buffer")?;
            self.device
                .reset_fences(&[self.in_flight_fence])
                .context("reset in-flight fence")?;
            self.device
                .queue_submit(self.queue, &[submit_info.build()], self.in_flight_fence)
                .context("queue submit")?;
        }
        self.frame.recording = false;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.frame.recording {
            self.submit(false)?;
        }
        unsafe {
            self.device
                .wait_for_fences(&[self.in_flight_fence], true, u64::MAX)
                .context("wait for flushed commands")?;
        }
        Ok(())
    }

    fn recreate_swapchain(&mut self) -> Result<()> {
        if self.surface_size.0 == 0 || self.surface_size.1 == 0 {
            return Err(anyhow!("surface has no area"));
        }
        unsafe {
            self.device
                .device_wait_idle()
                .context("wait before swapchain rebuild")?;
        }
        let fresh = create_swapchain(
            &self.device,
            &self.swapchain_loader,
            &self.surface_loader,
            self.surface,
            self.physical_device,
            self.surface_format,
            self.surface_size,
            self.queue_family_index,
            self.surface_clear_pass,
            self.swapchain.handle,
        )?;
        let stale = mem::replace(&mut self.swapchain, fresh);
        destroy_swapchain(&self.device, &self.swapchain_loader, stale);
        self.swapchain_dirty = false;
        log::info!(
            "swapchain rebuilt at {}x{}",
            self.swapchain.extent.width,
            self.swapchain.extent.height
        );
        Ok(())
    }

    fn acquire_image(&mut self) -> Result<u32> {
        if let Some(index) = self.frame.image_index {
            return Ok(index);
        }
        let extent = self.swapchain.extent;
        if self.swapchain_dirty || (extent.width, extent.height) != self.surface_size {
            self.recreate_swapchain()?;
        }
        for _ in 0..2 {
            let acquired = unsafe {
                self.swapchain_loader.acquire_next_image(
                    self.swapchain.handle,
                    u64::MAX,
                    self.image_available,
                    vk::Fence::null(),
                )
            };
            match acquired {
                Ok((index, _)) => {
                    self.frame.image_index = Some(index);
                    self.frame.image_wait_pending = true;
                    self.frame.surface_cleared = false;
                    return Ok(index);
                }
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => self.recreate_swapchain()?,
                Err(err) => return Err(anyhow!("acquire next image: {err}")),
            }
        }
        Err(anyhow!("swapchain stayed out of date"))
    }

    fn allocate_descriptor_set(&self) -> std::result::Result<vk::DescriptorSet, vk::Result> {
        let layouts = [self.descriptor_set_layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.descriptor_pool)
            .set_layouts(&layouts);
        unsafe { self.device.allocate_descriptor_sets(&alloc_info).map(|sets| sets[0]) }
    }

    fn frame_descriptor_set(&mut self) -> Result<vk::DescriptorSet> {
        match self.allocate_descriptor_set() {
            Ok(set) => Ok(set),
            Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL) => {
                log::debug!("descriptor pool exhausted mid-frame, flushing");
                self.flush()?;
                self.begin_frame()?;
                self.allocate_descriptor_set()
                    .map_err(|err| anyhow!("allocate descriptor set after flush: {err}"))
            }
            Err(err) => Err(anyhow!("allocate descriptor set: {err}")),
        }
    }

    fn sampler_for(&self, target: &RenderTarget) -> vk::Sampler {
        if target.filter == FilterMode::Linear && self.linear_filtering {
            self.linear_sampler
        } else {
            self.nearest_sampler
        }
    }

    fn record_draw(
        &mut self,
        program: Program,
        sources: &[TargetId],
        target: Option<TargetId>,
    ) -> std::result::Result<(), BackendError> {
        let pipelines = self.pipelines[program.index()].ok_or(BackendError::NoProgram)?;
        for id in sources.iter().chain(target.iter()) {
            if !self.targets.contains_key(id) {
                return Err(BackendError::UnknownTarget(*id));
            }
        }
        self.begin_frame()?;
        let descriptor_set = self.frame_descriptor_set()?;
        let (pipeline, render_pass, framebuffer, extent) = match target {
            Some(id) => {
                let target = self.targets.get(&id).ok_or(BackendError::UnknownTarget(id))?;
                (
                    pipelines.target,
                    self.target_render_pass,
                    target.framebuffer,
                    target.extent,
                )
            }
            None => {
                let index = self.acquire_image()?;
                let render_pass = if self.frame.surface_cleared {
                    self.surface_load_pass
                } else {
                    self.surface_clear_pass
                };
                self.frame.surface_cleared = true;
                (
                    pipelines.surface,
                    render_pass,
                    self.swapchain.framebuffers[index as usize],
                    self.swapchain.extent,
                )
            }
        };

        let image_infos = (0..SAMPLER_BINDINGS as usize)
            .map(|binding| -> std::result::Result<vk::DescriptorImageInfo, BackendError> {
                let id = sources.get(binding).or(sources.first()).copied();
                let source = id
                    .and_then(|id| self.targets.get(&id))
                    .ok_or(BackendError::UnboundSampler {
                        program,
                        sampler: program.samplers()[0],
                    })?;
                Ok(vk::DescriptorImageInfo::builder()
                    .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                    .image_view(source.view)
                    .sampler(self.sampler_for(source))
                    .build())
            })
            .collect::<std::result::Result<Vec<_>, BackendError>>()?;
        let writes: Vec<vk::WriteDescriptorSet> = image_infos
            .iter()
            .enumerate()
            .map(|(binding, info)| {
                vk::WriteDescriptorSet::builder()
                    .dst_set(descriptor_set)
                    .dst_binding(binding as u32)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(std::slice::from_ref(info))
                    .build()
            })
            .collect();

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: SURFACE_CLEAR,
            },
        }];
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let render_pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(&clear_values);
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let constants = unsafe {
            std::slice::from_raw_parts(
                (&self.constants as *const PassConstants).cast::<u8>(),
                mem::size_of::<PassConstants>(),
            )
        };
        let cb = self.command_buffer;
        unsafe {
            self.device.update_descriptor_sets(&writes, &[]);
            self.device
                .cmd_begin_render_pass(cb, &render_pass_info, vk::SubpassContents::INLINE);
            self.device.cmd_set_viewport(cb, 0, &[viewport]);
            self.device.cmd_set_scissor(cb, 0, &[render_area]);
            self.device
                .cmd_bind_pipeline(cb, vk::PipelineBindPoint::GRAPHICS, pipeline);
            self.device.cmd_bind_descriptor_sets(
                cb,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout,
                0,
                &[descriptor_set],
                &[],
            );
            self.device.cmd_push_constants(
                cb,
                self.pipeline_layout,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                0,
                constants,
            );
            self.device.cmd_draw(cb, 3, 1, 0, 0);
            self.device.cmd_end_render_pass(cb);
        }
        Ok(())
    }

    fn build_program(&self, program: Program) -> Result<ProgramPipelines> {
        let name = format!("{program}.frag");
        let frag_spv = compile_shader(
            &shaders::fragment_source(program),
            ShaderKind::Fragment,
            &name,
        )?;
        let frag_module = create_shader_module(&self.device, &frag_spv)?;
        let blend = program.blend();
        let target = create_pipeline(
            &self.device,
            self.target_render_pass,
            self.pipeline_layout,
            self.vertex_module,
            frag_module,
            blend,
        );
        let surface = create_pipeline(
            &self.device,
            self.surface_clear_pass,
            self.pipeline_layout,
            self.vertex_module,
            frag_module,
            blend,
        );
        unsafe {
            self.device.destroy_shader_module(frag_module, None);
        }
        match (target, surface) {
            (Ok(target), Ok(surface)) => Ok(ProgramPipelines { target, surface }),
            (target, surface) => {
                let mut first_err = None;
                for built in [target, surface] {
                    match built {
                        Ok(pipeline) => unsafe { self.device.destroy_pipeline(pipeline, None) },
                        Err(err) => {
                            first_err.get_or_insert(err);
                        }
                    }
                }
                Err(first_err.unwrap_or_else(|| anyhow!("pipeline creation failed")))
            }
        }
    }

    fn release_target(&self, target: RenderTarget) {
        unsafe {
            self.device.destroy_framebuffer(target.framebuffer, None);
            self.device.destroy_image_view(target.view, None);
            self.device.destroy_image(target.image, None);
            self.device.free_memory(target.memory, None);
        }
    }
}

impl GpuBackend for VulkanBackend {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn surface_size(&self) -> (u32, u32) {
        self.surface_size
    }

    fn compile_program(&mut self, program: Program) -> std::result::Result<ProgramHandle, BackendError> {
        if self.pipelines[program.index()].is_none() {
            let pipelines = self
                .build_program(program)
                .map_err(|err| BackendError::Compile {
                    program,
                    message: format!("{err:#}"),
                })?;
            self.pipelines[program.index()] = Some(pipelines);
        }
        Ok(ProgramHandle { program })
    }

    fn create_render_target(&mut self, desc: &TargetDesc) -> std::result::Result<TargetId, BackendError> {
        if desc.format != self.target_format {
            return Err(BackendError::Unsupported(format!(
                "{:?} render targets on a {:?} device",
                desc.format, self.target_format
            )));
        }
        let extent = vk::Extent2D {
            width: desc.grid.width(),
            height: desc.grid.height(),
        };
        let format = target_format(desc.format);
        let (image, memory) = create_image(
            &self.instance,
            &self.device,
            self.physical_device,
            extent,
            format,
            vk::ImageUsageFlags::COLOR_ATTACHMENT
                | vk::ImageUsageFlags::SAMPLED
                | vk::ImageUsageFlags::TRANSFER_DST,
        )?;
        let view = create_image_view(&self.device, image, format)?;
        let framebuffer = create_framebuffer(&self.device, self.target_render_pass, view, extent)?;
        clear_new_target(&self.device, self.command_pool, self.queue, image)?;
        let id = TargetId(self.next_target);
        self.next_target += 1;
        self.targets.insert(
            id,
            RenderTarget {
                image,
                memory,
                view,
                framebuffer,
                extent,
                filter: desc.filter,
            },
        );
        Ok(id)
    }

    fn destroy_render_target(&mut self, target: TargetId) {
        let Some(render_target) = self.targets.remove(&target) else {
            return;
        };
        if let Err(err) = self.flush() {
            log::warn!("flush before releasing {target:?} failed: {err:#}");
        }
        for slot in &mut self.bound {
            if *slot == Some(target) {
                *slot = None;
            }
        }
        self.release_target(render_target);
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.current = Some(program);
    }

    fn set_uniform(&mut self, uniform: Uniform) {
        self.constants.apply(uniform);
    }

    fn bind_texture(&mut self, sampler: Sampler, target: TargetId) {
        self.bound[sampler.index()] = Some(target);
    }

    fn draw_fullscreen_quad(&mut self, target: Option<TargetId>) -> std::result::Result<(), BackendError> {
        let program = self.current.ok_or(BackendError::NoProgram)?.program;
        let sources = resolve_bindings(program, &self.bound, target)?;
        self.record_draw(program, &sources, target)
    }

    fn present(&mut self) -> std::result::Result<(), BackendError> {
        let Some(image_index) = self.frame.image_index else {
            if self.frame.recording {
                self.flush()?;
            }
            return Ok(());
        };
        self.begin_frame()?;
        self.submit(true)?;
        self.frame = Frame::default();
        let wait = [self.render_finished];
        let swapchains = [self.swapchain.handle];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait)
            .swapchains(&swapchains)
            .image_indices(&image_indices);
        let presented = unsafe { self.swapchain_loader.queue_present(self.queue, &present_info) };
        match presented {
            Ok(false) => Ok(()),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR | vk::Result::SUBOPTIMAL_KHR) => {
                self.swapchain_dirty = true;
                Ok(())
            }
            Err(err) => Err(BackendError::Device(format!("queue present: {err}"))),
        }
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
        }
        let targets: Vec<RenderTarget> = self.targets.drain().map(|(_, target)| target).collect();
        for target in targets {
            self.release_target(target);
        }
        unsafe {
            for pipelines in self.pipelines.iter().flatten() {
                self.device.destroy_pipeline(pipelines.target, None);
                self.device.destroy_pipeline(pipelines.surface, None);
            }
            self.device.destroy_fence(self.in_flight_fence, None);
            self.device.destroy_semaphore(self.render_finished, None);
            self.device.destroy_semaphore(self.image_available, None);
            self.device.destroy_descriptor_pool(self.descriptor_pool, None);
            self.device.destroy_command_pool(self.command_pool, None);
            self.device.destroy_sampler(self.linear_sampler, None);
            self.device.destroy_sampler(self.nearest_sampler, None);
            self.device.destroy_shader_module(self.vertex_module, None);
            self.device.destroy_pipeline_layout(self.pipeline_layout, None);
            self.device
                .destroy_descriptor_set_layout(self.descriptor_set_layout, None);
        }
        let swapchain = mem::replace(
            &mut self.swapchain,
            Swapchain {
                handle: vk::SwapchainKHR::null(),
                views: Vec::new(),
                framebuffers: Vec::new(),
                extent: vk::Extent2D::default(),
            },
        );
        destroy_swapchain(&self.device, &self.swapchain_loader, swapchain);
        unsafe {
            self.device.destroy_render_pass(self.target_render_pass, None);
            self.device.destroy_render_pass(self.surface_clear_pass, None);
            self.device.destroy_render_pass(self.surface_load_pass, None);
            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            self.instance.destroy_instance(None);
        }
    }
}

fn format_features(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    format: SampleFormat,
) -> vk::FormatFeatureFlags {
    let properties = unsafe {
        instance.get_physical_device_format_properties(physical_device, target_format(format))
    };
    properties.optimal_tiling_features
}

fn pick_physical_device(
    instance: &ash::Instance,
    surface_loader: &ash::extensions::khr::Surface,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, u32)> {
    let devices = unsafe {
        instance
            .enumerate_physical_devices()
            .context("enumerate physical devices")?
    };
    devices
        .iter()
        .copied()
        .find_map(|device| {
            find_queue_family(instance, surface_loader, surface, device)
                .map(|queue_family_index| (device, queue_family_index))
        })
        .ok_or_else(|| anyhow!("no compatible Vulkan physical device found"))
}

fn find_queue_family(
    instance: &ash::Instance,
    surface_loader: &ash::extensions::khr::Surface,
    surface: vk::SurfaceKHR,
    device: vk::PhysicalDevice,
) -> Option<u32> {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
    families.iter().enumerate().find_map(|(index, family)| {
        let supports_graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        let supports_present = unsafe {
            surface_loader
                .get_physical_device_surface_support(device, index as u32, surface)
                .ok()?
        };
        (supports_graphics && supports_present).then_some(index as u32)
    })
}

#[allow(clippy::too_many_arguments)]
fn create_swapchain(
    device: &ash::Device,
    swapchain_loader: &ash::extensions::khr::Swapchain,
    surface_loader: &ash::extensions::khr::Surface,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
    surface_format: vk::SurfaceFormatKHR,
    size: (u32, u32),
    queue_family_index: u32,
    render_pass: vk::RenderPass,
    old_swapchain: vk::SwapchainKHR,
) -> Result<Swapchain> {
    let capabilities = unsafe {
        surface_loader
            .get_physical_device_surface_capabilities(physical_device, surface)
            .context("surface capabilities")?
    };
    let present_modes = unsafe {
        surface_loader
            .get_physical_device_surface_present_modes(physical_device, surface)
            .context("present modes")?
    };
    let present_mode = choose_present_mode(&present_modes);
    let extent = choose_extent(&capabilities, size);
    if extent.width == 0 || extent.height == 0 {
        return Err(anyhow!("surface has no area"));
    }
    let image_count = desired_image_count(&capabilities);
    let indices = [queue_family_index];
    let create_info = vk::SwapchainCreateInfoKHR::builder()
        .surface(surface)
        .min_image_count(image_count)
        .image_format(surface_format.format)
        .image_color_space(surface_format.color_space)
        .image_extent(extent)
        .image_array_layers(1)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
        .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        .queue_family_indices(&indices)
        .pre_transform(capabilities.current_transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(present_mode)
        .clipped(true)
        .old_swapchain(old_swapchain);
    let handle = unsafe {
        swapchain_loader
            .create_swapchain(&create_info, None)
            .context("create swapchain")?
    };
    let images = unsafe {
        swapchain_loader
            .get_swapchain_images(handle)
            .context("swapchain images")?
    };
    let views = images
        .iter()
        .map(|image| create_image_view(device, *image, surface_format.format))
        .collect::<Result<Vec<_>>>()?;
    let framebuffers = views
        .iter()
        .map(|view| create_framebuffer(device, render_pass, *view, extent))
        .collect::<Result<Vec<_>>>()?;
    Ok(Swapchain {
        handle,
        views,
        framebuffers,
        extent,
    })
}

fn destroy_swapchain(
    device: &ash::Device,
    swapchain_loader: &ash::extensions::khr::Swapchain,
    swapchain: Swapchain,
) {
    unsafe {
        for framebuffer in swapchain.framebuffers {
            device.destroy_framebuffer(framebuffer, None);
        }
        for view in swapchain.views {
            device.destroy_image_view(view, None);
        }
        if swapchain.handle != vk::SwapchainKHR::null() {
            swapchain_loader.destroy_swapchain(swapchain.handle, None);
        }
    }
}

fn desired_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}

fn create_image_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
) -> Result<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping::default())
        .subresource_range(color_range());
    unsafe {
        device
            .create_image_view(&create_info, None)
            .context("create image view")
    }
}

fn color_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

fn create_framebuffer(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    view: vk::ImageView,
    extent: vk::Extent2D,
) -> Result<vk::Framebuffer> {
    let attachments = [view];
    let framebuffer_info = vk::FramebufferCreateInfo::builder()
        .render_pass(render_pass)
        .attachments(&attachments)
        .width(extent.width)
        .height(extent.height)
        .layers(1);
    unsafe {
        device
            .create_framebuffer(&framebuffer_info, None)
            .context("create framebuffer")
    }
}

// Offscreen targets live in SHADER_READ_ONLY between passes; every pass
// overwrites all texels, so previous contents are never loaded.
fn create_target_render_pass(device: &ash::Device, format: SampleFormat) -> Result<vk::RenderPass> {
    let color_attachment = vk::AttachmentDescription::builder()
        .format(target_format(format))
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::DONT_CARE)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
        .final_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    let dependencies = [
        vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::FRAGMENT_SHADER,
            )
            .dst_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::FRAGMENT_SHADER,
            )
            .src_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::SHADER_READ)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::SHADER_READ)
            .build(),
        vk::SubpassDependency::builder()
            .src_subpass(0)
            .dst_subpass(vk::SUBPASS_EXTERNAL)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_stage_mask(vk::PipelineStageFlags::FRAGMENT_SHADER)
            .src_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
            .dst_access_mask(vk::AccessFlags::SHADER_READ)
            .build(),
    ];
    create_render_pass(device, color_attachment.build(), &dependencies)
}

fn create_surface_render_pass(
    device: &ash::Device,
    format: vk::Format,
    clear: bool,
) -> Result<vk::RenderPass> {
    let (load_op, initial_layout) = if clear {
        (vk::AttachmentLoadOp::CLEAR, vk::ImageLayout::UNDEFINED)
    } else {
        (vk::AttachmentLoadOp::LOAD, vk::ImageLayout::PRESENT_SRC_KHR)
    };
    let color_attachment = vk::AttachmentDescription::builder()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(load_op)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(initial_layout)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);
    let dependencies = [vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::COLOR_ATTACHMENT_READ,
        )
        .build()];
    create_render_pass(device, color_attachment.build(), &dependencies)
}

fn create_render_pass(
    device: &ash::Device,
    color_attachment: vk::AttachmentDescription,
    dependencies: &[vk::SubpassDependency],
) -> Result<vk::RenderPass> {
    let color_attachment_ref = vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    };
    let subpass = vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(std::slice::from_ref(&color_attachment_ref));
    let attachments = [color_attachment];
    let subpasses = [subpass.build()];
    let render_pass_info = vk::RenderPassCreateInfo::builder()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(dependencies);
    unsafe {
        device
            .create_render_pass(&render_pass_info, None)
            .context("create render pass")
    }
}

fn create_descriptor_set_layout(device: &ash::Device) -> Result<vk::DescriptorSetLayout> {
    let bindings: Vec<vk::DescriptorSetLayoutBinding> = (0..SAMPLER_BINDINGS)
        .map(|binding| {
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::FRAGMENT)
                .build()
        })
        .collect();
    let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
    unsafe {
        device
            .create_descriptor_set_layout(&layout_info, None)
            .context("create descriptor set layout")
    }
}

fn create_pipeline_layout(
    device: &ash::Device,
    descriptor_set_layout: vk::DescriptorSetLayout,
) -> Result<vk::PipelineLayout> {
    let layouts = [descriptor_set_layout];
    let push_constants = [vk::PushConstantRange {
        stage_flags: vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
        offset: 0,
        size: mem::size_of::<PassConstants>() as u32,
    }];
    let pipeline_layout_info = vk::PipelineLayoutCreateInfo::builder()
        .set_layouts(&layouts)
        .push_constant_ranges(&push_constants);
    unsafe {
        device
            .create_pipeline_layout(&pipeline_layout_info, None)
            .context("create pipeline layout")
    }
}

fn create_pipeline(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    pipeline_layout: vk::PipelineLayout,
    vert_module: vk::ShaderModule,
    frag_module: vk::ShaderModule,
    blend: BlendMode,
) -> Result<vk::Pipeline> {
    let entry = CString::new("main")?;
    let shader_stages = [
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vert_module)
            .name(&entry)
            .build(),
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(frag_module)
            .name(&entry)
            .build(),
    ];
    let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder();
    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false);
    let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
        .viewport_count(1)
        .scissor_count(1);
    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state =
        vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);
    let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .cull_mode(vk::CullModeFlags::NONE)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .line_width(1.0);
    let multisample = vk::PipelineMultisampleStateCreateInfo::builder()
        .sample_shading_enable(false)
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);
    let color_blend_attachment = match blend {
        BlendMode::Replace => vk::PipelineColorBlendAttachmentState {
            blend_enable: 0,
            src_color_blend_factor: vk::BlendFactor::ONE,
            dst_color_blend_factor: vk::BlendFactor::ZERO,
            color_blend_op: vk::BlendOp::ADD,
            src_alpha_blend_factor: vk::BlendFactor::ONE,
            dst_alpha_blend_factor: vk::BlendFactor::ZERO,
            alpha_blend_op: vk::BlendOp::ADD,
            color_write_mask: vk::ColorComponentFlags::RGBA,
        },
        BlendMode::Alpha => vk::PipelineColorBlendAttachmentState {
            blend_enable: 1,
            src_color_blend_factor: vk::BlendFactor::SRC_ALPHA,
            dst_color_blend_factor: vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
            color_blend_op: vk::BlendOp::ADD,
            src_alpha_blend_factor: vk::BlendFactor::SRC_ALPHA,
            dst_alpha_blend_factor: vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
            alpha_blend_op: vk::BlendOp::ADD,
            color_write_mask: vk::ColorComponentFlags::RGBA,
        },
    };
    let color_blend_attachments = [color_blend_attachment];
    let color_blend = vk::PipelineColorBlendStateCreateInfo::builder()
        .logic_op_enable(false)
        .attachments(&color_blend_attachments);
    let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .dynamic_state(&dynamic_state)
        .rasterization_state(&rasterizer)
        .multisample_state(&multisample)
        .color_blend_state(&color_blend)
        .layout(pipeline_layout)
        .render_pass(render_pass)
        .subpass(0);
    let pipelines = unsafe {
        device
            .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info.build()], None)
            .map_err(|(_, err)| anyhow!("create graphics pipeline: {err:?}"))?
    };
    pipelines
        .first()
        .copied()
        .ok_or_else(|| anyhow!("create graphics pipeline: no pipeline returned"))
}

fn compile_shader(source: &str, kind: ShaderKind, name: &str) -> Result<Vec<u32>> {
    let compiler = shaderc::Compiler::new().ok_or_else(|| anyhow!("shader compiler missing"))?;
    let mut options =
        shaderc::CompileOptions::new().ok_or_else(|| anyhow!("shader options missing"))?;
    options.set_optimization_level(shaderc::OptimizationLevel::Performance);
    let binary = compiler
        .compile_into_spirv(source, kind, name, "main", Some(&options))
        .map_err(|err| anyhow!("compile shader {name}: {err}"))?;
    Ok(binary.as_binary().to_vec())
}

fn create_shader_module(device: &ash::Device, code: &[u32]) -> Result<vk::ShaderModule> {
    let create_info = vk::ShaderModuleCreateInfo::builder().code(code);
    unsafe {
        device
            .create_shader_module(&create_info, None)
            .context("create shader module")
    }
}

fn create_sampler(device: &ash::Device, filter: vk::Filter) -> Result<vk::Sampler> {
    let sampler_info = vk::SamplerCreateInfo::builder()
        .mag_filter(filter)
        .min_filter(filter)
        .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
        .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
        .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
        .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
        .max_anisotropy(1.0)
        .border_color(vk::BorderColor::FLOAT_TRANSPARENT_BLACK);
    unsafe {
        device
            .create_sampler(&sampler_info, None)
            .context("create sampler")
    }
}

fn create_descriptor_pool(device: &ash::Device) -> Result<vk::DescriptorPool> {
    let pool_sizes = [vk::DescriptorPoolSize {
        ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        descriptor_count: DESCRIPTOR_SETS_PER_FRAME * SAMPLER_BINDINGS,
    }];
    let pool_info = vk::DescriptorPoolCreateInfo::builder()
        .pool_sizes(&pool_sizes)
        .max_sets(DESCRIPTOR_SETS_PER_FRAME);
    unsafe {
        device
            .create_descriptor_pool(&pool_info, None)
            .context("create descriptor pool")
    }
}

fn create_image(
    instance: &ash::Instance,
    device: &ash::Device,
    physical_device: vk::PhysicalDevice,
    extent: vk::Extent2D,
    format: vk::Format,
    usage: vk::ImageUsageFlags,
) -> Result<(vk::Image, vk::DeviceMemory)> {
    let image_info = vk::ImageCreateInfo::builder()
        .image_type(vk::ImageType::TYPE_2D)
        .format(format)
        .extent(vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        })
        .mip_levels(1)
        .array_layers(1)
        .samples(vk::SampleCountFlags::TYPE_1)
        .tiling(vk::ImageTiling::OPTIMAL)
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .initial_layout(vk::ImageLayout::UNDEFINED);
    let image = unsafe {
        device
            .create_image(&image_info, None)
            .context("create image")?
    };
    let mem_requirements = unsafe { device.get_image_memory_requirements(image) };
    let memory_type = find_memory_type(
        instance,
        physical_device,
        mem_requirements,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;
    let alloc_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(mem_requirements.size)
        .memory_type_index(memory_type);
    let memory = unsafe {
        device
            .allocate_memory(&alloc_info, None)
            .context("allocate image memory")?
    };
    unsafe {
        device
            .bind_image_memory(image, memory, 0)
            .context("bind image memory")?;
    }
    Ok((image, memory))
}

fn find_memory_type(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    requirements: vk::MemoryRequirements,
    properties: vk::MemoryPropertyFlags,
) -> Result<u32> {
    let mem_properties =
        unsafe { instance.get_physical_device_memory_properties(physical_device) };
    for (index, mem_type) in mem_properties.memory_types.iter().enumerate() {
        let supported = requirements.memory_type_bits & (1 << index) != 0;
        if supported && mem_type.property_flags.contains(properties) {
            return Ok(index as u32);
        }
    }
    Err(anyhow!("no suitable memory type found"))
}

fn begin_single_time_commands(
    device: &ash::Device,
    command_pool: vk::CommandPool,
) -> Result<vk::CommandBuffer> {
    let alloc_info = vk::CommandBufferAllocateInfo::builder()
        .command_pool(command_pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(1);
    let command_buffer = unsafe {
        device
            .allocate_command_buffers(&alloc_info)
            .context("allocate single-use command buffer")?[0]
    };
    let begin_info =
        vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
    unsafe {
        device
            .begin_command_buffer(command_buffer, &begin_info)
            .context("begin single-use command buffer")?;
    }
    Ok(command_buffer)
}

fn end_single_time_commands(
    device: &ash::Device,
    command_pool: vk::CommandPool,
    queue: vk::Queue,
    command_buffer: vk::CommandBuffer,
) -> Result<()> {
    unsafe {
        device
            .end_command_buffer(command_buffer)
            .context("end single-use command buffer")?;
        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
        device
            .queue_submit(queue, &[submit_info.build()], vk::Fence::null())
            .context("submit single-use command buffer")?;
        device.queue_wait_idle(queue).context("wait for queue")?;
        device.free_command_buffers(command_pool, &command_buffers);
    }
    Ok(())
}

fn layout_barrier(
    image: vk::Image,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
    src_access: vk::AccessFlags,
    dst_access: vk::AccessFlags,
) -> vk::ImageMemoryBarrier {
    vk::ImageMemoryBarrier::builder()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_access_mask(src_access)
        .dst_access_mask(dst_access)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(color_range())
        .build()
}

fn clear_new_target(
    device: &ash::Device,
    command_pool: vk::CommandPool,
    queue: vk::Queue,
    image: vk::Image,
) -> Result<()> {
    let command_buffer = begin_single_time_commands(device, command_pool)?;
    let to_transfer = layout_barrier(
        image,
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::AccessFlags::empty(),
        vk::AccessFlags::TRANSFER_WRITE,
    );
    let to_sampled = layout_barrier(
        image,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        vk::AccessFlags::TRANSFER_WRITE,
        vk::AccessFlags::SHADER_READ,
    );
    let zero = vk::ClearColorValue {
        float32: [0.0; 4],
    };
    unsafe {
        device.cmd_pipeline_barrier(
            command_buffer,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::TRANSFER,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[to_transfer],
        );
        device.cmd_clear_color_image(
            command_buffer,
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &zero,
            &[color_range()],
        );
        device.cmd_pipeline_barrier(
            command_buffer,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[to_sampled],
        );
    }
    end_single_time_commands(device, command_pool, queue, command_buffer)
}

fn create_command_pool(device: &ash::Device, queue_family_index: u32) -> Result<vk::CommandPool> {
    let pool_info = vk::CommandPoolCreateInfo::builder()
        .queue_family_index(queue_family_index)
        .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
    unsafe {
        device
            .create_command_pool(&pool_info, None)
            .context("create command pool")
    }
}

fn create_command_buffer(
    device: &ash::Device,
    command_pool: vk::CommandPool,
) -> Result<vk::CommandBuffer> {
    let alloc_info = vk::CommandBufferAllocateInfo::builder()
        .command_pool(command_pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(1);
    let buffers = unsafe {
        device
            .allocate_command_buffers(&alloc_info)
            .context("allocate frame command buffer")?
    };
    buffers
        .first()
        .copied()
        .ok_or_else(|| anyhow!("no frame command buffer allocated"))
}

fn create_sync_objects(device: &ash::Device) -> Result<(vk::Semaphore, vk::Semaphore, vk::Fence)> {
    let semaphore_info = vk::SemaphoreCreateInfo::builder();
    let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);
    let image_available = unsafe {
        device
            .create_semaphore(&semaphore_info, None)
            .context("create image available semaphore")?
    };
    let render_finished = unsafe {
        device
            .create_semaphore(&semaphore_info, None)
            .context("create render finished semaphore")?
    };
    let in_flight_fence = unsafe {
        device
            .create_fence(&fence_info, None)
            .context("create in-flight fence")?
    };
    Ok((image_available, render_finished, in_flight_fence))
}
