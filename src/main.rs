use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use inkflow::{
    ConfigError, FluidConfig, FluidSimulation, FrameDriver, PointerTracker, Splat, SystemClock,
    TickOutcome, VulkanBackend,
};
use winit::{
    event::{ElementState, Event, TouchPhase, VirtualKeyCode, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    window::WindowBuilder,
};

#[derive(Parser, Debug)]
#[command(version, about = "Interactive ink in a stable-fluids simulation", long_about = None)]
struct Args {
    /// RON file with fluid settings; presets are used when absent.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    sim_resolution: Option<u32>,

    #[arg(long)]
    dye_resolution: Option<u32>,

    /// Force the reduced preset regardless of window width.
    #[arg(long)]
    mobile: bool,

    #[arg(long, default_value_t = 1280)]
    width: u32,

    #[arg(long, default_value_t = 720)]
    height: u32,
}

fn build_config(args: &Args, surface_width: u32) -> Result<FluidConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => FluidConfig::load(path)?,
        None if args.mobile => FluidConfig::mobile(),
        None => FluidConfig::for_surface_width(surface_width),
    };
    config.apply_env_overrides()?;
    if let Some(resolution) = args.sim_resolution {
        config.sim_resolution = resolution;
    }
    if let Some(resolution) = args.dye_resolution {
        config.dye_resolution = resolution;
    }
    config.validate()?;
    Ok(config)
}

fn submit_splat(sim: &mut FluidSimulation<VulkanBackend>, splat: Option<Splat>) {
    let Some(splat) = splat else {
        return;
    };
    if let Err(err) = sim.splat(&splat) {
        log::warn!("splat failed: {err}");
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let event_loop = EventLoop::new();
    let window = WindowBuilder::new()
        .with_title("inkflow")
        .with_inner_size(winit::dpi::PhysicalSize::new(args.width, args.height))
        .build(&event_loop)?;
    let config = build_config(&args, window.inner_size().width)?;

    let backend = match VulkanBackend::new(&window) {
        Ok(backend) => backend,
        Err(err) => {
            log::warn!("no usable GPU, fluid disabled: {err:#}");
            return Ok(());
        }
    };
    let mut pointers = PointerTracker::new(&config);
    let mut sim = match FluidSimulation::new(backend, config) {
        Ok(sim) => Some(sim),
        Err(err) => {
            log::warn!("fluid disabled: {err}");
            return Ok(());
        }
    };

    let mut driver = FrameDriver::new(SystemClock::new());
    let stop = driver.stop_handle();
    let running = Arc::new(AtomicBool::new(true));
    let gate = {
        let running = Arc::clone(&running);
        move || running.load(Ordering::Relaxed)
    };

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;
        let Some(fluid) = sim.as_mut() else {
            *control_flow = ControlFlow::Exit;
            return;
        };
        let active = running.load(Ordering::Relaxed);
        match event {
            Event::WindowEvent {
                event: WindowEvent::CloseRequested,
                ..
            } => {
                log::info!("stopping");
                stop.stop();
            }
            Event::WindowEvent {
                event: WindowEvent::Resized(size),
                ..
            } => fluid
                .backend_mut()
                .set_surface_size((size.width, size.height)),
            Event::WindowEvent {
                event: WindowEvent::KeyboardInput { input, .. },
                ..
            } => {
                if input.state == ElementState::Pressed
                    && input.virtual_keycode == Some(VirtualKeyCode::Space)
                {
                    running.store(!active, Ordering::Relaxed);
                }
            }
            Event::WindowEvent {
                event: WindowEvent::CursorMoved { position, .. },
                ..
            } => {
                let splat = pointers.mouse_moved(position.x as f32, position.y as f32, active);
                submit_splat(fluid, splat);
            }
            Event::WindowEvent {
                event: WindowEvent::CursorLeft { .. },
                ..
            } => pointers.mouse_left(),
            Event::WindowEvent {
                event: WindowEvent::Touch(touch),
                ..
            } => {
                let (x, y) = (touch.location.x as f32, touch.location.y as f32);
                let splat = match touch.phase {
                    TouchPhase::Started => pointers.touch_started(touch.id, x, y, active),
                    TouchPhase::Moved => pointers.touch_moved(touch.id, x, y, active),
                    TouchPhase::Ended | TouchPhase::Cancelled => {
                        pointers.touch_ended(touch.id);
                        None
                    }
                };
                submit_splat(fluid, splat);
            }
            Event::MainEventsCleared => window.request_redraw(),
            Event::RedrawRequested(_) => match driver.tick(fluid, &gate) {
                Ok(TickOutcome::Stopped) => *control_flow = ControlFlow::Exit,
                Ok(_) => {}
                Err(err) => log::warn!("frame failed: {err}"),
            },
            Event::LoopDestroyed => {
                if let Some(fluid) = sim.take() {
                    drop(fluid.shutdown());
                }
            }
            _ => {}
        }
    });
}
