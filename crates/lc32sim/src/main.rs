//! LC-3.2 simulator binary.
//!
//! Runs a guest ELF image against a windowed (`winit` + `pixels`) or
//! headless frontend, per `spec.md` §6's CLI contract. Grounded on
//! `emu_nes::main`'s split between `run_headless`/windowed `App` driven
//! by `ApplicationHandler`, adapted to the scanline scheduler `Machine`
//! exposes instead of a single `run_frame` NES entry point.

mod cli;
mod display;
mod keymap;
mod terminal;

use std::cell::Cell;
use std::process;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use pixels::{Pixels, SurfaceTexture};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{Window, WindowAttributes, WindowId};

use lc32_core::{Logger, Observable};
use lc32_cpu::InputSource;
use lc32_devices::input::InputQueue;
use lc32_elf::ElfImage;
use lc32_machine::{Config, FrameOutcome, Machine};

use crate::display::WindowSink;
use crate::keymap::KeyMap;

fn main() {
    let cli = cli::parse_args();

    let mut config = Config::load(&cli.config_file, Logger::new(lc32_core::LogLevel::Warn));
    if cli.software_rendering {
        config.display.accelerated_rendering = false;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    let logger = Logger::new(config.log_level());

    let file = cli.file.as_ref().expect("cli::parse_args guarantees file is set");
    let bytes = match std::fs::read(file) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("error: failed to read {}: {e}", file.display());
            process::exit(1);
        }
    };
    let elf = match ElfImage::parse(bytes) {
        Ok(elf) => elf,
        Err(e) => {
            eprintln!("error: invalid ELF image: {e}");
            process::exit(1);
        }
    };

    let seed = runtime_seed();
    let input: Box<dyn InputSource + Send> = Box::new(InputQueue::spawn_stdin());

    let _raw_mode = match terminal::RawModeGuard::enable(logger) {
        Ok(guard) => Some(guard),
        Err(e) => {
            logger.warn(format!("continuing without raw terminal mode: {e}"));
            None
        }
    };

    let mut machine = match Machine::new(&elf, &config, seed, input, logger) {
        Ok(machine) => machine,
        Err(e) => {
            eprintln!("error: failed to build machine: {e}");
            process::exit(1);
        }
    };

    let result = if cli.headless {
        run_headless(&mut machine)
    } else {
        run_windowed(machine, &config)
    };

    if let Err(code) = result {
        process::exit(code);
    }
}

/// `spec.md` has no `--seed` flag; the original draws its seed from the
/// platform's unseeded `srand`-via-`time(nullptr)` idiom
/// (`original_source/src/sim.cpp`), rendered here as wall-clock seconds.
fn runtime_seed() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

fn run_headless(machine: &mut Machine) -> Result<(), i32> {
    if let Err(e) = machine.run_headless() {
        report_crash(machine, &e);
        return Err(1);
    }
    Ok(())
}

fn report_crash(machine: &Machine, error: &lc32_core::SimError) {
    let pc = machine.query("cpu.pc");
    eprintln!("error: {error}");
    eprintln!("pc = {pc:?}");
    for i in 0..8 {
        eprintln!("r{i} = {:?}", machine.query(&format!("cpu.r{i}")));
    }
    eprintln!("cc = {:?}", machine.query("cpu.cc"));
}

const TARGET_FRAME_TIME: Duration = Duration::from_micros(16_667);

struct App {
    machine: Machine,
    keymap: KeyMap,
    width: u32,
    height: u32,
    window: Option<&'static Window>,
    pixels: Option<Pixels<'static>>,
    last_frame: Instant,
    closed: Cell<bool>,
    render_failed: Cell<bool>,
    crashed: bool,
}

impl App {
    fn new(machine: Machine, config: &Config) -> Self {
        Self {
            machine,
            keymap: KeyMap::new(config),
            width: config.display.width,
            height: config.display.height,
            window: None,
            pixels: None,
            last_frame: Instant::now(),
            closed: Cell::new(false),
            render_failed: Cell::new(false),
            crashed: false,
        }
    }

    fn run_one_frame(&mut self) {
        let Some(pixels) = self.pixels.as_mut() else {
            return;
        };
        let mut sink = WindowSink {
            pixels,
            keymap: &self.keymap,
            width: self.width,
            closed: &self.closed,
            render_failed: &self.render_failed,
        };
        match self.machine.run_frame(&mut sink) {
            Ok(FrameOutcome::Continue) => {}
            Ok(FrameOutcome::Halted | FrameOutcome::WindowClosed) => self.closed.set(true),
            Err(e) => {
                report_crash(&self.machine, &e);
                self.crashed = true;
                self.closed.set(true);
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let size = winit::dpi::LogicalSize::new(self.width, self.height);
        let attrs = WindowAttributes::default()
            .with_title("lc32sim")
            .with_inner_size(size)
            .with_resizable(false);

        match event_loop.create_window(attrs) {
            Ok(window) => {
                let window: &'static Window = Box::leak(Box::new(window));
                let inner = window.inner_size();
                let surface = SurfaceTexture::new(inner.width, inner.height, window);
                match Pixels::new(self.width, self.height, surface) {
                    Ok(pixels) => self.pixels = Some(pixels),
                    Err(e) => {
                        eprintln!("error: failed to create pixel buffer: {e}");
                        event_loop.exit();
                        return;
                    }
                }
                self.window = Some(window);
            }
            Err(e) => {
                eprintln!("error: failed to create window: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.closed.set(true);
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    self.keymap.set_pressed(code, event.state == ElementState::Pressed);
                }
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                if now.duration_since(self.last_frame) >= TARGET_FRAME_TIME {
                    self.run_one_frame();
                    self.last_frame = now;
                }
                if self.closed.get() || self.render_failed.get() {
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window {
            window.request_redraw();
        }
    }
}

fn run_windowed(machine: Machine, config: &Config) -> Result<(), i32> {
    let mut app = App::new(machine, config);

    let event_loop = match EventLoop::new() {
        Ok(el) => el,
        Err(e) => {
            eprintln!("error: failed to create event loop: {e}");
            return Err(1);
        }
    };

    if let Err(e) = event_loop.run_app(&mut app) {
        eprintln!("error: event loop error: {e}");
        return Err(1);
    }

    if app.crashed || app.render_failed.get() {
        return Err(1);
    }
    Ok(())
}
