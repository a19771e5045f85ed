use anyhow::{anyhow, bail, Context};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use usbcam::naming::{self, PathChooser};
use usbcam::platform::{StreamBackend, V4l2Ctl};
use usbcam::recording::VideoCodec;
use usbcam::snapshot;
use usbcam::{
    CameraError, CaptureSession, FormatCatalog, FormatEntry, FrameOutcome, NamingPolicy,
    ParameterRegistry, SessionOptions, UsbcamConfig,
};

const USAGE: &str = "Usage: usbcam-cli [options]

Device:
  -d, --device <N>        video device index (/dev/videoN)
  -c, --camera <KIND>     usb_cam | uvcam | raspi
  -p, --param <SET>       full | minimum
      --config <PATH>     TOML configuration file

Probe only:
  -s,  --show             print the format catalog and exit
  -sa, --show-all         print the raw format listing and exit
  -sp, --show-param       print the raw control listing and exit
      --json              print catalog and results as JSON

Capture:
      --dir <PATH>        output directory
  -e, --ext <EXT>         png | jpg | pgm | tiff
  -col, --color <MODE>    rgb | gray
      --rule <POLICY>     sequential | timestamp | manual
      --format <F:WxH@R>  reconfigure before capturing, e.g. MJPG:1280x720@30
      --set <NAME=VALUE>  write a control (repeatable)
      --reset             reset active controls to their defaults
      --frames <N>        number of stills to save (default 1)
      --record <SECS>     record video instead of saving stills";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    Catalog,
    RawFormats,
    RawControls,
}

#[derive(Debug, Default)]
struct CliArgs {
    config: Option<PathBuf>,
    device: Option<u32>,
    camera: Option<String>,
    param: Option<String>,
    dir: Option<PathBuf>,
    ext: Option<String>,
    color: Option<String>,
    rule: Option<String>,
    probe: Option<Probe>,
    json: bool,
    format: Option<String>,
    sets: Vec<String>,
    reset: bool,
    frames: u32,
    record: Option<f64>,
}

fn main() -> anyhow::Result<()> {
    usbcam::init_logging();

    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        println!("{}", USAGE);
        return Ok(());
    }
    let cli = parse_args(&args[1..])?;
    let config = load_config(&cli)?;

    let tool = V4l2Ctl::new(config.camera.device);

    if let Some(probe) = cli.probe {
        return run_probe(&tool, &config, probe, cli.json);
    }

    let mut registry = ParameterRegistry::discover(&tool)
        .with_context(|| format!("Failed to probe controls on device {}", config.camera.device))?;
    registry.activate_set(config.camera.params, config.camera.kind)?;

    let options = SessionOptions {
        kind: config.camera.kind,
        color: config.camera.color,
        recording_mode: config.recording.mode,
    };
    let session = open_session(config.camera.device, options)?;
    run_session(session, &tool, &mut registry, &config, &cli)
}

fn parse_args(args: &[String]) -> anyhow::Result<CliArgs> {
    let mut cli = CliArgs {
        frames: 1,
        ..Default::default()
    };

    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let mut value = || -> anyhow::Result<String> {
            i += 1;
            args.get(i)
                .cloned()
                .ok_or_else(|| anyhow!("{} needs a value", flag))
        };
        match flag {
            "--config" => cli.config = Some(PathBuf::from(value()?)),
            "-d" | "--device" => cli.device = Some(value()?.parse().context("device index")?),
            "-c" | "--camera" => cli.camera = Some(value()?),
            "-p" | "--param" => cli.param = Some(value()?),
            "--dir" => cli.dir = Some(PathBuf::from(value()?)),
            "-e" | "--ext" => cli.ext = Some(value()?),
            "-col" | "--color" => cli.color = Some(value()?),
            "--rule" => cli.rule = Some(value()?),
            "--format" => cli.format = Some(value()?),
            "--set" => cli.sets.push(value()?),
            "--frames" => cli.frames = value()?.parse().context("frame count")?,
            "--record" => cli.record = Some(value()?.parse().context("record seconds")?),
            "-s" | "--show" => cli.probe = Some(Probe::Catalog),
            "-sa" | "--show-all" => cli.probe = Some(Probe::RawFormats),
            "-sp" | "--show-param" => cli.probe = Some(Probe::RawControls),
            "--json" => cli.json = true,
            "--reset" => cli.reset = true,
            other => bail!("Unknown option: {}\n\n{}", other, USAGE),
        }
        i += 1;
    }
    Ok(cli)
}

fn load_config(cli: &CliArgs) -> anyhow::Result<UsbcamConfig> {
    let path = cli.config.clone().unwrap_or_else(UsbcamConfig::default_path);
    let mut config = UsbcamConfig::load_from_file(&path)?;

    if let Some(device) = cli.device {
        config.camera.device = device;
    }
    if let Some(camera) = &cli.camera {
        config.camera.kind = camera.parse()?;
    }
    if let Some(param) = &cli.param {
        config.camera.params = param.parse()?;
    }
    if let Some(color) = &cli.color {
        config.camera.color = color.parse()?;
    }
    if let Some(dir) = &cli.dir {
        config.storage.output_directory = dir.clone();
    }
    if let Some(ext) = &cli.ext {
        config.storage.image_extension = ext.trim_start_matches('.').to_string();
    }
    if let Some(rule) = &cli.rule {
        config.storage.naming = rule.parse()?;
    }

    config.validate()?;
    Ok(config)
}

fn run_probe(tool: &V4l2Ctl, config: &UsbcamConfig, probe: Probe, json: bool) -> anyhow::Result<()> {
    match probe {
        Probe::Catalog => {
            let catalog = if config.camera.kind.supports_format_probe() {
                FormatCatalog::discover(tool)?
            } else {
                FormatCatalog::raspicam()
            };
            if json {
                println!("{}", serde_json::to_string(&catalog)?);
            } else {
                print!("{}", catalog.table());
            }
        }
        Probe::RawFormats => print!("{}", tool.list_formats_ext()?),
        Probe::RawControls => print!("{}", tool.list_controls_with_menus()?),
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn open_session(
    device: u32,
    options: SessionOptions,
) -> anyhow::Result<CaptureSession<usbcam::platform::V4lStream>> {
    Ok(CaptureSession::open(device, options)?)
}

#[cfg(not(target_os = "linux"))]
fn open_session(
    device: u32,
    _options: SessionOptions,
) -> anyhow::Result<CaptureSession<UnsupportedStream>> {
    Err(CameraError::DeviceUnavailable {
        device,
        reason: "live capture is only supported on Linux".to_string(),
    }
    .into())
}

#[cfg(not(target_os = "linux"))]
struct UnsupportedStream;

#[cfg(not(target_os = "linux"))]
impl StreamBackend for UnsupportedStream {
    fn format(&self) -> Result<FormatEntry, CameraError> {
        Err(CameraError::Unsupported("no stream backend".to_string()))
    }

    fn set_format(&mut self, _requested: &FormatEntry) -> Result<(), CameraError> {
        Err(CameraError::Unsupported("no stream backend".to_string()))
    }

    fn read(&mut self) -> Result<usbcam::platform::RawFrame, CameraError> {
        Err(CameraError::Unsupported("no stream backend".to_string()))
    }

    fn close(&mut self) {}
}

fn run_session<S: StreamBackend>(
    mut session: CaptureSession<S>,
    tool: &V4l2Ctl,
    registry: &mut ParameterRegistry,
    config: &UsbcamConfig,
    cli: &CliArgs,
) -> anyhow::Result<()> {
    if let Some(format) = &cli.format {
        let requested: FormatEntry = format.parse()?;
        let applied = session.reconfigure(&requested)?;
        println!("{:<20} : {}", "format", applied);
        registry.rediscover(tool)?;
    }

    for assignment in &cli.sets {
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| anyhow!("--set expects NAME=VALUE, got {}", assignment))?;
        let value: i64 = value.trim().parse().context("control value")?;
        match session.set_control(registry, tool, name.trim(), value) {
            Ok(applied) => println!("{:<20} : {}", name.trim(), applied),
            Err(e) => eprintln!("Failed to set {}: {}", name.trim(), e),
        }
    }

    if cli.reset {
        match registry.reset_to_defaults(tool) {
            Ok(()) => println!("{:<20} : done", "reset"),
            Err(CameraError::ResetFailed(failures)) => {
                for (name, e) in failures {
                    eprintln!("Failed to reset {}: {}", name, e);
                }
            }
            Err(e) => return Err(e.into()),
        }
    }

    let directory = config.storage.output_directory.as_path();
    if config.storage.create_directory {
        std::fs::create_dir_all(directory)
            .with_context(|| format!("Failed to create {}", directory.display()))?;
    }

    match cli.record {
        Some(seconds) => record(&mut session, config, directory, seconds, cli.json),
        None => save_stills(&mut session, registry, config, directory, cli),
    }
}

fn record<S: StreamBackend>(
    session: &mut CaptureSession<S>,
    config: &UsbcamConfig,
    directory: &Path,
    seconds: f64,
    json: bool,
) -> anyhow::Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || r.store(false, Ordering::SeqCst))
        .context("Failed to install Ctrl+C handler")?;

    let codec: VideoCodec = config.recording.codec;
    let extension = config.recording.container_extension.trim_start_matches('.');
    let path = naming::next_name(NamingPolicy::Timestamp, extension, directory, &mut naming::NoChooser)?
        .ok_or_else(|| anyhow!("no file name for recording"))?;

    let spec = session.start_recording(&path, codec, config.recording.fps)?;
    println!("{:<20} : {}", "recording", spec.path.display());

    let deadline = Instant::now() + Duration::from_secs_f64(seconds.max(0.0));
    let interval = usbcam::frame_interval(spec.fps);
    while running.load(Ordering::SeqCst) && Instant::now() < deadline {
        let started = Instant::now();
        if let Err(e) = session.read_frame() {
            if e.is_fatal() {
                return Err(e.into());
            }
            eprintln!("Recording stopped: {}", e);
            break;
        }
        if let Some(rest) = interval.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    if let Some(stats) = session.stop_recording()? {
        if json {
            println!("{}", serde_json::to_string(&stats)?);
        } else {
            println!(
                "{:<20} : {} frames, {:.1}s, {} bytes",
                "recorded", stats.video_frames, stats.duration_secs, stats.bytes_written
            );
        }
    }
    Ok(())
}

/// Manual naming from a terminal: the path is read from stdin.
struct StdinChooser;

impl PathChooser for StdinChooser {
    fn choose(&mut self, directory: &Path, extension: &str) -> Option<PathBuf> {
        print!("Save as (in {}, .{} added if missing): ", directory.display(), extension);
        io::stdout().flush().ok()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).ok()?;
        let name = line.trim();
        if name.is_empty() {
            return None;
        }
        Some(directory.join(name))
    }
}

fn save_stills<S: StreamBackend>(
    session: &mut CaptureSession<S>,
    registry: &ParameterRegistry,
    config: &UsbcamConfig,
    directory: &Path,
    cli: &CliArgs,
) -> anyhow::Result<()> {
    let extension = config.image_extension()?;
    let mut saved = Vec::new();

    for _ in 0..cli.frames {
        let buffer = loop {
            if let FrameOutcome::Preview(buffer) = session.read_frame()? {
                break buffer;
            }
        };

        let path = {
            let _paused = session.suspend();
            naming::next_name(
                config.storage.naming,
                extension.as_str(),
                directory,
                &mut StdinChooser,
            )?
        };
        let Some(path) = path else {
            println!("{:<20} : cancelled", "save image");
            continue;
        };

        match snapshot::save_with_params(&buffer, &path, registry) {
            Ok(written) => {
                if !cli.json {
                    println!("{:<20} : {}", "save image", written.image.display());
                    println!("{:<20} : {}", "save parameter file", written.params.display());
                }
                saved.push(written);
            }
            Err(e) => eprintln!("Failed to save {}: {}", path.display(), e),
        }
    }

    if cli.json {
        println!("{}", serde_json::to_string(&saved)?);
    }
    Ok(())
}
