mod cli;
mod output;

use clap::Parser;
use meade_dsi::{DsiCamera, Error, ReadMode, UsbTransport};
use simple_eyre::Result;
use std::io::Write;
use std::{thread, time::Duration};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use cli::*;

fn main() -> Result<()> {
    simple_eyre::install()?;
    let cli = Cli::parse();
    env_logger::init();

    match &cli.command {
        Commands::List => list_cameras(),
        Commands::Info(conf) => show_info(conf),
        Commands::Capture(conf) => capture(conf),
        Commands::Name(subcomm) => match &subcomm.command {
            NameCommands::Get(conf) => get_name(conf),
            NameCommands::Set(conf) => set_name(conf),
        },
    }
}

fn open_camera(conf: &DeviceConf) -> Result<DsiCamera<UsbTransport>> {
    Ok(DsiCamera::open_with_options(
        conf.device.as_deref(),
        conf.trace_frames,
    )?)
}

/// Returns std::io::Write stream with coloring enabled if program is run interactively
fn get_stdout() -> StandardStream {
    StandardStream::stdout(if atty::is(atty::Stream::Stdout) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    })
}

fn list_cameras() -> Result<()> {
    let mut stdout = get_stdout();
    let cameras = UsbTransport::enumerate()?;
    if cameras.is_empty() {
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Red)))?;
        writeln!(&mut stdout, "No DSI cameras found.")?;
    } else {
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        writeln!(&mut stdout, "Connected DSI cameras:")?;
    }
    stdout.reset()?;
    for location in &cameras {
        println!("{location}");
    }
    Ok(())
}

fn show_info(conf: &DeviceConf) -> Result<()> {
    let mut camera = open_camera(conf)?;
    println!("Camera name:   {}", camera.camera_name()?);
    println!("Model:         {}", camera.model_name());
    println!("Chip:          {}", camera.chip_name());
    println!("Serial number: {}", camera.serial_number()?);
    println!("Firmware:      {}", camera.firmware_version());
    println!("USB link:      {}", camera.usb_speed());
    println!("Temperature:   {:.1} C", camera.temperature()?);
    println!(
        "Image size:    {}x{}",
        camera.image_width(),
        camera.image_height()
    );
    Ok(())
}

fn capture(conf: &CaptureConf) -> Result<()> {
    let mut camera = open_camera(&conf.device)?;
    camera.set_amp_gain(conf.gain);
    camera.set_amp_offset(conf.offset);

    log::info!("starting {} s exposure", conf.exposure);
    camera.start_exposure(conf.exposure)?;

    if conf.poll {
        loop {
            match camera.read_image(ReadMode::NonBlocking) {
                Ok(image) => {
                    conf.output.write_image(&image)?;
                    return Ok(());
                }
                Err(Error::WouldBlock) => {
                    log::info!("exposure still running");
                    thread::sleep(Duration::from_secs(1));
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    let image = camera.read_image(ReadMode::Blocking)?;
    conf.output.write_image(&image)?;
    Ok(())
}

fn get_name(conf: &DeviceConf) -> Result<()> {
    let mut camera = open_camera(conf)?;
    println!("{}", camera.camera_name()?);
    Ok(())
}

fn set_name(conf: &SetNameConf) -> Result<()> {
    let mut camera = open_camera(&conf.device)?;
    camera.set_camera_name(&conf.name)?;
    println!("Camera name set to {:?}", camera.camera_name()?);
    Ok(())
}
